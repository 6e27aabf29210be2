//! Periodic advertising sync management.
//!
//! A PA sync is either created directly from a scanned broadcaster or handed
//! over by the Broadcast Assistant through PAST. The PAST path arms a
//! watchdog: if no sync arrives in time the receive state reports the
//! failure back to the assistant.

use core::convert::Infallible;

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Timer};
use platform::{
    BapHost, ConnHandle, HostError, PaState, PaSyncHandle, PaSyncObserver, PaSyncParams,
    PaSyncedInfo, PastParams, PA_INTERVAL_UNKNOWN,
};

use crate::hci::{
    pa_interval_to_us, reason, reason_str, us_to_sync_timeout, PER_ADV_MAX_TIMEOUT,
    PER_ADV_MIN_TIMEOUT,
};
use crate::sink::BroadcastSink;
use crate::state::BroadcasterInfo;

/// PA events the controller may skip while synced.
pub const PA_SYNC_SKIP: u16 = 5;

/// Sync timeout as a multiple of the PA interval.
pub const PA_SYNC_INTERVAL_TO_TIMEOUT_RATIO: u32 = 5;

/// Sync timeout (10 ms units) for a PA interval (1.25 ms units).
///
/// Five intervals, clamped to the allowed range. An unknown interval gets
/// the maximum.
#[must_use]
pub fn sync_timeout(pa_interval: u16) -> u16 {
    if pa_interval == PA_INTERVAL_UNKNOWN {
        return PER_ADV_MAX_TIMEOUT;
    }
    let timeout = us_to_sync_timeout(pa_interval_to_us(pa_interval))
        .saturating_mul(PA_SYNC_INTERVAL_TO_TIMEOUT_RATIO)
        .clamp(u32::from(PER_ADV_MIN_TIMEOUT), u32::from(PER_ADV_MAX_TIMEOUT));
    u16::try_from(timeout).unwrap_or(PER_ADV_MAX_TIMEOUT)
}

/// Commands for the PA watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PaTimerCommand {
    /// Fire after the given delay, replacing any pending deadline.
    Arm(Duration),
    /// Drop the pending deadline.
    Cancel,
}

impl<H: BapHost> BroadcastSink<H> {
    /// Accept a PA sync transfer from the assistant on `conn` and arm the
    /// watchdog for the sync timeout.
    pub(crate) fn sync_via_past(&self, conn: ConnHandle, pa_interval: u16) -> Result<(), HostError> {
        let params = PastParams {
            skip: PA_SYNC_SKIP,
            timeout: sync_timeout(pa_interval),
        };
        self.host().past_subscribe(conn, &params).map_err(|err| {
            warn!("Could not do PAST subscribe: {}", err);
            err
        })?;
        info!("Syncing with PAST");
        let ms = u64::from(params.timeout).saturating_mul(10);
        self.pa_timer.signal(PaTimerCommand::Arm(Duration::from_millis(ms)));
        Ok(())
    }

    /// Create a PA sync to a scanned broadcaster and remember its handle.
    pub(crate) fn create_direct_sync(
        &self,
        broadcaster: &BroadcasterInfo,
    ) -> Result<PaSyncHandle, HostError> {
        let params = PaSyncParams {
            addr: broadcaster.addr,
            sid: broadcaster.sid,
            skip: PA_SYNC_SKIP,
            timeout: sync_timeout(broadcaster.interval),
            filter_duplicates: true,
        };
        let sync = self.host().pa_sync_create(&params)?;
        self.with_session(|s| s.pa_sync = Some(sync));
        Ok(sync)
    }

    /// Drive the PAST watchdog. Never returns.
    pub async fn pa_watchdog(&self) -> Infallible {
        loop {
            let mut command = self.pa_timer.wait().await;
            while let PaTimerCommand::Arm(delay) = command {
                let deadline = Instant::now().checked_add(delay).unwrap_or(Instant::MAX);
                match select(self.pa_timer.wait(), Timer::at(deadline)).await {
                    Either::First(next) => command = next,
                    Either::Second(()) => {
                        self.on_pa_timeout();
                        break;
                    }
                }
            }
        }
    }

    /// Report the failed transfer on the tracked receive state.
    pub(crate) fn on_pa_timeout(&self) {
        let pending = self.with_session(|s| {
            s.recv_state.as_ref().map(|state| {
                let next = if state.pa_sync_state == PaState::InfoRequested {
                    PaState::NoPast
                } else {
                    PaState::Failed
                };
                (state.src_id, next)
            })
        });

        if let Some((src_id, next)) = pending {
            match self.host().set_pa_state(src_id, next) {
                Ok(()) => self.with_session(|s| {
                    if let Some(state) = s.recv_state.as_mut() {
                        state.pa_sync_state = next;
                    }
                }),
                Err(err) => warn!("Failed to set PA state: {}", err),
            }
        }
        info!("PA timeout");
    }
}

impl<H: BapHost> PaSyncObserver for BroadcastSink<H> {
    fn on_pa_synced(&self, sync: PaSyncHandle, info: &PaSyncedInfo) {
        let matched = self.with_session(|s| {
            let requested = s
                .recv_state
                .as_ref()
                .is_some_and(|state| state.addr == info.addr && state.adv_sid == info.sid);
            if s.pa_sync != Some(sync) && !requested {
                return false;
            }
            if s.pa_sync.is_none() {
                s.pa_sync = Some(sync);
            }
            true
        });
        if !matched {
            return;
        }

        info!("PA sync {} synced for broadcast sink", sync.0);
        self.pa_timer.signal(PaTimerCommand::Cancel);
        self.gates().pa_synced.give();
    }

    fn on_pa_terminated(&self, sync: PaSyncHandle, term_reason: u8) {
        let lost = self.with_session(|s| {
            if s.pa_sync != Some(sync) {
                return None;
            }
            s.pa_sync = None;
            let src_id = s.recv_state.as_ref().map(|state| state.src_id);
            let active_sink = if s.big_synced { s.sink } else { None };
            Some((src_id, active_sink))
        });
        let Some((src_id, active_sink)) = lost else {
            return;
        };

        info!(
            "PA sync {} lost with reason {:#x} ({})",
            sync.0,
            term_reason,
            reason_str(term_reason)
        );
        self.gates().pa_sync_lost.give();

        if term_reason == reason::LOCALHOST_TERM_CONN {
            return;
        }
        let Some(src_id) = src_id else {
            return;
        };

        if let Some(sink) = active_sink {
            if let Err(err) = self.host().sink_stop(sink) {
                warn!("Failed to stop Broadcast Sink: {}", err);
                return;
            }
        }
        if let Err(err) = self.host().remove_source(src_id) {
            warn!("Failed to remove source: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_interval_uses_max() {
        assert_eq!(sync_timeout(PA_INTERVAL_UNKNOWN), PER_ADV_MAX_TIMEOUT);
    }

    #[test]
    fn short_interval_clamps_to_min() {
        // 7.5 ms * 5 = 37.5 ms, below the 100 ms floor
        assert_eq!(sync_timeout(0x0006), PER_ADV_MIN_TIMEOUT);
    }

    #[test]
    fn typical_interval_is_five_periods() {
        // 100 ms interval -> 10 units * 5
        assert_eq!(sync_timeout(0x0050), 50);
    }

    #[test]
    fn long_interval_clamps_to_max() {
        assert_eq!(sync_timeout(0xFFFE), PER_ADV_MAX_TIMEOUT);
    }
}
