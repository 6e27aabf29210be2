//! Scan delegator requests and the assistant connection.
//!
//! Every request records the receive state it carries as the tracked one
//! before acting on it.

use platform::{
    BapHost, BisBitfield, BroadcastCode, BroadcastId, ConnHandle, ConnectionObserver,
    DelegatorError, DelegatorHandler, PaState, ReceiverState, BASS_MAX_SUBGROUPS,
};

use crate::bis_select::validate_bis_sync_request;
use crate::hci::reason_str;
use crate::sink::BroadcastSink;

impl<H: BapHost> BroadcastSink<H> {
    fn track(&self, state: &ReceiverState) {
        self.with_session(|s| s.recv_state = Some(state.clone()));
    }
}

impl<H: BapHost> DelegatorHandler for BroadcastSink<H> {
    fn on_recv_state_updated(&self, _conn: ConnHandle, state: &ReceiverState) {
        debug!(
            "Receive state updated, pa sync state: {}, subgroups: {}",
            state.pa_sync_state as u8,
            state.subgroups.len()
        );
        for (i, subgroup) in state.subgroups.iter().enumerate() {
            trace!("subgroup {} bis_sync: {:#x}", i, subgroup.bis_sync.bits());
        }
        self.track(state);
    }

    fn on_pa_sync_request(
        &self,
        conn: ConnHandle,
        state: &ReceiverState,
        past_available: bool,
        pa_interval: u16,
    ) -> Result<(), DelegatorError> {
        info!(
            "Received request to sync to PA (PAST available: {}): {}",
            past_available,
            state.pa_sync_state as u8
        );
        self.track(state);

        if matches!(state.pa_sync_state, PaState::Synced | PaState::InfoRequested) {
            return Err(DelegatorError::AlreadySyncing);
        }

        if self.config().past_receiver && past_available {
            self.sync_via_past(conn, pa_interval)?;
            self.gates().past_request.give();

            self.host()
                .set_pa_state(state.src_id, PaState::InfoRequested)
                .map_err(|err| {
                    warn!("Failed to set PA state to info requested: {}", err);
                    err
                })?;
            self.with_session(|s| {
                if let Some(tracked) = s.recv_state.as_mut() {
                    tracked.pa_sync_state = PaState::InfoRequested;
                }
            });
        }

        self.gates().pa_request.give();
        Ok(())
    }

    fn on_pa_sync_terminate_request(
        &self,
        _conn: ConnHandle,
        state: &ReceiverState,
    ) -> Result<(), DelegatorError> {
        info!("PA sync termination req, pa sync state: {}", state.pa_sync_state as u8);
        self.track(state);

        let sync = self
            .with_session(|s| s.pa_sync)
            .ok_or(DelegatorError::NoPaSync)?;
        debug!("Delete periodic advertising sync");
        self.host().pa_sync_delete(sync).map_err(|err| {
            warn!("Could not delete per adv sync: {}", err);
            DelegatorError::Host(err)
        })
    }

    fn on_broadcast_code(&self, _conn: ConnHandle, state: &ReceiverState, code: &BroadcastCode) {
        info!("Broadcast code received for source {}", state.src_id);
        self.with_session(|s| {
            s.recv_state = Some(state.clone());
            s.broadcast_code = *code;
        });
        self.gates().broadcast_code.give();
    }

    fn on_bis_sync_request(
        &self,
        _conn: ConnHandle,
        state: &ReceiverState,
        requests: &[BisBitfield; BASS_MAX_SUBGROUPS],
    ) -> Result<(), DelegatorError> {
        self.track(state);

        let announced = requests
            .get(..state.subgroups.len())
            .unwrap_or(requests.as_slice());
        for (i, bis) in announced.iter().enumerate() {
            debug!("bis_sync_req[{}] = {:#x}", i, bis.bits());
        }
        let request = validate_bis_sync_request(announced, self.config().stream_count)?;

        let (big_synced, sink) = self.with_session(|s| (s.big_synced, s.sink));
        info!(
            "BIS sync req for source {}, broadcast id: {:#x}, BIG synced: {}",
            state.src_id,
            state.broadcast_id,
            big_synced
        );

        if big_synced {
            if request.any {
                warn!("Already synced");
                return Err(DelegatorError::InvalidArgument);
            }
            if let Some(sink) = sink {
                self.host().sink_stop(sink).map_err(|err| {
                    warn!("Failed to stop Broadcast Sink: {}", err);
                    DelegatorError::Host(err)
                })?;
            }
        }

        self.with_session(|s| {
            s.requested_bis = request.table;
            if let Some(id) = BroadcastId::new(state.broadcast_id) {
                s.broadcast_id = Some(id);
            }
        });
        if request.any {
            self.gates().bis_sync_requested.give();
        }
        Ok(())
    }
}

impl<H: BapHost> ConnectionObserver for BroadcastSink<H> {
    fn on_connected(&self, conn: ConnHandle, status: u8) {
        if status != 0 {
            warn!(
                "Failed to connect {} {:#x} ({})",
                conn.0,
                status,
                reason_str(status)
            );
            self.with_session(|s| {
                s.assistant.release();
            });
            return;
        }

        if self.with_session(|s| s.assistant.on_connected(conn)) {
            info!("Connected: {}", conn.0);
            self.gates().connected.give();
        } else {
            warn!("Ignoring connection {}, assistant slot in use", conn.0);
        }
    }

    fn on_disconnected(&self, conn: ConnHandle, disc_reason: u8) {
        let ours = self.with_session(|s| {
            let ours = s.assistant.on_disconnected(conn);
            if ours {
                s.recv_state = None;
            }
            ours
        });
        if !ours {
            return;
        }
        info!(
            "Disconnected: {}, reason {:#x} ({})",
            conn.0,
            disc_reason,
            reason_str(disc_reason)
        );
        self.gates().disconnected.give();
    }
}
