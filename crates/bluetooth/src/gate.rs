//! Counting rendezvous gates.
//!
//! A [`Gate`] is a counting semaphore with a fixed limit. Host callbacks
//! [`give`](Gate::give) without blocking; the orchestrator suspends in
//! [`take`](Gate::take) or [`take_within`](Gate::take_within). Gives beyond
//! the limit are dropped, so a one-shot gate (limit 1) remembers at most one
//! event.
//!
//! Only one task may wait on a gate at a time. The sink upholds this: every
//! wait happens on the orchestrator task.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration, TimeoutError};

/// Counting semaphore with a fixed upper bound.
pub struct Gate {
    count: Mutex<CriticalSectionRawMutex, Cell<u8>>,
    limit: u8,
    notify: Signal<CriticalSectionRawMutex, ()>,
}

impl Gate {
    /// Create an empty gate holding at most `limit` units.
    #[must_use]
    pub const fn new(limit: u8) -> Self {
        Self {
            count: Mutex::new(Cell::new(0)),
            limit,
            notify: Signal::new(),
        }
    }

    /// Add one unit (saturating at the limit) and wake the waiter.
    pub fn give(&self) {
        self.count.lock(|count| {
            if count.get() < self.limit {
                count.set(count.get().saturating_add(1));
            }
        });
        self.notify.signal(());
    }

    /// Take one unit if available. This is the zero-timeout wait.
    pub fn try_take(&self) -> bool {
        self.count.lock(|count| match count.get().checked_sub(1) {
            Some(left) => {
                count.set(left);
                true
            }
            None => false,
        })
    }

    /// Wait until a unit is available and take it.
    pub async fn take(&self) {
        loop {
            if self.try_take() {
                return;
            }
            // A give between try_take and wait leaves the signal set, so the
            // wait returns at once and the loop retries.
            self.notify.wait().await;
        }
    }

    /// Wait at most `timeout` for a unit.
    ///
    /// # Errors
    ///
    /// Returns [`TimeoutError`] if no unit became available in time.
    pub async fn take_within(&self, timeout: Duration) -> Result<(), TimeoutError> {
        with_timeout(timeout, self.take()).await
    }

    /// Empty the gate and drop any pending wake-up.
    pub fn reset(&self) {
        self.count.lock(|count| count.set(0));
        self.notify.reset();
    }

    /// Units currently held.
    #[must_use]
    pub fn count(&self) -> u8 {
        self.count.lock(Cell::get)
    }

    /// `true` when no unit is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Maximum number of units this gate holds.
    #[must_use]
    pub fn limit(&self) -> u8 {
        self.limit
    }
}

/// Every rendezvous point of a sink session.
pub struct Gates {
    /// A scan report matched the broadcaster filter.
    pub broadcaster_found: Gate,
    /// The PA sync was established.
    pub pa_synced: Gate,
    /// A BASE was received and resolved.
    pub base_received: Gate,
    /// BIGInfo was received.
    pub syncable: Gate,
    /// The broadcast code is known (or not needed).
    pub broadcast_code: Gate,
    /// Requested BIS bitfields are available.
    pub bis_sync_requested: Gate,
    /// The sink synced to the BIG.
    pub big_synced: Gate,
    /// The PA sync was lost.
    pub pa_sync_lost: Gate,
    /// The sink left the BIG.
    pub sink_stopped: Gate,
    /// A Broadcast Assistant connected.
    pub connected: Gate,
    /// The Broadcast Assistant disconnected.
    pub disconnected: Gate,
    /// The assistant asked this device to sync to a PA.
    pub pa_request: Gate,
    /// The PA sync will arrive through PAST.
    pub past_request: Gate,
    /// Streams whose ISO channel is connected.
    pub stream_connected: Gate,
    /// Streams that are delivering audio.
    pub stream_started: Gate,
}

impl Gates {
    /// Create all gates empty; the stream gates hold up to `stream_count`.
    #[must_use]
    pub const fn new(stream_count: u8) -> Self {
        Self {
            broadcaster_found: Gate::new(1),
            pa_synced: Gate::new(1),
            base_received: Gate::new(1),
            syncable: Gate::new(1),
            broadcast_code: Gate::new(1),
            bis_sync_requested: Gate::new(1),
            big_synced: Gate::new(1),
            pa_sync_lost: Gate::new(1),
            sink_stopped: Gate::new(1),
            connected: Gate::new(1),
            disconnected: Gate::new(1),
            pa_request: Gate::new(1),
            past_request: Gate::new(1),
            stream_connected: Gate::new(stream_count),
            stream_started: Gate::new(stream_count),
        }
    }

    fn all(&self) -> [&Gate; 15] {
        [
            &self.broadcaster_found,
            &self.pa_synced,
            &self.base_received,
            &self.syncable,
            &self.broadcast_code,
            &self.bis_sync_requested,
            &self.big_synced,
            &self.pa_sync_lost,
            &self.sink_stopped,
            &self.connected,
            &self.disconnected,
            &self.pa_request,
            &self.past_request,
            &self.stream_connected,
            &self.stream_started,
        ]
    }

    /// Empty every gate.
    pub fn reset_all(&self) {
        for gate in self.all() {
            gate.reset();
        }
    }

    /// `true` when a zero-timeout wait on every gate would fail.
    #[must_use]
    pub fn all_empty(&self) -> bool {
        self.all().iter().all(|gate| gate.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn give_saturates_at_limit() {
        let gate = Gate::new(2);
        gate.give();
        gate.give();
        gate.give();
        assert_eq!(gate.count(), 2);
        assert!(gate.try_take());
        assert!(gate.try_take());
        assert!(!gate.try_take());
    }

    #[test]
    fn one_shot_gate_remembers_one_event() {
        let gate = Gate::new(1);
        gate.give();
        gate.give();
        assert!(gate.try_take());
        assert!(!gate.try_take());
    }

    #[test]
    fn reset_empties_gate() {
        let gate = Gate::new(3);
        gate.give();
        gate.give();
        gate.reset();
        assert!(gate.is_empty());
        assert!(!gate.try_take());
    }

    #[test]
    fn gates_reset_all_leaves_everything_empty() {
        let gates = Gates::new(2);
        for gate in gates.all() {
            gate.give();
        }
        assert!(!gates.all_empty());
        gates.reset_all();
        assert!(gates.all_empty());
    }

    #[test]
    fn stream_gates_use_stream_count() {
        let gates = Gates::new(3);
        assert_eq!(gates.stream_connected.limit(), 3);
        assert_eq!(gates.stream_started.limit(), 3);
        assert_eq!(gates.pa_synced.limit(), 1);
    }

    #[tokio::test]
    async fn take_within_times_out_when_empty() {
        let gate = Gate::new(1);
        let result = gate.take_within(Duration::from_millis(10)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn take_returns_once_given() {
        let gate = Gate::new(1);
        let waiter = async {
            gate.take_within(Duration::from_secs(5)).await.unwrap();
        };
        let giver = async {
            embassy_time::Timer::after_millis(5).await;
            gate.give();
        };
        tokio::join!(waiter, giver);
        assert!(gate.is_empty());
    }

    #[tokio::test]
    async fn stale_wakeup_after_reset_does_not_satisfy_wait() {
        let gate = Gate::new(1);
        gate.give();
        gate.reset();
        let result = gate.take_within(Duration::from_millis(10)).await;
        assert!(result.is_err());
    }
}
