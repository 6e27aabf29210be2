//! Session state shared between host callbacks and the orchestrator.

use platform::{
    AdvSetHandle, BisBitfield, BroadcastCode, BroadcastId, BtAddrLe, ConnHandle, PaSyncHandle,
    ReceiverState, SinkHandle, BASS_MAX_SUBGROUPS, BROADCAST_CODE_SIZE,
};

use crate::base::BaseData;
use crate::orchestrator::SinkPhase;

/// Tracks the single Broadcast Assistant connection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssistantLink {
    conn: Option<ConnHandle>,
}

impl AssistantLink {
    /// Create an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self { conn: None }
    }

    /// Take the slot for `conn`. Returns `false` if it is already held.
    pub fn on_connected(&mut self, conn: ConnHandle) -> bool {
        if self.conn.is_some() {
            return false;
        }
        self.conn = Some(conn);
        true
    }

    /// Release the slot if `conn` holds it. Returns `false` for any other
    /// connection.
    pub fn on_disconnected(&mut self, conn: ConnHandle) -> bool {
        if self.conn != Some(conn) {
            return false;
        }
        self.conn = None;
        true
    }

    /// Connection currently holding the slot.
    #[must_use]
    pub fn conn(&self) -> Option<ConnHandle> {
        self.conn
    }

    /// Returns `true` if an assistant is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Empty the slot, returning the connection that held it.
    pub fn release(&mut self) -> Option<ConnHandle> {
        self.conn.take()
    }
}

/// Broadcaster picked from a scan report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BroadcasterInfo {
    /// Advertiser address.
    pub addr: BtAddrLe,
    /// Advertising set id.
    pub sid: u8,
    /// PA interval (1.25 ms units).
    pub interval: u16,
    /// Broadcast id from the announcement.
    pub broadcast_id: BroadcastId,
}

/// Everything a sink cycle accumulates.
///
/// Lives behind the sink's critical-section mutex. Host handles and the
/// assistant slot survive [`Session::clear_cycle`]; the sink releases them
/// itself because each release is a host call.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub phase: SinkPhase,
    pub recv_state: Option<ReceiverState>,
    pub broadcaster: Option<BroadcasterInfo>,
    pub broadcast_id: Option<BroadcastId>,
    pub pa_sync: Option<PaSyncHandle>,
    pub sink: Option<SinkHandle>,
    pub adv: Option<AdvSetHandle>,
    pub assistant: AssistantLink,
    pub base: BaseData,
    pub base_received: bool,
    pub big_synced: bool,
    pub requested_bis: [BisBitfield; BASS_MAX_SUBGROUPS],
    pub broadcast_code: BroadcastCode,
}

impl Session {
    /// Empty session.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: SinkPhase::Idle,
            recv_state: None,
            broadcaster: None,
            broadcast_id: None,
            pa_sync: None,
            sink: None,
            adv: None,
            assistant: AssistantLink::new(),
            base: BaseData::EMPTY,
            base_received: false,
            big_synced: false,
            requested_bis: [BisBitfield::EMPTY; BASS_MAX_SUBGROUPS],
            broadcast_code: [0; BROADCAST_CODE_SIZE],
        }
    }

    /// Forget everything learned during the current cycle.
    pub fn clear_cycle(&mut self) {
        self.phase = SinkPhase::Idle;
        self.recv_state = None;
        self.broadcaster = None;
        self.broadcast_id = None;
        self.base = BaseData::EMPTY;
        self.base_received = false;
        self.big_synced = false;
        self.requested_bis = [BisBitfield::EMPTY; BASS_MAX_SUBGROUPS];
        self.broadcast_code = [0; BROADCAST_CODE_SIZE];
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_starts_empty() {
        let link = AssistantLink::new();
        assert!(!link.is_connected());
        assert_eq!(link.conn(), None);
    }

    #[test]
    fn test_link_connect() {
        let mut link = AssistantLink::new();
        assert!(link.on_connected(ConnHandle(1)));
        assert_eq!(link.conn(), Some(ConnHandle(1)));
    }

    #[test]
    fn test_link_second_connect_ignored() {
        let mut link = AssistantLink::new();
        link.on_connected(ConnHandle(1));
        assert!(!link.on_connected(ConnHandle(2)));
        assert_eq!(link.conn(), Some(ConnHandle(1)));
    }

    #[test]
    fn test_link_foreign_disconnect_ignored() {
        let mut link = AssistantLink::new();
        link.on_connected(ConnHandle(1));
        assert!(!link.on_disconnected(ConnHandle(7)));
        assert!(link.is_connected());
        assert!(link.on_disconnected(ConnHandle(1)));
        assert!(!link.is_connected());
    }

    #[test]
    fn test_link_release_returns_connection() {
        let mut link = AssistantLink::new();
        link.on_connected(ConnHandle(3));
        assert_eq!(link.release(), Some(ConnHandle(3)));
        assert_eq!(link.release(), None);
    }

    #[test]
    fn test_clear_cycle_keeps_adv_and_link() {
        let mut session = Session::new();
        session.adv = Some(AdvSetHandle(0));
        session.assistant.on_connected(ConnHandle(1));
        session.big_synced = true;
        session.base_received = true;
        session.requested_bis = [BisBitfield::NO_PREFERENCE; BASS_MAX_SUBGROUPS];
        session.phase = SinkPhase::Streaming;
        session.clear_cycle();
        assert_eq!(session.adv, Some(AdvSetHandle(0)));
        assert!(session.assistant.is_connected());
        assert!(!session.big_synced);
        assert!(!session.base_received);
        assert_eq!(session.phase, SinkPhase::Idle);
        assert_eq!(session.requested_bis, [BisBitfield::EMPTY; BASS_MAX_SUBGROUPS]);
    }
}
