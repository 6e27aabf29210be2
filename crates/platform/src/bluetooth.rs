//! Bluetooth LE Audio host-stack abstraction.
//!
//! [`BapHost`] is everything the broadcast sink *calls* on the host stack.
//! The observer traits are everything the host stack *delivers* back. A real
//! stack binding implements [`BapHost`] and forwards its callbacks to a type
//! implementing the observers; tests substitute [`crate::mocks::MockHost`].
//!
//! Host calls are synchronous and non-blocking: they queue work with the
//! controller and report the outcome later through an observer callback.
//! Observers may be invoked from a different execution context than the one
//! issuing host calls.

use crate::audio_types::BisBitfield;
use crate::bluetooth_types::{
    AdvSetHandle, BigInfo, BroadcastCode, BroadcastId, CodecCapability, ConnHandle, PaState,
    PaSyncHandle, PaSyncParams, PaSyncedInfo, PastParams, ReceiverState, ScanReport, SinkHandle,
    SourceId, StreamId, BASS_MAX_SUBGROUPS,
};

// ── Errors ───────────────────────────────────────────────────────────────────

/// Failure reported by a host-stack call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostError {
    /// The operation is already in progress (e.g. scanning already started).
    Already,
    /// A parameter was rejected by the stack.
    InvalidArgument,
    /// No free resources (sync objects, advertising sets, buffers).
    NoMemory,
    /// The connection is gone.
    NotConnected,
    /// The stack or controller is busy with a conflicting operation.
    Busy,
    /// Any other negative errno reported by the stack.
    Io(i32),
}

#[cfg(feature = "std")]
impl std::error::Error for HostError {}

impl core::fmt::Display for HostError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Already => write!(f, "operation already in progress"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::NoMemory => write!(f, "out of host resources"),
            Self::NotConnected => write!(f, "not connected"),
            Self::Busy => write!(f, "host stack busy"),
            Self::Io(errno) => write!(f, "host stack error {errno}"),
        }
    }
}

/// Rejection returned to a remote Broadcast Assistant by a scan-delegator
/// request handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DelegatorError {
    /// A PA sync is already established or being transferred.
    AlreadySyncing,
    /// The request is malformed or conflicts with the current state.
    InvalidArgument,
    /// A PA sync terminate was requested but no PA sync exists.
    NoPaSync,
    /// The host stack refused an operation needed to serve the request.
    Host(HostError),
}

#[cfg(feature = "std")]
impl std::error::Error for DelegatorError {}

impl core::fmt::Display for DelegatorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AlreadySyncing => write!(f, "already syncing to a PA"),
            Self::InvalidArgument => write!(f, "invalid request"),
            Self::NoPaSync => write!(f, "no PA sync to terminate"),
            Self::Host(err) => write!(f, "host error: {err}"),
        }
    }
}

impl From<HostError> for DelegatorError {
    fn from(err: HostError) -> Self {
        Self::Host(err)
    }
}

// ── Host calls ───────────────────────────────────────────────────────────────

/// Operations the broadcast sink needs from the Bluetooth host stack.
pub trait BapHost {
    // Stack bring-up

    /// Enable the Bluetooth stack.
    fn enable(&self) -> Result<(), HostError>;
    /// Register the Published Audio Capabilities service (sink PAC + location).
    fn register_pacs(&self) -> Result<(), HostError>;
    /// Register a sink codec capability.
    fn register_sink_capability(&self, capability: &CodecCapability) -> Result<(), HostError>;
    /// Register the scan delegator so assistants can reach this device.
    fn register_scan_delegator(&self) -> Result<(), HostError>;
    /// Initialise LC3 decoding of received streams.
    fn init_lc3(&self) -> Result<(), HostError>;
    /// Initialise USB audio output of decoded streams.
    fn init_usb_audio(&self) -> Result<(), HostError>;

    // Scanning

    /// Start active scanning. `Err(HostError::Already)` when already scanning.
    fn scan_start(&self) -> Result<(), HostError>;
    /// Stop scanning.
    fn scan_stop(&self) -> Result<(), HostError>;

    // Connectable advertising

    /// Create a connectable extended advertising set.
    fn adv_create(&self) -> Result<AdvSetHandle, HostError>;
    /// Set the advertising data (raw AD structures).
    fn adv_set_data(&self, adv: AdvSetHandle, data: &[u8]) -> Result<(), HostError>;
    /// Start advertising.
    fn adv_start(&self, adv: AdvSetHandle) -> Result<(), HostError>;
    /// Stop advertising.
    fn adv_stop(&self, adv: AdvSetHandle) -> Result<(), HostError>;
    /// Delete the advertising set.
    fn adv_delete(&self, adv: AdvSetHandle) -> Result<(), HostError>;

    // Periodic advertising sync

    /// Create a PA sync to a scanned broadcaster.
    fn pa_sync_create(&self, params: &PaSyncParams) -> Result<PaSyncHandle, HostError>;
    /// Delete a PA sync. The terminated callback follows.
    fn pa_sync_delete(&self, sync: PaSyncHandle) -> Result<(), HostError>;
    /// Accept a PA sync transfer on the given connection.
    fn past_subscribe(&self, conn: ConnHandle, params: &PastParams) -> Result<(), HostError>;

    // Broadcast sink

    /// Create a broadcast sink on an established PA sync.
    fn sink_create(
        &self,
        sync: PaSyncHandle,
        broadcast_id: BroadcastId,
    ) -> Result<SinkHandle, HostError>;
    /// Sync to the BIG, joining the BIS in `bis`.
    fn sink_sync(
        &self,
        sink: SinkHandle,
        bis: BisBitfield,
        code: &BroadcastCode,
    ) -> Result<(), HostError>;
    /// Leave the BIG. The stopped callback follows.
    fn sink_stop(&self, sink: SinkHandle) -> Result<(), HostError>;
    /// Delete the broadcast sink.
    fn sink_delete(&self, sink: SinkHandle) -> Result<(), HostError>;

    // Scan delegator

    /// Update the PA state reported to assistants for `src_id`.
    fn set_pa_state(&self, src_id: SourceId, state: PaState) -> Result<(), HostError>;
    /// Remove the receive state `src_id`.
    fn remove_source(&self, src_id: SourceId) -> Result<(), HostError>;

    // Connections

    /// Disconnect the given connection with an HCI reason code.
    fn disconnect(&self, conn: ConnHandle, reason: u8) -> Result<(), HostError>;
}

// ── Host callbacks ───────────────────────────────────────────────────────────

/// Advertising report delivery.
pub trait ScanObserver {
    /// Called for every advertising report while scanning.
    fn on_scan_report(&self, report: &ScanReport<'_>);
}

/// Periodic advertising sync events.
pub trait PaSyncObserver {
    /// A PA sync was established, either locally created or transferred.
    fn on_pa_synced(&self, sync: PaSyncHandle, info: &PaSyncedInfo);
    /// A PA sync was terminated with an HCI reason code.
    fn on_pa_terminated(&self, sync: PaSyncHandle, reason: u8);
}

/// Broadcast sink events.
pub trait SinkObserver {
    /// A BASE was received on the PA. `base` is the raw BASE structure.
    fn on_base_received(&self, sink: SinkHandle, base: &[u8]);
    /// BIGInfo was received: the BIG can now be synced.
    fn on_syncable(&self, sink: SinkHandle, info: &BigInfo);
    /// The sink has synced to the BIG.
    fn on_sink_started(&self, sink: SinkHandle);
    /// The sink has left the BIG.
    fn on_sink_stopped(&self, sink: SinkHandle, reason: u8);
}

/// Per-stream events.
pub trait StreamObserver {
    /// The ISO channel for `stream` was connected.
    fn on_stream_connected(&self, stream: StreamId);
    /// The ISO channel for `stream` was disconnected.
    fn on_stream_disconnected(&self, stream: StreamId, reason: u8);
    /// `stream` started delivering audio.
    fn on_stream_started(&self, stream: StreamId);
    /// `stream` stopped.
    fn on_stream_stopped(&self, stream: StreamId, reason: u8);
}

/// Scan delegator requests from a remote Broadcast Assistant.
///
/// An `Err` is reported back to the assistant as a rejection.
pub trait DelegatorHandler {
    /// A receive state changed.
    fn on_recv_state_updated(&self, conn: ConnHandle, state: &ReceiverState);

    /// The assistant asks this device to sync to the PA of `state`.
    fn on_pa_sync_request(
        &self,
        conn: ConnHandle,
        state: &ReceiverState,
        past_available: bool,
        pa_interval: u16,
    ) -> Result<(), DelegatorError>;

    /// The assistant asks this device to drop its PA sync.
    fn on_pa_sync_terminate_request(
        &self,
        conn: ConnHandle,
        state: &ReceiverState,
    ) -> Result<(), DelegatorError>;

    /// The assistant delivered the broadcast code.
    fn on_broadcast_code(&self, conn: ConnHandle, state: &ReceiverState, code: &BroadcastCode);

    /// The assistant requests BIS sync, one bitfield per subgroup.
    fn on_bis_sync_request(
        &self,
        conn: ConnHandle,
        state: &ReceiverState,
        requests: &[BisBitfield; BASS_MAX_SUBGROUPS],
    ) -> Result<(), DelegatorError>;
}

/// ACL connection events.
pub trait ConnectionObserver {
    /// A connection attempt completed; `status == 0` means success.
    fn on_connected(&self, conn: ConnHandle, status: u8);
    /// A connection was closed with an HCI reason code.
    fn on_disconnected(&self, conn: ConnHandle, reason: u8);
}
