//! The broadcast sink: session context, bring-up, reset and sink callbacks.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use platform::{
    BapHost, BigInfo, BisBitfield, CodecCapability, ConnHandle, HostError, PaSyncHandle,
    ReceiverState, SinkHandle, SinkObserver, StreamId, StreamObserver, BASS_MAX_SUBGROUPS,
};

use crate::base::{Base, BaseData};
use crate::config::SinkConfig;
use crate::error::{ResetError, SinkError};
use crate::gate::Gates;
use crate::hci::{reason, reason_str};
use crate::orchestrator::SinkPhase;
use crate::pa_sync::PaTimerCommand;
use crate::state::Session;

/// Handles owned by the sink session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SinkHandles {
    /// Periodic advertising sync.
    pub pa_sync: Option<PaSyncHandle>,
    /// Broadcast sink.
    pub sink: Option<SinkHandle>,
    /// Broadcast Assistant connection.
    pub conn: Option<ConnHandle>,
}

impl SinkHandles {
    /// `true` when nothing is held.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.pa_sync.is_none() && self.sink.is_none() && self.conn.is_none()
    }
}

/// LE Audio broadcast sink.
///
/// Host callbacks arrive through the observer traits implemented on this
/// type; [`BroadcastSink::run`] drives the sync cycle. Both may execute on
/// different contexts. Session data sits behind a critical-section mutex
/// that is never held across a host call.
pub struct BroadcastSink<H: BapHost> {
    host: H,
    config: SinkConfig,
    session: Mutex<CriticalSectionRawMutex, RefCell<Session>>,
    gates: Gates,
    pub(crate) pa_timer: Signal<CriticalSectionRawMutex, PaTimerCommand>,
}

impl<H: BapHost> BroadcastSink<H> {
    /// Create a sink on top of `host`.
    ///
    /// # Errors
    ///
    /// [`SinkError::Config`] when `config` does not validate.
    pub fn new(host: H, config: SinkConfig) -> Result<Self, SinkError> {
        config.validate()?;
        Ok(Self {
            host,
            gates: Gates::new(config.stream_count),
            config,
            session: Mutex::new(RefCell::new(Session::new())),
            pa_timer: Signal::new(),
        })
    }

    /// Bring up the stack and register the sink's services.
    ///
    /// # Errors
    ///
    /// [`SinkError::Init`] with the first failing host call.
    pub fn init(&self) -> Result<(), SinkError> {
        let fatal = |step: &'static str| {
            move |err: HostError| {
                error!("{} failed: {}", step, err);
                SinkError::Init(err)
            }
        };

        self.host.enable().map_err(fatal("Bluetooth enable"))?;
        info!("Bluetooth initialized");

        self.host.register_pacs().map_err(fatal("PACS registration"))?;
        let capability = CodecCapability::lc3_sink(self.config.max_codec_frames_per_sdu);
        self.host
            .register_sink_capability(&capability)
            .map_err(fatal("Capability registration"))?;
        self.host
            .register_scan_delegator()
            .map_err(fatal("Scan delegator registration"))?;

        if self.config.lc3 {
            self.host.init_lc3().map_err(fatal("LC3 init"))?;
        }
        if self.config.usb_audio {
            self.host.init_usb_audio().map_err(fatal("USB audio init"))?;
        }
        Ok(())
    }

    /// Release everything held by the previous cycle.
    ///
    /// Deletes the sink, then the PA sync, disconnects the assistant and
    /// empties every gate.
    ///
    /// # Errors
    ///
    /// [`SinkError::Reset`] naming the deletion that failed. Later steps are
    /// skipped.
    pub fn reset(&self) -> Result<(), SinkError> {
        info!("Reset");
        let (sink, pa_sync) = self.with_session(|s| {
            s.clear_cycle();
            (s.sink, s.pa_sync)
        });

        if let Some(sink) = sink {
            self.host.sink_delete(sink).map_err(|err| {
                error!("Deleting broadcast sink failed: {}", err);
                ResetError::SinkDelete(err)
            })?;
            self.with_session(|s| s.sink = None);
        }

        if let Some(sync) = pa_sync {
            self.host.pa_sync_delete(sync).map_err(|err| {
                error!("Deleting PA sync failed: {}", err);
                ResetError::PaSyncDelete(err)
            })?;
            self.with_session(|s| s.pa_sync = None);
        }

        if let Some(conn) = self.with_session(|s| s.assistant.release()) {
            if let Err(err) = self.host.disconnect(conn, reason::REMOTE_USER_TERM_CONN) {
                warn!("Failed to disconnect assistant {}: {}", conn.0, err);
            }
        }

        self.gates.reset_all();
        self.pa_timer.signal(PaTimerCommand::Cancel);
        Ok(())
    }

    /// Current orchestrator phase.
    pub fn phase(&self) -> SinkPhase {
        self.with_session(|s| s.phase)
    }

    /// Handles currently owned by the session.
    pub fn handles(&self) -> SinkHandles {
        self.with_session(|s| SinkHandles {
            pa_sync: s.pa_sync,
            sink: s.sink,
            conn: s.assistant.conn(),
        })
    }

    /// BIS requested per subgroup.
    pub fn requested_bis(&self) -> [BisBitfield; BASS_MAX_SUBGROUPS] {
        self.with_session(|s| s.requested_bis)
    }

    /// Receive state last handed over by the assistant.
    pub fn receiver_state(&self) -> Option<ReceiverState> {
        self.with_session(|s| s.recv_state.clone())
    }

    /// `true` while synced to the BIG.
    pub fn is_big_synced(&self) -> bool {
        self.with_session(|s| s.big_synced)
    }

    /// Rendezvous gates.
    pub fn gates(&self) -> &Gates {
        &self.gates
    }

    /// Underlying host stack.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Active configuration.
    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    pub(crate) fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        self.session.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub(crate) fn set_phase(&self, phase: SinkPhase) {
        let previous = self.with_session(|s| core::mem::replace(&mut s.phase, phase));
        if previous != phase {
            info!("{} -> {}", previous, phase);
        }
    }
}

impl<H: BapHost> SinkObserver for BroadcastSink<H> {
    fn on_base_received(&self, sink: SinkHandle, bytes: &[u8]) {
        if self.with_session(|s| s.base_received) {
            return;
        }

        let base = match Base::parse(bytes) {
            Ok(base) => base,
            Err(err) => {
                warn!("Failed to get valid BIS indexes: {}", err);
                return;
            }
        };
        info!(
            "Received BASE with {} subgroups from broadcast sink {}",
            base.subgroup_count(),
            sink.0
        );
        let data = BaseData::resolve(&base, BASS_MAX_SUBGROUPS);

        let latched = self.with_session(|s| {
            if s.base_received {
                return None;
            }
            s.base = data;
            s.base_received = true;
            let self_directed = !s.assistant.is_connected();
            if self_directed {
                s.requested_bis = [BisBitfield::NO_PREFERENCE; BASS_MAX_SUBGROUPS];
            }
            Some(self_directed)
        });

        if let Some(self_directed) = latched {
            if self_directed {
                self.gates.bis_sync_requested.give();
            }
            self.gates.base_received.give();
        }
    }

    fn on_syncable(&self, sink: SinkHandle, info: &BigInfo) {
        info!(
            "Broadcast sink {} is syncable, {} BIS, encrypted: {}",
            sink.0,
            info.num_bis,
            info.encryption
        );
        self.gates.syncable.give();
        if !info.encryption {
            self.gates.broadcast_code.give();
        }
    }

    fn on_sink_started(&self, sink: SinkHandle) {
        info!("Broadcast sink {} started", sink.0);
        self.with_session(|s| s.big_synced = true);
        self.gates.big_synced.give();
    }

    fn on_sink_stopped(&self, sink: SinkHandle, stop_reason: u8) {
        info!(
            "Broadcast sink {} stopped with reason {:#x} ({})",
            sink.0,
            stop_reason,
            reason_str(stop_reason)
        );
        self.with_session(|s| s.big_synced = false);
        self.gates.sink_stopped.give();
    }
}

impl<H: BapHost> StreamObserver for BroadcastSink<H> {
    fn on_stream_connected(&self, stream: StreamId) {
        debug!("Stream {} connected", stream.0);
        self.gates.stream_connected.give();
    }

    fn on_stream_disconnected(&self, stream: StreamId, disc_reason: u8) {
        debug!("Stream {} disconnected with reason {:#x}", stream.0, disc_reason);
        if !self.gates.stream_connected.try_take() {
            warn!("No connected stream left to take for stream {}", stream.0);
        }
    }

    fn on_stream_started(&self, stream: StreamId) {
        info!("Stream {} started", stream.0);
        self.gates.stream_started.give();
    }

    fn on_stream_stopped(&self, stream: StreamId, stop_reason: u8) {
        info!("Stream {} stopped with reason {:#x}", stream.0, stop_reason);
        if !self.gates.stream_started.try_take() {
            warn!("No started stream left to take for stream {}", stream.0);
        }
    }
}
