//! Sync cycle driver.
//!
//! One cycle walks from [`SinkPhase::Idle`] to
//! [`SinkPhase::WaitingSinkStopped`], suspending on a gate at every step.
//! Any expired wait abandons the cycle; the next one starts with a full
//! reset.

use embassy_futures::select::{select, Either};
use embassy_time::Duration;
use platform::{BapHost, BisBitfield, BroadcastId, HostError};

use crate::bis_select::{select_bis_sync_bitfield, stream_count};
use crate::error::{CycleOutcome, RestartReason, SinkError};
use crate::gate::Gate;
use crate::sink::BroadcastSink;

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SinkPhase {
    /// Between cycles.
    #[default]
    Idle,
    /// Connectable advertising, waiting for an assistant.
    AdvertisingForAssistant,
    /// Assistant connected, waiting for its PA sync request.
    WaitingPaRequest,
    /// Scanning for a broadcaster.
    Scanning,
    /// Waiting for the PA sync.
    PaSyncing,
    /// Sink created, waiting for the BASE.
    WaitingBase,
    /// Waiting for BIGInfo.
    WaitingSyncable,
    /// Waiting for the broadcast code (given at once when unencrypted).
    WaitingBroadcastCode,
    /// Waiting for the requested BIS.
    WaitingBisRequest,
    /// Choosing the BIS to join.
    SelectingBis,
    /// BIG sync requested, waiting for the sink to start.
    JoiningBig,
    /// Receiving audio.
    Streaming,
    /// Streaming until the PA is lost.
    WaitingPaLost,
    /// PA lost, waiting for the sink to stop.
    WaitingSinkStopped,
}

impl core::fmt::Display for SinkPhase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::AdvertisingForAssistant => "advertising for a Broadcast Assistant",
            Self::WaitingPaRequest => "waiting for PA sync request",
            Self::Scanning => "scanning for broadcast sources",
            Self::PaSyncing => "waiting for PA sync",
            Self::WaitingBase => "waiting for BASE",
            Self::WaitingSyncable => "waiting for syncable",
            Self::WaitingBroadcastCode => "waiting for broadcast code",
            Self::WaitingBisRequest => "waiting for BIS sync request",
            Self::SelectingBis => "selecting BIS",
            Self::JoiningBig => "waiting for stream(s) started",
            Self::Streaming => "streaming",
            Self::WaitingPaLost => "waiting for PA disconnected",
            Self::WaitingSinkStopped => "waiting for sink to stop",
        })
    }
}

/// Why a cycle stopped early.
enum Abort {
    Restart(RestartReason),
    Fatal(SinkError),
}

impl From<RestartReason> for Abort {
    fn from(reason: RestartReason) -> Self {
        Self::Restart(reason)
    }
}

impl From<SinkError> for Abort {
    fn from(err: SinkError) -> Self {
        Self::Fatal(err)
    }
}

impl<H: BapHost> BroadcastSink<H> {
    /// Run cycles until one fails fatally, watching PAST transfers
    /// alongside. Call [`BroadcastSink::init`] first.
    pub async fn run(&self) -> SinkError {
        let cycles = async {
            loop {
                match self.run_cycle().await {
                    Ok(CycleOutcome::Completed) => info!("Broadcast ended"),
                    Ok(CycleOutcome::Restart(reason)) => warn!("{}, resetting", reason),
                    Err(err) => {
                        error!("Aborting: {}", err);
                        return err;
                    }
                }
            }
        };
        match select(cycles, self.pa_watchdog()).await {
            Either::First(err) => err,
            Either::Second(never) => match never {},
        }
    }

    /// One pass through the sync cycle, starting with [`BroadcastSink::reset`].
    ///
    /// # Errors
    ///
    /// Fatal failures only. Expired waits and refused host calls that a
    /// retry can cure come back as [`CycleOutcome::Restart`].
    pub async fn run_cycle(&self) -> Result<CycleOutcome, SinkError> {
        let outcome = match self.cycle().await {
            Ok(()) => Ok(CycleOutcome::Completed),
            Err(Abort::Restart(reason)) => Ok(CycleOutcome::Restart(reason)),
            Err(Abort::Fatal(err)) => Err(err),
        };
        self.set_phase(SinkPhase::Idle);
        outcome
    }

    async fn cycle(&self) -> Result<(), Abort> {
        self.reset()?;
        let gates = self.gates();
        let timeout = self.config().gate_timeout;

        let via_past = self.await_assistant().await?;

        if !via_past {
            self.set_phase(SinkPhase::Scanning);
            if self.config().target_broadcast_name.is_empty() {
                info!("Scanning for broadcast sources");
            } else {
                info!(
                    "Scanning for broadcast sources containing `{}`",
                    self.config().target_broadcast_name.as_str()
                );
            }
            match self.host().scan_start() {
                Ok(()) | Err(HostError::Already) => {}
                Err(err) => {
                    error!("Unable to start scan for broadcast sources: {}", err);
                    return Err(SinkError::ScanStart(err).into());
                }
            }

            self.wait(&gates.broadcaster_found, timeout).await?;

            self.host()
                .scan_stop()
                .map_err(RestartReason::ScanStop)?;

            self.set_phase(SinkPhase::PaSyncing);
            let broadcaster = self
                .with_session(|s| s.broadcaster)
                .ok_or(RestartReason::PaSyncCreate(HostError::InvalidArgument))?;
            info!(
                "Attempting to PA sync to the broadcaster with id {:#x}",
                broadcaster.broadcast_id.get()
            );
            self.create_direct_sync(&broadcaster)
                .map_err(RestartReason::PaSyncCreate)?;
        }

        self.set_phase(SinkPhase::PaSyncing);
        self.wait(&gates.pa_synced, timeout).await?;

        info!("Broadcast source PA synced, creating Broadcast Sink");
        let (pa_sync, broadcast_id) = self.with_session(|s| {
            let requested = s
                .recv_state
                .as_ref()
                .and_then(|state| BroadcastId::new(state.broadcast_id));
            (s.pa_sync, s.broadcast_id.or(requested))
        });
        let (Some(pa_sync), Some(broadcast_id)) = (pa_sync, broadcast_id) else {
            return Err(RestartReason::SinkCreate(HostError::InvalidArgument).into());
        };
        let sink = self
            .host()
            .sink_create(pa_sync, broadcast_id)
            .map_err(RestartReason::SinkCreate)?;
        self.with_session(|s| s.sink = Some(sink));

        self.set_phase(SinkPhase::WaitingBase);
        self.wait(&gates.base_received, timeout).await?;

        self.set_phase(SinkPhase::WaitingSyncable);
        self.wait(&gates.syncable, timeout).await?;

        self.set_phase(SinkPhase::WaitingBroadcastCode);
        self.wait(&gates.broadcast_code, timeout).await?;

        self.set_phase(SinkPhase::WaitingBisRequest);
        self.wait(&gates.bis_sync_requested, timeout).await?;

        self.set_phase(SinkPhase::SelectingBis);
        let (base, requested, code) =
            self.with_session(|s| (s.base, s.requested_bis, s.broadcast_code));
        let bitfield = select_bis_sync_bitfield(
            &base,
            &requested,
            self.config().target_channel,
            self.config().stream_count,
        );
        if bitfield == 0 {
            return Err(RestartReason::NoViableBis.into());
        }
        info!(
            "Syncing to broadcast with bitfield: {:#x}, stream_count = {}",
            bitfield,
            stream_count(bitfield)
        );

        self.set_phase(SinkPhase::JoiningBig);
        self.host()
            .sink_sync(sink, BisBitfield::from_bits(bitfield), &code)
            .map_err(|err| {
                error!("Unable to sync to broadcast source: {}", err);
                SinkError::SinkSync(err)
            })?;
        self.wait(&gates.big_synced, timeout).await?;

        self.set_phase(SinkPhase::Streaming);
        info!("Streaming {} BIS", stream_count(bitfield));

        self.set_phase(SinkPhase::WaitingPaLost);
        gates.pa_sync_lost.take().await;

        self.set_phase(SinkPhase::WaitingSinkStopped);
        self.wait(&gates.sink_stopped, timeout).await?;
        Ok(())
    }

    /// Advertise for and wait on a Broadcast Assistant when scan offload is
    /// on. Returns `true` when the PA sync will arrive through PAST.
    async fn await_assistant(&self) -> Result<bool, Abort> {
        let config = self.config();
        let gates = self.gates();
        if !config.scan_offload {
            return Ok(false);
        }

        if !self.assistant_connected() {
            self.set_phase(SinkPhase::AdvertisingForAssistant);
            gates.connected.reset();
            self.start_advertising().map_err(SinkError::from)?;

            info!("Waiting for Broadcast Assistant");
            let connected = if config.scan_self {
                gates
                    .connected
                    .take_within(config.assistant_timeout)
                    .await
                    .is_ok()
            } else {
                gates.connected.take().await;
                true
            };
            if !connected {
                info!("No Broadcast Assistant connected");
                self.stop_advertising().map_err(SinkError::from)?;
            }
        }

        if !self.assistant_connected() {
            return Ok(false);
        }

        gates.pa_request.reset();
        gates.past_request.reset();
        gates.disconnected.reset();

        self.set_phase(SinkPhase::WaitingPaRequest);
        self.wait(&gates.pa_request, config.assistant_timeout).await?;
        Ok(gates.past_request.try_take())
    }

    fn assistant_connected(&self) -> bool {
        self.with_session(|s| s.assistant.is_connected())
    }

    async fn wait(&self, gate: &Gate, timeout: Duration) -> Result<(), RestartReason> {
        let phase = self.phase();
        gate.take_within(timeout).await.map_err(|_| {
            warn!("Timed out while {}", phase);
            RestartReason::Timeout(phase)
        })
    }
}
