//! Scripted air interface.
//!
//! Plays one broadcaster and, optionally, one Broadcast Assistant that
//! hands the broadcaster over through PAST. Reacts to [`Command`]s from the
//! [`SimHost`](crate::host::SimHost) by invoking the sink's callbacks after
//! short, fixed delays.

use std::sync::Arc;
use std::time::Duration;

use bluetooth::hci::{ad_type, reason};
use bluetooth::BroadcastSink;
use platform::{
    AddrKind, BigInfo, BisBitfield, BroadcastCode, BroadcastId, BtAddrLe, ConnHandle,
    ConnectionObserver, DelegatorHandler, EncryptState, PaState, PaSyncHandle, PaSyncObserver,
    PaSyncedInfo, ReceiverState, ReceiverSubgroup, ScanObserver, ScanReport, SinkHandle,
    SinkObserver, StreamId, StreamObserver, BASS_MAX_SUBGROUPS,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::host::{Command, SimHost};

const AIR_DELAY: Duration = Duration::from_millis(100);
const ASSISTANT_CONN: ConnHandle = ConnHandle(0x0040);
/// Handle the controller assigns to a transferred PA sync.
const PAST_SYNC: PaSyncHandle = PaSyncHandle(0x0100);
const SOURCE_ID: u8 = 1;

/// A broadcast source on the air.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    pub name: String,
    pub addr: BtAddrLe,
    pub sid: u8,
    pub broadcast_id: BroadcastId,
    /// PA interval in 1.25 ms units.
    pub interval: u16,
    pub base: Vec<u8>,
    pub code: Option<BroadcastCode>,
    /// How long the broadcast runs once the sink has joined.
    pub lifetime: Duration,
}

impl Broadcaster {
    /// Stereo LC3 broadcast: BIS 1 front left, BIS 2 front right.
    pub fn stereo(name: &str, broadcast_id: BroadcastId, lifetime: Duration) -> Self {
        Self {
            name: name.to_owned(),
            addr: BtAddrLe::new(AddrKind::Random, [0x01, 0x02, 0x03, 0x04, 0x05, 0xC0]),
            sid: 0,
            broadcast_id,
            interval: 0x0050,
            base: stereo_base(),
            code: None,
            lifetime,
        }
    }

    /// Extended advertising data: broadcast name and announcement.
    pub fn advertising_data(&self) -> Vec<u8> {
        advertising_data(&self.name, self.broadcast_id)
    }

    fn synced_info(&self) -> PaSyncedInfo {
        PaSyncedInfo {
            addr: self.addr,
            sid: self.sid,
            interval: self.interval,
        }
    }
}

fn advertising_data(name: &str, broadcast_id: BroadcastId) -> Vec<u8> {
    let name = name.as_bytes();
    let name = name.get(..name.len().min(29)).unwrap_or(name);
    let mut ad = Vec::with_capacity(name.len().saturating_add(9));
    ad.push(u8::try_from(name.len().saturating_add(1)).unwrap_or(u8::MAX));
    ad.push(ad_type::BROADCAST_NAME);
    ad.extend_from_slice(name);
    ad.extend_from_slice(&[6, ad_type::SVC_DATA16, 0x52, 0x18]);
    let [id0, id1, id2, _] = broadcast_id.get().to_le_bytes();
    ad.extend_from_slice(&[id0, id1, id2]);
    ad
}

/// BASE with one LC3 16_2 subgroup carrying a left and a right BIS.
fn stereo_base() -> Vec<u8> {
    let mut base = vec![0x40, 0x9C, 0x00, 0x01, 0x02];
    base.extend_from_slice(&[0x06, 0x00, 0x00, 0x00, 0x00]);
    // Sampling 16 kHz, 10 ms frames, 40 octets per frame.
    base.extend_from_slice(&[10, 0x02, 0x01, 0x03, 0x02, 0x02, 0x01, 0x03, 0x04, 0x28, 0x00]);
    base.push(0);
    for (index, location) in [(1u8, 0x01u32), (2, 0x02)] {
        base.push(index);
        base.push(6);
        base.extend_from_slice(&[0x05, 0x03]);
        base.extend_from_slice(&location.to_le_bytes());
    }
    base
}

/// Sleep until `deadline`, or forever without one.
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

struct Big {
    sink: SinkHandle,
    bis: BisBitfield,
}

pub struct Radio {
    sink: Arc<BroadcastSink<SimHost>>,
    commands: UnboundedReceiver<Command>,
    broadcaster: Broadcaster,
    neighbour: Vec<u8>,
    assistant: bool,
    scanning: bool,
    pa_sync: Option<PaSyncHandle>,
    big: Option<Big>,
    /// When the joined broadcast goes off the air.
    off_air: Option<Instant>,
}

impl Radio {
    pub fn new(
        sink: Arc<BroadcastSink<SimHost>>,
        commands: UnboundedReceiver<Command>,
        broadcaster: Broadcaster,
        assistant: bool,
    ) -> Self {
        let neighbour_id = BroadcastId::new(broadcaster.broadcast_id.get() ^ 0x00FF_0000)
            .unwrap_or(broadcaster.broadcast_id);
        Self {
            sink,
            commands,
            neighbour: advertising_data("Neighbour TV", neighbour_id),
            broadcaster,
            assistant,
            scanning: false,
            pa_sync: None,
            big: None,
            off_air: None,
        }
    }

    /// Serve host commands until the sink side hangs up.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        return;
                    };
                    debug!(?command, "radio");
                    self.handle(command).await;
                }
                () = until(self.off_air) => {
                    self.off_air = None;
                    self.end_broadcast();
                }
            }
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::ScanStart => {
                self.scanning = true;
                sleep(AIR_DELAY).await;
                self.advertise_broadcasts();
            }
            Command::ScanStop => self.scanning = false,
            Command::AdvStart(_) if self.assistant => {
                sleep(AIR_DELAY).await;
                self.assistant_connects().await;
            }
            Command::AdvStart(_) | Command::AdvStop(_) => {}
            Command::PaSyncCreate(params, sync) => {
                if params.addr != self.broadcaster.addr || params.sid != self.broadcaster.sid {
                    warn!("PA sync requested for an unknown advertiser");
                    return;
                }
                sleep(AIR_DELAY).await;
                self.pa_sync = Some(sync);
                self.sink.on_pa_synced(sync, &self.broadcaster.synced_info());
            }
            Command::PastSubscribe(conn) => {
                sleep(AIR_DELAY).await;
                info!(conn = conn.0, "assistant transfers the PA sync");
                self.pa_sync = Some(PAST_SYNC);
                self.sink.on_pa_synced(PAST_SYNC, &self.broadcaster.synced_info());
            }
            Command::PaSyncDelete(sync) => {
                if self.pa_sync == Some(sync) {
                    self.pa_sync = None;
                    self.off_air = None;
                    self.sink.on_pa_terminated(sync, reason::LOCALHOST_TERM_CONN);
                }
            }
            Command::SinkCreate(_, sink, broadcast_id) => {
                if broadcast_id != self.broadcaster.broadcast_id {
                    warn!(id = broadcast_id.get(), "sink created for an unknown broadcast");
                    return;
                }
                sleep(AIR_DELAY).await;
                self.announce_big(sink);
            }
            Command::SinkSync(sink, bis, code) => {
                if self.broadcaster.code.is_some_and(|expected| expected != code) {
                    warn!("BIG sync with a wrong broadcast code");
                    return;
                }
                sleep(AIR_DELAY).await;
                self.join_big(sink, bis);
                self.off_air = Instant::now().checked_add(self.broadcaster.lifetime);
            }
            Command::SinkStop(sink) => {
                if self.big.as_ref().is_some_and(|big| big.sink == sink) {
                    self.leave_big(reason::LOCALHOST_TERM_CONN);
                }
            }
            Command::SinkDelete(_) => {}
            Command::SetPaState(src_id, state) => {
                info!(src_id, state = state as u8, "assistant sees new PA state");
            }
            Command::RemoveSource(src_id) => info!(src_id, "assistant sees source removed"),
            Command::Disconnect(conn, disc_reason) => {
                debug!(conn = conn.0, reason = disc_reason, "link closed");
                self.sink.on_disconnected(conn, reason::LOCALHOST_TERM_CONN);
            }
        }
    }

    fn advertise_broadcasts(&self) {
        if !self.scanning {
            return;
        }
        let ad = self.broadcaster.advertising_data();
        let neighbour = ScanReport {
            addr: BtAddrLe::new(AddrKind::Random, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xC1]),
            sid: 1,
            interval: 0x00A0,
            rssi: -70,
            data: &self.neighbour,
        };
        let target = ScanReport {
            addr: self.broadcaster.addr,
            sid: self.broadcaster.sid,
            interval: self.broadcaster.interval,
            rssi: -48,
            data: &ad,
        };
        self.sink.on_scan_report(&neighbour);
        self.sink.on_scan_report(&target);
    }

    fn receiver_state(&self, pa_sync_state: PaState) -> ReceiverState {
        let mut state = ReceiverState {
            src_id: SOURCE_ID,
            addr: self.broadcaster.addr,
            adv_sid: self.broadcaster.sid,
            broadcast_id: self.broadcaster.broadcast_id.get(),
            pa_sync_state,
            encrypt_state: if self.broadcaster.code.is_some() {
                EncryptState::CodeRequired
            } else {
                EncryptState::NotEncrypted
            },
            ..ReceiverState::default()
        };
        if state
            .subgroups
            .push(ReceiverSubgroup {
                bis_sync: BisBitfield::EMPTY,
            })
            .is_err()
        {
            warn!("receive state has no room for a subgroup");
        }
        state
    }

    async fn assistant_connects(&self) {
        info!(conn = ASSISTANT_CONN.0, "Broadcast Assistant connects");
        self.sink.on_connected(ASSISTANT_CONN, 0);

        sleep(AIR_DELAY).await;
        let state = self.receiver_state(PaState::NotSynced);
        self.sink.on_recv_state_updated(ASSISTANT_CONN, &state);
        if let Err(err) =
            self.sink
                .on_pa_sync_request(ASSISTANT_CONN, &state, true, self.broadcaster.interval)
        {
            warn!(%err, "PA sync request rejected");
        }
    }

    fn announce_big(&self, sink: SinkHandle) {
        self.sink.on_base_received(sink, &self.broadcaster.base);
        self.sink.on_syncable(
            sink,
            &BigInfo {
                num_bis: 2,
                encryption: self.broadcaster.code.is_some(),
            },
        );
        if !self.assistant {
            return;
        }

        let state = self.receiver_state(PaState::Synced);
        if let Some(code) = self.broadcaster.code {
            self.sink.on_broadcast_code(ASSISTANT_CONN, &state, &code);
        }
        let requests = [BisBitfield::NO_PREFERENCE; BASS_MAX_SUBGROUPS];
        if let Err(err) = self.sink.on_bis_sync_request(ASSISTANT_CONN, &state, &requests) {
            warn!(%err, "BIS sync request rejected");
        }
    }

    fn join_big(&mut self, sink: SinkHandle, bis: BisBitfield) {
        info!(bitfield = format_args!("{:#x}", bis.bits()), "BIG joined");
        self.big = Some(Big { sink, bis });
        self.sink.on_sink_started(sink);
        for index in bis.iter() {
            let stream = StreamId(index.get());
            self.sink.on_stream_connected(stream);
            self.sink.on_stream_started(stream);
        }
    }

    fn leave_big(&mut self, stop_reason: u8) {
        let Some(big) = self.big.take() else {
            return;
        };
        for index in big.bis.iter() {
            let stream = StreamId(index.get());
            self.sink.on_stream_stopped(stream, stop_reason);
            self.sink.on_stream_disconnected(stream, stop_reason);
        }
        self.sink.on_sink_stopped(big.sink, stop_reason);
    }

    /// The broadcaster goes off the air: PA and BIG are lost together.
    fn end_broadcast(&mut self) {
        info!("broadcaster stops");
        if let Some(sync) = self.pa_sync.take() {
            self.sink.on_pa_terminated(sync, reason::CONN_TIMEOUT);
        }
        self.leave_big(reason::CONN_TIMEOUT);
    }
}
