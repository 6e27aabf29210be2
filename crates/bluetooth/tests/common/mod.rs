//! Builders shared by the integration tests: advertising data, BASE bytes,
//! receive states and a polling helper for the orchestrator phase.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::panic, clippy::arithmetic_side_effects)]

use bluetooth::{BroadcastSink, SinkConfig, SinkPhase};
use embassy_time::{Duration, Timer};
use platform::mocks::MockHost;
use platform::{
    AddrKind, BisBitfield, BtAddrLe, PaState, ReceiverState, ReceiverSubgroup, ScanReport,
};

pub const BROADCASTER: BtAddrLe =
    BtAddrLe::new(AddrKind::Random, [0x11, 0x22, 0x33, 0x44, 0x55, 0xC6]);
pub const SID: u8 = 0x01;
pub const BROADCAST_ID: u32 = 0x0012_3456;
pub const PA_INTERVAL: u16 = 0x0050;

/// Sink with a fresh mock host.
pub fn sink(config: SinkConfig) -> BroadcastSink<MockHost> {
    BroadcastSink::new(MockHost::new(), config).unwrap()
}

/// Self-scanning config with waits short enough for tests.
pub fn self_scan_config() -> SinkConfig {
    SinkConfig::new()
        .with_scan_modes(true, false)
        .with_timeouts(Duration::from_millis(500), Duration::from_millis(500))
}

/// Assistant-only config; the sink waits for an assistant forever.
pub fn assistant_config() -> SinkConfig {
    SinkConfig::new()
        .with_scan_modes(false, true)
        .with_timeouts(Duration::from_millis(500), Duration::from_millis(500))
}

/// Extended advertising data: complete name plus a Broadcast Audio
/// Announcement carrying `id`.
pub fn announcement(name: &str, id: u32) -> Vec<u8> {
    let mut ad = Vec::new();
    ad.push(u8::try_from(name.len() + 1).unwrap());
    ad.push(0x09);
    ad.extend_from_slice(name.as_bytes());
    ad.extend_from_slice(&[0x06, 0x16, 0x52, 0x18]);
    ad.extend_from_slice(&id.to_le_bytes()[..3]);
    ad
}

pub fn report(data: &[u8]) -> ScanReport<'_> {
    ScanReport {
        addr: BROADCASTER,
        sid: SID,
        interval: PA_INTERVAL,
        rssi: -40,
        data,
    }
}

fn allocation_ltv(out: &mut Vec<u8>, location: Option<u32>) {
    match location {
        Some(bits) => {
            out.push(6);
            out.extend_from_slice(&[0x05, 0x03]);
            out.extend_from_slice(&bits.to_le_bytes());
        }
        None => out.push(0),
    }
}

/// LC3 BASE with one entry per subgroup: the subgroup's channel allocation
/// and its `(bis index, bis allocation)` pairs.
pub fn lc3_base(subgroups: &[(Option<u32>, &[(u8, Option<u32>)])]) -> Vec<u8> {
    let mut out = vec![0x40, 0x9C, 0x00];
    out.push(u8::try_from(subgroups.len()).unwrap());
    for (allocation, bis) in subgroups {
        out.push(u8::try_from(bis.len()).unwrap());
        out.extend_from_slice(&[0x06, 0, 0, 0, 0]);
        allocation_ltv(&mut out, *allocation);
        out.push(0);
        for (index, location) in *bis {
            out.push(*index);
            allocation_ltv(&mut out, *location);
        }
    }
    out
}

/// Receive state for the test broadcaster with `subgroups` announced.
pub fn receiver_state(pa_sync_state: PaState, subgroups: usize) -> ReceiverState {
    let mut state = ReceiverState {
        src_id: 1,
        addr: BROADCASTER,
        adv_sid: SID,
        broadcast_id: BROADCAST_ID,
        pa_sync_state,
        ..ReceiverState::default()
    };
    for _ in 0..subgroups {
        state
            .subgroups
            .push(ReceiverSubgroup { bis_sync: BisBitfield::EMPTY })
            .unwrap();
    }
    state
}

/// Request table with `first` for subgroup 0 and nothing elsewhere.
pub fn request(first: u32) -> [BisBitfield; 4] {
    [
        BisBitfield::from_bits(first),
        BisBitfield::EMPTY,
        BisBitfield::EMPTY,
        BisBitfield::EMPTY,
    ]
}

/// Poll until the sink reaches `phase`.
pub async fn wait_for_phase(sink: &BroadcastSink<MockHost>, phase: SinkPhase) {
    for _ in 0..2000 {
        if sink.phase() == phase {
            return;
        }
        Timer::after_millis(1).await;
    }
    panic!("sink never reached `{phase}`, stuck at `{}`", sink.phase());
}
