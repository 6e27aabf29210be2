//! Whole sync cycles driven against the mock host.
//!
//! A driver future plays the host stack: it waits for the orchestrator to
//! park in a phase, then delivers the callback that phase is waiting on.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use bluetooth::{
    BroadcastSink, CycleOutcome, ResetError, RestartReason, SinkConfig, SinkError, SinkPhase,
};
use common::{
    announcement, lc3_base, receiver_state, report, request, wait_for_phase, BROADCASTER,
    BROADCAST_ID, PA_INTERVAL, SID,
};
use embassy_time::Duration;
use platform::mocks::{HostCall, HostOp, MockHost};
use platform::{
    AudioLocation, BigInfo, BisBitfield, BroadcastId, ConnHandle, ConnectionObserver,
    DelegatorHandler, HostError, PaState, PaSyncHandle, PaSyncObserver, PaSyncParams,
    PaSyncedInfo, ScanObserver, ScanReport, SinkHandle, SinkObserver, BASS_MAX_SUBGROUPS,
};

const CONN: ConnHandle = ConnHandle(1);
const CODE: [u8; 16] = [0xA5; 16];

fn synced_info() -> PaSyncedInfo {
    PaSyncedInfo {
        addr: BROADCASTER,
        sid: SID,
        interval: PA_INTERVAL,
    }
}

fn stereo_base() -> Vec<u8> {
    lc3_base(&[(
        None,
        &[
            (1, Some(AudioLocation::FRONT_LEFT.bits())),
            (2, Some(AudioLocation::FRONT_RIGHT.bits())),
        ],
    )])
}

/// Play a broadcaster found by scanning, up to the BIG becoming syncable.
async fn discover_and_sync(sink: &BroadcastSink<MockHost>, base: &[u8]) {
    wait_for_phase(sink, SinkPhase::Scanning).await;
    let ad = announcement("Speaker", BROADCAST_ID);
    sink.on_scan_report(&ScanReport {
        interval: 0,
        ..report(&ad)
    });
    sink.on_scan_report(&report(&ad));

    wait_for_phase(sink, SinkPhase::PaSyncing).await;
    sink.on_pa_synced(PaSyncHandle(0), &synced_info());

    wait_for_phase(sink, SinkPhase::WaitingBase).await;
    sink.on_base_received(SinkHandle(0), base);
    sink.on_syncable(
        SinkHandle(0),
        &BigInfo {
            num_bis: 2,
            encryption: false,
        },
    );
}

/// Play the end of a broadcast: BIG joined, PA lost, sink stopped.
async fn stream_until_lost(sink: &BroadcastSink<MockHost>, sync: PaSyncHandle) {
    wait_for_phase(sink, SinkPhase::JoiningBig).await;
    sink.on_sink_started(SinkHandle(0));

    wait_for_phase(sink, SinkPhase::WaitingPaLost).await;
    sink.on_pa_terminated(sync, 0x08);

    wait_for_phase(sink, SinkPhase::WaitingSinkStopped).await;
    sink.on_sink_stopped(SinkHandle(0), 0x08);
}

#[tokio::test]
async fn self_scan_cycle_completes() {
    let sink = common::sink(common::self_scan_config());

    let drive = async {
        discover_and_sync(&sink, &stereo_base()).await;
        stream_until_lost(&sink, PaSyncHandle(0)).await;
    };
    let (outcome, ()) = tokio::join!(sink.run_cycle(), drive);

    assert_eq!(outcome.unwrap(), CycleOutcome::Completed);
    assert_eq!(sink.phase(), SinkPhase::Idle);

    let calls = sink.host().calls();
    assert!(calls.contains(&HostCall::PaSyncCreate(PaSyncParams {
        addr: BROADCASTER,
        sid: SID,
        skip: 5,
        timeout: 50,
        filter_duplicates: true,
    })));
    assert!(calls.contains(&HostCall::SinkCreate(
        PaSyncHandle(0),
        BroadcastId::new(BROADCAST_ID).unwrap()
    )));
    assert!(
        calls.contains(&HostCall::SinkSync(
            SinkHandle(0),
            BisBitfield::from_bits(0b1),
            [0; 16]
        )),
        "one stream by default, lowest BIS first, zero code when unencrypted"
    );
    assert_eq!(sink.host().count(HostOp::ScanStop), 1);
    assert_eq!(
        sink.host().count(HostOp::RemoveSource),
        0,
        "no assistant, nothing to remove"
    );
}

#[tokio::test]
async fn assistant_cycle_uses_past_and_removes_source_on_loss() {
    let sink = common::sink(common::assistant_config());
    let state = receiver_state(PaState::NotSynced, 1);

    let drive = async {
        wait_for_phase(&sink, SinkPhase::AdvertisingForAssistant).await;
        sink.on_connected(CONN, 0);

        wait_for_phase(&sink, SinkPhase::WaitingPaRequest).await;
        sink.on_pa_sync_request(CONN, &state, true, PA_INTERVAL).unwrap();

        wait_for_phase(&sink, SinkPhase::PaSyncing).await;
        sink.on_pa_synced(PaSyncHandle(7), &synced_info());

        wait_for_phase(&sink, SinkPhase::WaitingBase).await;
        sink.on_base_received(SinkHandle(0), &stereo_base());
        assert!(
            sink.gates().bis_sync_requested.is_empty(),
            "with an assistant the BIS come from its request"
        );
        sink.on_syncable(
            SinkHandle(0),
            &BigInfo {
                num_bis: 2,
                encryption: true,
            },
        );
        sink.on_broadcast_code(CONN, &state, &CODE);
        sink.on_bis_sync_request(CONN, &state, &request(0b10)).unwrap();

        stream_until_lost(&sink, PaSyncHandle(7)).await;
    };
    let (outcome, ()) = tokio::join!(sink.run_cycle(), drive);

    assert_eq!(outcome.unwrap(), CycleOutcome::Completed);
    let ops = sink.host().ops();
    assert!(!ops.contains(&HostOp::ScanStart), "PAST replaces scanning");
    assert!(ops.contains(&HostOp::AdvStart));
    assert!(sink.host().calls().contains(&HostCall::SinkSync(
        SinkHandle(0),
        BisBitfield::from_bits(0b10),
        CODE
    )));

    let stop = ops.iter().position(|op| *op == HostOp::SinkStop).unwrap();
    let remove = ops.iter().position(|op| *op == HostOp::RemoveSource).unwrap();
    assert!(stop < remove, "the sink is stopped before the source is removed");
}

#[tokio::test]
async fn failed_sink_stop_keeps_the_source() {
    let sink = common::sink(common::assistant_config().with_timeouts(
        Duration::from_millis(200),
        Duration::from_millis(500),
    ));
    let state = receiver_state(PaState::NotSynced, 1);
    sink.host().fail_next(HostOp::SinkStop, HostError::Busy);

    let drive = async {
        wait_for_phase(&sink, SinkPhase::AdvertisingForAssistant).await;
        sink.on_connected(CONN, 0);
        wait_for_phase(&sink, SinkPhase::WaitingPaRequest).await;
        sink.on_pa_sync_request(CONN, &state, true, PA_INTERVAL).unwrap();
        wait_for_phase(&sink, SinkPhase::PaSyncing).await;
        sink.on_pa_synced(PaSyncHandle(7), &synced_info());
        wait_for_phase(&sink, SinkPhase::WaitingBase).await;
        sink.on_base_received(SinkHandle(0), &stereo_base());
        sink.on_syncable(
            SinkHandle(0),
            &BigInfo {
                num_bis: 2,
                encryption: false,
            },
        );
        sink.on_bis_sync_request(CONN, &state, &request(0b1)).unwrap();

        wait_for_phase(&sink, SinkPhase::JoiningBig).await;
        sink.on_sink_started(SinkHandle(0));
        wait_for_phase(&sink, SinkPhase::WaitingPaLost).await;
        sink.on_pa_terminated(PaSyncHandle(7), 0x08);
    };
    let (outcome, ()) = tokio::join!(sink.run_cycle(), drive);

    assert_eq!(sink.host().count(HostOp::SinkStop), 1);
    assert_eq!(sink.host().count(HostOp::RemoveSource), 0);
    assert_eq!(
        outcome.unwrap(),
        CycleOutcome::Restart(RestartReason::Timeout(SinkPhase::WaitingSinkStopped))
    );
}

#[test]
fn local_termination_keeps_the_source() {
    let sink = common::sink(common::self_scan_config());
    let state = receiver_state(PaState::NotSynced, 1);
    sink.on_recv_state_updated(CONN, &state);
    sink.on_pa_synced(PaSyncHandle(2), &synced_info());

    sink.on_pa_terminated(PaSyncHandle(2), 0x16);

    assert_eq!(sink.gates().pa_sync_lost.count(), 1);
    assert!(sink.host().calls().is_empty());
}

#[tokio::test]
async fn silent_air_restarts_from_scanning() {
    let config = common::self_scan_config()
        .with_timeouts(Duration::from_millis(50), Duration::from_millis(50));
    let sink = common::sink(config);

    let outcome = sink.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Restart(RestartReason::Timeout(SinkPhase::Scanning))
    );
    assert_eq!(sink.phase(), SinkPhase::Idle);
    assert_eq!(sink.host().count(HostOp::ScanStart), 1);
}

#[tokio::test]
async fn scan_already_running_is_not_fatal() {
    let config = common::self_scan_config()
        .with_timeouts(Duration::from_millis(50), Duration::from_millis(50));
    let sink = common::sink(config);
    sink.host().fail_next(HostOp::ScanStart, HostError::Already);

    let outcome = sink.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Restart(RestartReason::Timeout(SinkPhase::Scanning))
    );
}

#[tokio::test]
async fn scan_start_failure_stops_the_sink() {
    let sink = common::sink(common::self_scan_config());
    sink.host().fail_next(HostOp::ScanStart, HostError::Busy);

    let err = sink.run().await;

    assert_eq!(err, SinkError::ScanStart(HostError::Busy));
}

#[tokio::test]
async fn missing_target_channel_restarts() {
    let config = common::self_scan_config().with_target_channel(Some(AudioLocation::FRONT_LEFT));
    let sink = common::sink(config);
    let right_only = lc3_base(&[(None, &[(1, Some(AudioLocation::FRONT_RIGHT.bits()))])]);

    let drive = discover_and_sync(&sink, &right_only);
    let (outcome, ()) = tokio::join!(sink.run_cycle(), drive);

    assert_eq!(
        outcome.unwrap(),
        CycleOutcome::Restart(RestartReason::NoViableBis)
    );
    assert_eq!(sink.host().count(HostOp::SinkSync), 0);
}

#[tokio::test]
async fn rejected_big_sync_is_fatal() {
    let sink = common::sink(common::self_scan_config());
    sink.host().fail_next(HostOp::SinkSync, HostError::Io(-5));
    let base = stereo_base();

    let drive = discover_and_sync(&sink, &base);
    let (outcome, ()) = tokio::join!(sink.run_cycle(), drive);

    assert_eq!(outcome, Err(SinkError::SinkSync(HostError::Io(-5))));
}

#[tokio::test]
async fn malformed_base_is_not_latched() {
    let sink = common::sink(common::self_scan_config());

    let drive = async {
        wait_for_phase(&sink, SinkPhase::Scanning).await;
        let ad = announcement("Speaker", BROADCAST_ID);
        sink.on_scan_report(&report(&ad));
        wait_for_phase(&sink, SinkPhase::PaSyncing).await;
        sink.on_pa_synced(PaSyncHandle(0), &synced_info());
        wait_for_phase(&sink, SinkPhase::WaitingBase).await;

        sink.on_base_received(SinkHandle(0), &[0x40, 0x9C]);
        assert!(sink.gates().base_received.is_empty());

        sink.on_base_received(SinkHandle(0), &stereo_base());
        sink.on_syncable(
            SinkHandle(0),
            &BigInfo {
                num_bis: 2,
                encryption: false,
            },
        );
        stream_until_lost(&sink, PaSyncHandle(0)).await;
    };
    let (outcome, ()) = tokio::join!(sink.run_cycle(), drive);

    assert_eq!(outcome.unwrap(), CycleOutcome::Completed);
}

#[test]
fn self_directed_base_requests_any_bis() {
    let sink = common::sink(SinkConfig::new());

    sink.on_base_received(SinkHandle(0), &stereo_base());

    assert_eq!(
        sink.requested_bis(),
        [BisBitfield::NO_PREFERENCE; BASS_MAX_SUBGROUPS]
    );
    assert_eq!(sink.gates().bis_sync_requested.count(), 1);
    assert_eq!(sink.gates().base_received.count(), 1);

    sink.on_base_received(SinkHandle(0), &stereo_base());
    assert_eq!(
        sink.gates().base_received.count(),
        1,
        "only the first BASE of a cycle counts"
    );
}

#[test]
fn reset_releases_everything() {
    let sink = common::sink(SinkConfig::new());
    sink.on_connected(CONN, 0);
    sink.on_recv_state_updated(CONN, &receiver_state(PaState::NotSynced, 1));
    sink.on_pa_synced(PaSyncHandle(3), &synced_info());
    sink.on_base_received(SinkHandle(0), &stereo_base());
    sink.gates().sink_stopped.give();
    sink.host().clear_calls();

    sink.reset().unwrap();

    assert!(sink.handles().is_clear());
    assert!(sink.gates().all_empty());
    assert_eq!(sink.receiver_state(), None);
    assert_eq!(
        sink.host().calls(),
        vec![
            HostCall::PaSyncDelete(PaSyncHandle(3)),
            HostCall::Disconnect(CONN, 0x13),
        ]
    );
}

#[test]
fn reset_reports_failed_pa_sync_delete() {
    let sink = common::sink(SinkConfig::new());
    sink.on_recv_state_updated(CONN, &receiver_state(PaState::NotSynced, 1));
    sink.on_pa_synced(PaSyncHandle(3), &synced_info());
    sink.host().fail_next(HostOp::PaSyncDelete, HostError::Io(-5));

    let err = sink.reset().unwrap_err();

    assert_eq!(
        err,
        SinkError::Reset(ResetError::PaSyncDelete(HostError::Io(-5)))
    );
    assert_eq!(sink.handles().pa_sync, Some(PaSyncHandle(3)));
}

#[test]
fn init_registers_services_in_order() {
    let sink = common::sink(SinkConfig::new());
    sink.init().unwrap();
    assert_eq!(
        sink.host().ops(),
        vec![
            HostOp::Enable,
            HostOp::RegisterPacs,
            HostOp::RegisterSinkCapability,
            HostOp::RegisterScanDelegator,
        ]
    );
}

#[test]
fn init_stops_at_first_failure() {
    let sink = common::sink(SinkConfig::new());
    sink.host().fail_next(HostOp::RegisterPacs, HostError::NoMemory);

    assert_eq!(sink.init(), Err(SinkError::Init(HostError::NoMemory)));
    assert_eq!(sink.host().count(HostOp::RegisterScanDelegator), 0);
}
