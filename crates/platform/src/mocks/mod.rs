//! Mock implementations for testing
//!
//! [`MockHost`] stands in for the Bluetooth host stack. It records every
//! call in order, hands out sequential handles and can be told to fail the
//! next call of a given kind. It never invokes observer callbacks itself;
//! tests drive those directly on the system under test.

#![cfg(any(test, feature = "std"))]

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

use crate::audio_types::BisBitfield;
use crate::bluetooth::{BapHost, HostError};
use crate::bluetooth_types::{
    AdvSetHandle, BroadcastCode, BroadcastId, CodecCapability, ConnHandle, PaState, PaSyncHandle,
    PaSyncParams, PastParams, SinkHandle, SourceId,
};

/// One recorded host call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    /// [`BapHost::enable`]
    Enable,
    /// [`BapHost::register_pacs`]
    RegisterPacs,
    /// [`BapHost::register_sink_capability`]
    RegisterSinkCapability(CodecCapability),
    /// [`BapHost::register_scan_delegator`]
    RegisterScanDelegator,
    /// [`BapHost::init_lc3`]
    InitLc3,
    /// [`BapHost::init_usb_audio`]
    InitUsbAudio,
    /// [`BapHost::scan_start`]
    ScanStart,
    /// [`BapHost::scan_stop`]
    ScanStop,
    /// [`BapHost::adv_create`]
    AdvCreate,
    /// [`BapHost::adv_set_data`]
    AdvSetData(AdvSetHandle, Vec<u8>),
    /// [`BapHost::adv_start`]
    AdvStart(AdvSetHandle),
    /// [`BapHost::adv_stop`]
    AdvStop(AdvSetHandle),
    /// [`BapHost::adv_delete`]
    AdvDelete(AdvSetHandle),
    /// [`BapHost::pa_sync_create`]
    PaSyncCreate(PaSyncParams),
    /// [`BapHost::pa_sync_delete`]
    PaSyncDelete(PaSyncHandle),
    /// [`BapHost::past_subscribe`]
    PastSubscribe(ConnHandle, PastParams),
    /// [`BapHost::sink_create`]
    SinkCreate(PaSyncHandle, BroadcastId),
    /// [`BapHost::sink_sync`]
    SinkSync(SinkHandle, BisBitfield, BroadcastCode),
    /// [`BapHost::sink_stop`]
    SinkStop(SinkHandle),
    /// [`BapHost::sink_delete`]
    SinkDelete(SinkHandle),
    /// [`BapHost::set_pa_state`]
    SetPaState(SourceId, PaState),
    /// [`BapHost::remove_source`]
    RemoveSource(SourceId),
    /// [`BapHost::disconnect`]
    Disconnect(ConnHandle, u8),
}

/// Kind of host call, used to target failure injection and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum HostOp {
    Enable,
    RegisterPacs,
    RegisterSinkCapability,
    RegisterScanDelegator,
    InitLc3,
    InitUsbAudio,
    ScanStart,
    ScanStop,
    AdvCreate,
    AdvSetData,
    AdvStart,
    AdvStop,
    AdvDelete,
    PaSyncCreate,
    PaSyncDelete,
    PastSubscribe,
    SinkCreate,
    SinkSync,
    SinkStop,
    SinkDelete,
    SetPaState,
    RemoveSource,
    Disconnect,
}

impl HostCall {
    /// Kind of this call.
    pub fn op(&self) -> HostOp {
        match self {
            Self::Enable => HostOp::Enable,
            Self::RegisterPacs => HostOp::RegisterPacs,
            Self::RegisterSinkCapability(_) => HostOp::RegisterSinkCapability,
            Self::RegisterScanDelegator => HostOp::RegisterScanDelegator,
            Self::InitLc3 => HostOp::InitLc3,
            Self::InitUsbAudio => HostOp::InitUsbAudio,
            Self::ScanStart => HostOp::ScanStart,
            Self::ScanStop => HostOp::ScanStop,
            Self::AdvCreate => HostOp::AdvCreate,
            Self::AdvSetData(..) => HostOp::AdvSetData,
            Self::AdvStart(_) => HostOp::AdvStart,
            Self::AdvStop(_) => HostOp::AdvStop,
            Self::AdvDelete(_) => HostOp::AdvDelete,
            Self::PaSyncCreate(_) => HostOp::PaSyncCreate,
            Self::PaSyncDelete(_) => HostOp::PaSyncDelete,
            Self::PastSubscribe(..) => HostOp::PastSubscribe,
            Self::SinkCreate(..) => HostOp::SinkCreate,
            Self::SinkSync(..) => HostOp::SinkSync,
            Self::SinkStop(_) => HostOp::SinkStop,
            Self::SinkDelete(_) => HostOp::SinkDelete,
            Self::SetPaState(..) => HostOp::SetPaState,
            Self::RemoveSource(_) => HostOp::RemoveSource,
            Self::Disconnect(..) => HostOp::Disconnect,
        }
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<HostCall>,
    failures: Vec<(HostOp, HostError)>,
    next_adv: u8,
    next_sync: u16,
    next_sink: u8,
}

/// Recording host-stack double.
#[derive(Default)]
pub struct MockHost {
    state: Mutex<MockState>,
}

impl MockHost {
    /// Create a mock host with an empty call log.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call of kind `op` fail with `err`. Injections for the
    /// same kind queue up and are consumed one per call.
    pub fn fail_next(&self, op: HostOp, err: HostError) {
        self.lock().failures.push((op, err));
    }

    /// Snapshot of every call so far, in order.
    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    /// Kinds of every call so far, in order.
    pub fn ops(&self) -> Vec<HostOp> {
        self.lock().calls.iter().map(HostCall::op).collect()
    }

    /// Number of calls of kind `op`.
    pub fn count(&self, op: HostOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    /// Forget recorded calls (pending failures are kept).
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Record `call` and return the injected failure for its kind, if any.
    fn record(&self, call: HostCall) -> Result<(), HostError> {
        let mut state = self.lock();
        let op = call.op();
        state.calls.push(call);
        match state.failures.iter().position(|(o, _)| *o == op) {
            Some(pos) => Err(state.failures.remove(pos).1),
            None => Ok(()),
        }
    }
}

impl BapHost for MockHost {
    fn enable(&self) -> Result<(), HostError> {
        self.record(HostCall::Enable)
    }

    fn register_pacs(&self) -> Result<(), HostError> {
        self.record(HostCall::RegisterPacs)
    }

    fn register_sink_capability(&self, capability: &CodecCapability) -> Result<(), HostError> {
        self.record(HostCall::RegisterSinkCapability(*capability))
    }

    fn register_scan_delegator(&self) -> Result<(), HostError> {
        self.record(HostCall::RegisterScanDelegator)
    }

    fn init_lc3(&self) -> Result<(), HostError> {
        self.record(HostCall::InitLc3)
    }

    fn init_usb_audio(&self) -> Result<(), HostError> {
        self.record(HostCall::InitUsbAudio)
    }

    fn scan_start(&self) -> Result<(), HostError> {
        self.record(HostCall::ScanStart)
    }

    fn scan_stop(&self) -> Result<(), HostError> {
        self.record(HostCall::ScanStop)
    }

    fn adv_create(&self) -> Result<AdvSetHandle, HostError> {
        self.record(HostCall::AdvCreate)?;
        let mut state = self.lock();
        let handle = AdvSetHandle(state.next_adv);
        state.next_adv = state.next_adv.wrapping_add(1);
        Ok(handle)
    }

    fn adv_set_data(&self, adv: AdvSetHandle, data: &[u8]) -> Result<(), HostError> {
        self.record(HostCall::AdvSetData(adv, data.to_vec()))
    }

    fn adv_start(&self, adv: AdvSetHandle) -> Result<(), HostError> {
        self.record(HostCall::AdvStart(adv))
    }

    fn adv_stop(&self, adv: AdvSetHandle) -> Result<(), HostError> {
        self.record(HostCall::AdvStop(adv))
    }

    fn adv_delete(&self, adv: AdvSetHandle) -> Result<(), HostError> {
        self.record(HostCall::AdvDelete(adv))
    }

    fn pa_sync_create(&self, params: &PaSyncParams) -> Result<PaSyncHandle, HostError> {
        self.record(HostCall::PaSyncCreate(*params))?;
        let mut state = self.lock();
        let handle = PaSyncHandle(state.next_sync);
        state.next_sync = state.next_sync.wrapping_add(1);
        Ok(handle)
    }

    fn pa_sync_delete(&self, sync: PaSyncHandle) -> Result<(), HostError> {
        self.record(HostCall::PaSyncDelete(sync))
    }

    fn past_subscribe(&self, conn: ConnHandle, params: &PastParams) -> Result<(), HostError> {
        self.record(HostCall::PastSubscribe(conn, *params))
    }

    fn sink_create(
        &self,
        sync: PaSyncHandle,
        broadcast_id: BroadcastId,
    ) -> Result<SinkHandle, HostError> {
        self.record(HostCall::SinkCreate(sync, broadcast_id))?;
        let mut state = self.lock();
        let handle = SinkHandle(state.next_sink);
        state.next_sink = state.next_sink.wrapping_add(1);
        Ok(handle)
    }

    fn sink_sync(
        &self,
        sink: SinkHandle,
        bis: BisBitfield,
        code: &BroadcastCode,
    ) -> Result<(), HostError> {
        self.record(HostCall::SinkSync(sink, bis, *code))
    }

    fn sink_stop(&self, sink: SinkHandle) -> Result<(), HostError> {
        self.record(HostCall::SinkStop(sink))
    }

    fn sink_delete(&self, sink: SinkHandle) -> Result<(), HostError> {
        self.record(HostCall::SinkDelete(sink))
    }

    fn set_pa_state(&self, src_id: SourceId, state: PaState) -> Result<(), HostError> {
        self.record(HostCall::SetPaState(src_id, state))
    }

    fn remove_source(&self, src_id: SourceId) -> Result<(), HostError> {
        self.record(HostCall::RemoveSource(src_id))
    }

    fn disconnect(&self, conn: ConnHandle, reason: u8) -> Result<(), HostError> {
        self.record(HostCall::Disconnect(conn, reason))
    }
}
