//! Simulated host stack.
//!
//! Every call is accepted, logged and forwarded to the radio task, which
//! answers with the callbacks a real controller would produce.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};

use platform::{
    AdvSetHandle, BapHost, BisBitfield, BroadcastCode, BroadcastId, CodecCapability, ConnHandle,
    HostError, PaState, PaSyncHandle, PaSyncParams, PastParams, SinkHandle, SourceId,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

const EIO: i32 = -5;

/// What the sink asked the stack to do, as seen by the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ScanStart,
    ScanStop,
    AdvStart(AdvSetHandle),
    AdvStop(AdvSetHandle),
    PaSyncCreate(PaSyncParams, PaSyncHandle),
    PaSyncDelete(PaSyncHandle),
    PastSubscribe(ConnHandle),
    SinkCreate(PaSyncHandle, SinkHandle, BroadcastId),
    SinkSync(SinkHandle, BisBitfield, BroadcastCode),
    SinkStop(SinkHandle),
    SinkDelete(SinkHandle),
    SetPaState(SourceId, PaState),
    RemoveSource(SourceId),
    Disconnect(ConnHandle, u8),
}

pub struct SimHost {
    radio: UnboundedSender<Command>,
    scanning: AtomicBool,
    next_adv: AtomicU8,
    next_sync: AtomicU16,
    next_sink: AtomicU8,
}

impl SimHost {
    pub fn new(radio: UnboundedSender<Command>) -> Self {
        Self {
            radio,
            scanning: AtomicBool::new(false),
            next_adv: AtomicU8::new(0),
            next_sync: AtomicU16::new(0),
            next_sink: AtomicU8::new(0),
        }
    }

    fn send(&self, command: Command) -> Result<(), HostError> {
        trace!(?command, "host call");
        self.radio.send(command).map_err(|_| HostError::Io(EIO))
    }
}

impl BapHost for SimHost {
    fn enable(&self) -> Result<(), HostError> {
        debug!("controller enabled");
        Ok(())
    }

    fn register_pacs(&self) -> Result<(), HostError> {
        Ok(())
    }

    fn register_sink_capability(&self, capability: &CodecCapability) -> Result<(), HostError> {
        debug!(
            frames_per_sdu = capability.max_frames_per_sdu,
            "LC3 sink capability registered"
        );
        Ok(())
    }

    fn register_scan_delegator(&self) -> Result<(), HostError> {
        Ok(())
    }

    fn init_lc3(&self) -> Result<(), HostError> {
        Ok(())
    }

    fn init_usb_audio(&self) -> Result<(), HostError> {
        Ok(())
    }

    fn scan_start(&self) -> Result<(), HostError> {
        if self.scanning.swap(true, Ordering::SeqCst) {
            return Err(HostError::Already);
        }
        self.send(Command::ScanStart)
    }

    fn scan_stop(&self) -> Result<(), HostError> {
        self.scanning.store(false, Ordering::SeqCst);
        self.send(Command::ScanStop)
    }

    fn adv_create(&self) -> Result<AdvSetHandle, HostError> {
        Ok(AdvSetHandle(self.next_adv.fetch_add(1, Ordering::SeqCst)))
    }

    fn adv_set_data(&self, adv: AdvSetHandle, data: &[u8]) -> Result<(), HostError> {
        debug!(adv = adv.0, len = data.len(), "advertising data set");
        Ok(())
    }

    fn adv_start(&self, adv: AdvSetHandle) -> Result<(), HostError> {
        self.send(Command::AdvStart(adv))
    }

    fn adv_stop(&self, adv: AdvSetHandle) -> Result<(), HostError> {
        self.send(Command::AdvStop(adv))
    }

    fn adv_delete(&self, _adv: AdvSetHandle) -> Result<(), HostError> {
        Ok(())
    }

    fn pa_sync_create(&self, params: &PaSyncParams) -> Result<PaSyncHandle, HostError> {
        let sync = PaSyncHandle(self.next_sync.fetch_add(1, Ordering::SeqCst));
        self.send(Command::PaSyncCreate(*params, sync))?;
        Ok(sync)
    }

    fn pa_sync_delete(&self, sync: PaSyncHandle) -> Result<(), HostError> {
        self.send(Command::PaSyncDelete(sync))
    }

    fn past_subscribe(&self, conn: ConnHandle, params: &PastParams) -> Result<(), HostError> {
        debug!(skip = params.skip, timeout = params.timeout, "PAST subscribed");
        self.send(Command::PastSubscribe(conn))
    }

    fn sink_create(
        &self,
        sync: PaSyncHandle,
        broadcast_id: BroadcastId,
    ) -> Result<SinkHandle, HostError> {
        let sink = SinkHandle(self.next_sink.fetch_add(1, Ordering::SeqCst));
        self.send(Command::SinkCreate(sync, sink, broadcast_id))?;
        Ok(sink)
    }

    fn sink_sync(
        &self,
        sink: SinkHandle,
        bis: BisBitfield,
        code: &BroadcastCode,
    ) -> Result<(), HostError> {
        self.send(Command::SinkSync(sink, bis, *code))
    }

    fn sink_stop(&self, sink: SinkHandle) -> Result<(), HostError> {
        self.send(Command::SinkStop(sink))
    }

    fn sink_delete(&self, sink: SinkHandle) -> Result<(), HostError> {
        self.send(Command::SinkDelete(sink))
    }

    fn set_pa_state(&self, src_id: SourceId, state: PaState) -> Result<(), HostError> {
        self.send(Command::SetPaState(src_id, state))
    }

    fn remove_source(&self, src_id: SourceId) -> Result<(), HostError> {
        self.send(Command::RemoveSource(src_id))
    }

    fn disconnect(&self, conn: ConnHandle, reason: u8) -> Result<(), HostError> {
        self.send(Command::Disconnect(conn, reason))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn second_scan_start_reports_already() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let host = SimHost::new(tx);

        host.scan_start().unwrap();
        assert_eq!(host.scan_start(), Err(HostError::Already));
        host.scan_stop().unwrap();
        host.scan_start().unwrap();

        assert_eq!(rx.try_recv().unwrap(), Command::ScanStart);
        assert_eq!(rx.try_recv().unwrap(), Command::ScanStop);
        assert_eq!(rx.try_recv().unwrap(), Command::ScanStart);
    }

    #[test]
    fn calls_fail_once_radio_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = SimHost::new(tx);
        drop(rx);

        assert_eq!(host.sink_stop(SinkHandle(0)), Err(HostError::Io(EIO)));
    }

    #[test]
    fn handles_are_sequential() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let host = SimHost::new(tx);
        let id = BroadcastId::new(1).unwrap();

        assert_eq!(host.sink_create(PaSyncHandle(0), id).unwrap(), SinkHandle(0));
        assert_eq!(host.sink_create(PaSyncHandle(0), id).unwrap(), SinkHandle(1));
    }
}
