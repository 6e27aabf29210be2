//! Broadcaster discovery from extended advertising reports.

use platform::{BapHost, BroadcastId, ScanObserver, ScanReport};

use crate::hci::{ad_type, UUID_BROADCAST_AUDIO};
use crate::ltv::LtvIter;
use crate::sink::BroadcastSink;
use crate::state::BroadcasterInfo;

const UUID16_SIZE: usize = 2;

/// `true` when a name record in `ad` contains `target`, ignoring ASCII case.
///
/// Each candidate is cut at its first NUL and never compared beyond
/// `target.len() + 1` bytes.
#[must_use]
pub fn name_matches(ad: &[u8], target: &str) -> bool {
    let target = target.as_bytes();
    LtvIter::new(ad)
        .map_while(Result::ok)
        .filter(|entry| {
            matches!(
                entry.ty,
                ad_type::NAME_SHORTENED | ad_type::NAME_COMPLETE | ad_type::BROADCAST_NAME
            )
        })
        .any(|entry| {
            let limit = entry.value.len().min(target.len().saturating_add(1));
            let name = entry.value.get(..limit).unwrap_or_default();
            let name = name
                .iter()
                .position(|&b| b == 0)
                .and_then(|nul| name.get(..nul))
                .unwrap_or(name);
            contains_ignore_case(name, target)
        })
}

fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len().max(1))
        .any(|window| needle.is_empty() || window.eq_ignore_ascii_case(needle))
}

/// Broadcast id of the first Broadcast Audio Announcement in `ad`.
///
/// Only the first 16-bit service data record carrying the Broadcast Audio
/// UUID is considered.
#[must_use]
pub fn broadcast_id_of(ad: &[u8]) -> Option<BroadcastId> {
    LtvIter::new(ad)
        .map_while(Result::ok)
        .filter(|entry| entry.ty == ad_type::SVC_DATA16)
        .filter(|entry| entry.value.len() >= UUID16_SIZE.saturating_add(BroadcastId::BYTE_SIZE))
        .find(|entry| {
            entry.value.get(..UUID16_SIZE) == Some(&UUID_BROADCAST_AUDIO.to_le_bytes()[..])
        })
        .and_then(|entry| BroadcastId::from_le_bytes(entry.value.get(UUID16_SIZE..)?))
}

impl<H: BapHost> ScanObserver for BroadcastSink<H> {
    fn on_scan_report(&self, report: &ScanReport<'_>) {
        if report.interval == 0 {
            return;
        }

        let target = &self.config().target_broadcast_name;
        let delegated = self.with_session(|s| s.recv_state.is_some());
        if !delegated && !target.is_empty() && !name_matches(report.data, target) {
            return;
        }

        let Some(broadcast_id) = broadcast_id_of(report.data) else {
            return;
        };
        info!(
            "Found broadcaster with ID {} and addr {} and sid {:#x}",
            broadcast_id.get(),
            report.addr,
            report.sid
        );

        let accepted = self.with_session(|s| {
            let requested = match &s.recv_state {
                Some(state) => state.matches(&report.addr, report.sid, broadcast_id),
                None => false,
            };
            if s.assistant.is_connected() && !requested {
                return false;
            }
            s.broadcaster = Some(BroadcasterInfo {
                addr: report.addr,
                sid: report.sid,
                interval: report.interval,
                broadcast_id,
            });
            s.broadcast_id = Some(broadcast_id);
            true
        });

        if accepted {
            debug!("broadcaster_broadcast_id = {:#x}", broadcast_id.get());
            self.gates().broadcaster_found.give();
        }
    }
}
