//! BIS selection policy.
//!
//! Turns the resolved BASE and the per-subgroup BIS requests into the single
//! bitfield handed to the sink when joining the BIG.

use platform::{AudioLocation, BisBitfield, BisIndex, DelegatorError, BASS_MAX_SUBGROUPS};

use crate::base::BaseData;

/// Keep at most `n` set bits of `bits`, lowest first.
#[must_use]
pub fn keep_least_significant_ones(mut bits: u32, n: u8) -> u32 {
    let mut result = 0;
    for _ in 0..n {
        if bits == 0 {
            break;
        }
        let lsb = bits & bits.wrapping_neg();
        result |= lsb;
        bits &= !lsb;
    }
    result
}

/// Number of streams a BIS bitfield selects (bits 0..=30).
#[must_use]
pub fn stream_count(bits: u32) -> u8 {
    BisBitfield::from_bits(bits).count()
}

/// Compute the BIS bitfield to join.
///
/// With `target` set, the first requesting subgroup that yields an exact or
/// combined allocation match wins. Without it, every requesting subgroup
/// contributes the intersection of its request and its BIS indexes; a
/// no-preference request caps the result at `max_streams` lowest BIS.
///
/// Zero means nothing viable was found.
#[must_use]
pub fn select_bis_sync_bitfield(
    base: &BaseData,
    requested: &[BisBitfield; BASS_MAX_SUBGROUPS],
    target: Option<AudioLocation>,
    max_streams: u8,
) -> u32 {
    match target {
        Some(target) => select_targeted(base, requested, target),
        None => select_unconstrained(base, requested, max_streams),
    }
}

fn select_targeted(
    base: &BaseData,
    requested: &[BisBitfield; BASS_MAX_SUBGROUPS],
    target: AudioLocation,
) -> u32 {
    for (subgroup, request) in base.slots().iter().zip(requested) {
        if request.is_empty() {
            continue;
        }

        let mut result = 0;
        let mut combined = AudioLocation::MONO;
        let mut combined_bits = 0;
        for index in BisIndex::all() {
            let Some(location) = subgroup.allocation(index) else {
                continue;
            };
            if !request.contains(index) {
                continue;
            }
            if location == target {
                result = index.bit();
                break;
            }
            if location.overlaps(target) {
                combined = combined.union(location);
                combined_bits |= index.bit();
                if combined == target {
                    result = combined_bits;
                    break;
                }
                debug!("Channel allocation match, partial {:#x}", combined.bits());
            }
        }

        if result != 0 {
            info!("Channel allocation match, result = {:#x}", result);
            return result;
        }
    }
    0
}

fn select_unconstrained(
    base: &BaseData,
    requested: &[BisBitfield; BASS_MAX_SUBGROUPS],
    max_streams: u8,
) -> u32 {
    let mut no_preference = false;
    let mut result = 0;
    for (subgroup, request) in base.slots().iter().zip(requested) {
        if request.is_empty() {
            continue;
        }
        if request.is_no_preference() {
            no_preference = true;
        }
        result |= request.bits() & subgroup.bis_indexes().bits();
    }

    if no_preference {
        result = keep_least_significant_ones(result, max_streams);
    }
    result
}

/// A validated BIS sync request from a Broadcast Assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BisSyncRequest {
    /// Per-subgroup requests, empty beyond the requested subgroups.
    pub table: [BisBitfield; BASS_MAX_SUBGROUPS],
    /// At least one subgroup asked for a sync.
    pub any: bool,
}

/// Validate the per-subgroup requests of a BIS sync request.
///
/// A specific (non no-preference) request may only target one subgroup and
/// at most `max_streams` BIS. Entries beyond [`BASS_MAX_SUBGROUPS`] are
/// ignored.
///
/// # Errors
///
/// [`DelegatorError::InvalidArgument`] when either limit is exceeded.
pub fn validate_bis_sync_request(
    requests: &[BisBitfield],
    max_streams: u8,
) -> Result<BisSyncRequest, DelegatorError> {
    let mut request = BisSyncRequest {
        table: [BisBitfield::EMPTY; BASS_MAX_SUBGROUPS],
        any: false,
    };
    let mut no_preference = true;
    let mut requesting: u8 = 0;
    let mut combined = 0;

    for (slot, &bis) in request.table.iter_mut().zip(requests) {
        if bis.is_empty() {
            continue;
        }
        *slot = bis;
        combined |= bis.bits();
        requesting = requesting.saturating_add(1);
        request.any = true;
        if !bis.is_no_preference() {
            no_preference = false;
        }
    }

    if !no_preference {
        if requesting > 1 {
            warn!("Only one subgroup may be synced, {} requested", requesting);
            return Err(DelegatorError::InvalidArgument);
        }
        let streams = stream_count(combined);
        if streams > max_streams {
            warn!("Requested {} streams, max {}", streams, max_streams);
            return Err(DelegatorError::InvalidArgument);
        }
    }
    Ok(request)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn keeps_lowest_bits() {
        assert_eq!(keep_least_significant_ones(0b1011_0110, 2), 0b0000_0110);
        assert_eq!(keep_least_significant_ones(0b1000, 3), 0b1000);
        assert_eq!(keep_least_significant_ones(0xFFFF_FFFF, 0), 0);
    }

    #[test]
    fn stream_count_ignores_top_bit() {
        assert_eq!(stream_count(0x8000_0001), 1);
        assert_eq!(stream_count(0x7FFF_FFFF), 31);
    }

    #[test]
    fn request_validation_accepts_no_preference_everywhere() {
        let requests = [BisBitfield::NO_PREFERENCE; BASS_MAX_SUBGROUPS];
        let request = validate_bis_sync_request(&requests, 1).unwrap();
        assert!(request.any);
        assert_eq!(request.table, requests);
    }

    #[test]
    fn request_validation_rejects_stream_overflow() {
        let requests = [BisBitfield::from_bits(0b111)];
        assert_eq!(
            validate_bis_sync_request(&requests, 2),
            Err(DelegatorError::InvalidArgument)
        );
    }

    #[test]
    fn empty_request_is_not_a_sync() {
        let request = validate_bis_sync_request(&[BisBitfield::EMPTY; 2], 1).unwrap();
        assert!(!request.any);
    }
}
