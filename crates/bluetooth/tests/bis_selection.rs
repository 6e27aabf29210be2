//! BIS selection against BASE payloads as they arrive over the air.
//!
//! Each test parses real BASE bytes, resolves them and asks the selector for
//! the bitfield to join.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

mod common;

use bluetooth::{keep_least_significant_ones, select_bis_sync_bitfield, Base, BaseData};
use common::{lc3_base, request};
use platform::{AudioLocation, BisBitfield, BASS_MAX_SUBGROUPS};
use proptest::prelude::*;

const LEFT: u32 = AudioLocation::FRONT_LEFT.bits();
const RIGHT: u32 = AudioLocation::FRONT_RIGHT.bits();
const STEREO: u32 = LEFT | RIGHT;

fn resolve(bytes: &[u8]) -> BaseData {
    BaseData::resolve(&Base::parse(bytes).unwrap(), BASS_MAX_SUBGROUPS)
}

#[test]
fn no_preference_takes_lowest_bis_up_to_stream_count() {
    let bytes = lc3_base(&[(None, &[(1, None), (2, None), (3, None), (5, None)])]);
    let base = resolve(&bytes);
    let any = [BisBitfield::NO_PREFERENCE; BASS_MAX_SUBGROUPS];

    assert_eq!(select_bis_sync_bitfield(&base, &any, None, 1), 0b1);
    assert_eq!(select_bis_sync_bitfield(&base, &any, None, 2), 0b11);
    assert_eq!(
        select_bis_sync_bitfield(&base, &any, None, 8),
        0b1_0111,
        "a large stream count is limited by what the BASE offers"
    );
}

#[test]
fn specific_request_is_limited_to_present_bis() {
    let bytes = lc3_base(&[(None, &[(1, None), (2, None)])]);
    let base = resolve(&bytes);

    assert_eq!(
        select_bis_sync_bitfield(&base, &request(0b110), None, 2),
        0b10,
        "BIS 3 is not in the BASE and must not be joined"
    );
}

#[test]
fn no_preference_spans_subgroups() {
    let bytes = lc3_base(&[(Some(LEFT), &[(1, None)]), (Some(RIGHT), &[(2, None)])]);
    let base = resolve(&bytes);
    let any = [BisBitfield::NO_PREFERENCE; BASS_MAX_SUBGROUPS];

    assert_eq!(select_bis_sync_bitfield(&base, &any, None, 2), 0b11);
}

#[test]
fn left_target_picks_left_bis_over_mono_subgroup() {
    let bytes = lc3_base(&[(
        Some(AudioLocation::MONO.bits()),
        &[(1, Some(LEFT)), (2, Some(RIGHT)), (3, None)],
    )]);
    let base = resolve(&bytes);
    let any = [BisBitfield::NO_PREFERENCE; BASS_MAX_SUBGROUPS];

    assert_eq!(
        select_bis_sync_bitfield(&base, &any, Some(AudioLocation::FRONT_LEFT), 1),
        0b1
    );
}

#[test]
fn exact_match_beats_partial_overlap() {
    let bytes = lc3_base(&[(None, &[(1, Some(LEFT)), (2, Some(STEREO))])]);
    let base = resolve(&bytes);
    let any = [BisBitfield::NO_PREFERENCE; BASS_MAX_SUBGROUPS];

    assert_eq!(
        select_bis_sync_bitfield(&base, &any, Some(AudioLocation::from_bits(STEREO)), 2),
        0b10,
        "BIS 2 carries both channels and must win over BIS 1"
    );
}

#[test]
fn overlapping_bis_combine_into_target() {
    let bytes = lc3_base(&[(None, &[(1, Some(LEFT)), (2, Some(RIGHT))])]);
    let base = resolve(&bytes);
    let any = [BisBitfield::NO_PREFERENCE; BASS_MAX_SUBGROUPS];

    assert_eq!(
        select_bis_sync_bitfield(&base, &any, Some(AudioLocation::from_bits(STEREO)), 2),
        0b11
    );
}

#[test]
fn targeted_selection_honors_request() {
    let bytes = lc3_base(&[(None, &[(1, Some(LEFT)), (2, Some(LEFT))])]);
    let base = resolve(&bytes);

    assert_eq!(
        select_bis_sync_bitfield(&base, &request(0b10), Some(AudioLocation::FRONT_LEFT), 1),
        0b10,
        "BIS 1 was not requested"
    );
}

#[test]
fn unmatched_target_selects_nothing() {
    let bytes = lc3_base(&[(None, &[(1, Some(RIGHT))])]);
    let base = resolve(&bytes);
    let any = [BisBitfield::NO_PREFERENCE; BASS_MAX_SUBGROUPS];

    assert_eq!(
        select_bis_sync_bitfield(&base, &any, Some(AudioLocation::FRONT_LEFT), 1),
        0
    );
}

#[test]
fn subgroups_beyond_four_are_ignored() {
    let bytes = lc3_base(&[
        (None, &[(1, None)]),
        (None, &[(2, None)]),
        (None, &[(3, None)]),
        (None, &[(4, None)]),
        (None, &[(5, None)]),
    ]);
    let base = resolve(&bytes);

    assert_eq!(base.subgroup_count(), BASS_MAX_SUBGROUPS);
    let any = [BisBitfield::NO_PREFERENCE; BASS_MAX_SUBGROUPS];
    assert_eq!(select_bis_sync_bitfield(&base, &any, None, 8), 0b1111);
}

proptest! {
    #[test]
    fn no_preference_yields_lowest_present_bis(
        present in 1u32..=BisBitfield::VALID_MASK,
        streams in 1u8..=31,
    ) {
        let bis: Vec<(u8, Option<u32>)> = BisBitfield::from_bits(present)
            .iter()
            .map(|index| (index.get(), None))
            .collect();
        let bytes = lc3_base(&[(None, &bis)]);
        let base = resolve(&bytes);
        let any = [BisBitfield::NO_PREFERENCE; BASS_MAX_SUBGROUPS];

        let selected = select_bis_sync_bitfield(&base, &any, None, streams);

        prop_assert_eq!(selected & !present, 0);
        prop_assert_eq!(
            selected.count_ones(),
            present.count_ones().min(u32::from(streams))
        );
        // Every present BIS below the highest selected one is selected too.
        let below = (1u64 << (32 - selected.leading_zeros())) - 1;
        prop_assert_eq!(u64::from(present) & below, u64::from(selected));
        prop_assert_eq!(selected, keep_least_significant_ones(present, streams));
    }
}
