//! Broadcast Audio Source Endpoint (BASE) decoding and channel resolution.
//!
//! [`Base::parse`] validates the whole structure up front so the subgroup
//! and BIS iterators afterwards cannot fail. [`BaseData::resolve`] turns a
//! parsed BASE into the per-subgroup view BIS selection works on: which BIS
//! indexes exist and which audio location each one carries.
//!
//! Wire layout (BAP v1.0.1 §3.7.2.2):
//!
//! ```text
//! presentation_delay[3] num_subgroups[1]
//!   { num_bis[1] codec_id[5] cc_len[1] cc[cc_len] meta_len[1] meta[meta_len]
//!     { bis_index[1] cc_len[1] cc[cc_len] } * num_bis
//!   } * num_subgroups
//! ```

use platform::{AudioLocation, BisBitfield, BisIndex, BASS_MAX_SUBGROUPS};

use crate::hci::CODING_FORMAT_LC3;
use crate::ltv;

/// Codec configuration LTV type: audio channel allocation (4 octets LE).
pub const LTV_CHANNEL_ALLOCATION: u8 = 0x03;

// ── Errors ───────────────────────────────────────────────────────────────────

/// Reasons a BASE is rejected as malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BaseError {
    /// The buffer ends before the structure does.
    Truncated,
    /// `num_subgroups` is zero.
    NoSubgroups,
    /// A subgroup announces zero BIS.
    NoBis,
    /// A BIS index is 0 or above 31.
    InvalidBisIndex(u8),
    /// A codec configuration or metadata block is not a valid LTV sequence.
    MalformedLtv,
    /// Bytes remain after the last subgroup.
    TrailingBytes,
}

impl core::fmt::Display for BaseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Truncated => write!(f, "BASE truncated"),
            Self::NoSubgroups => write!(f, "BASE has no subgroups"),
            Self::NoBis => write!(f, "BASE subgroup has no BIS"),
            Self::InvalidBisIndex(idx) => write!(f, "invalid BIS index {idx}"),
            Self::MalformedLtv => write!(f, "malformed LTV block"),
            Self::TrailingBytes => write!(f, "trailing bytes after BASE"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BaseError {}

/// Why a channel allocation could not be read from a codec configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AllocationError {
    /// No channel allocation LTV present.
    Missing,
    /// The LTV is present but not 4 octets long.
    BadLength(usize),
}

// ── Byte cursor ──────────────────────────────────────────────────────────────

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> Result<u8, BaseError> {
        let (&b, rest) = self.buf.split_first().ok_or(BaseError::Truncated)?;
        self.buf = rest;
        Ok(b)
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], BaseError> {
        if self.buf.len() < n {
            return Err(BaseError::Truncated);
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    fn ltv_block(&mut self) -> Result<&'a [u8], BaseError> {
        let len = self.u8()?;
        let block = self.bytes(usize::from(len))?;
        if ltv::is_well_formed(block) {
            Ok(block)
        } else {
            Err(BaseError::MalformedLtv)
        }
    }
}

// ── Codec id ─────────────────────────────────────────────────────────────────

/// Five-octet codec identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodecId {
    /// HCI coding format.
    pub format: u8,
    /// Company id (vendor codecs only).
    pub company_id: u16,
    /// Vendor-specific codec id.
    pub vendor_id: u16,
}

impl CodecId {
    const SIZE: usize = 5;

    fn from_bytes(bytes: &[u8]) -> Result<Self, BaseError> {
        match bytes {
            [format, c0, c1, v0, v1] => Ok(Self {
                format: *format,
                company_id: u16::from_le_bytes([*c0, *c1]),
                vendor_id: u16::from_le_bytes([*v0, *v1]),
            }),
            _ => Err(BaseError::Truncated),
        }
    }

    /// `true` for the LC3 coding format.
    #[must_use]
    pub fn is_lc3(&self) -> bool {
        self.format == CODING_FORMAT_LC3
    }
}

/// Read the channel allocation LTV from a codec configuration block.
///
/// # Errors
///
/// [`AllocationError::Missing`] when absent, [`AllocationError::BadLength`]
/// when present with a value that is not 4 octets.
pub fn channel_allocation(codec_config: &[u8]) -> Result<AudioLocation, AllocationError> {
    match ltv::find(codec_config, LTV_CHANNEL_ALLOCATION) {
        Some(&[b0, b1, b2, b3]) => Ok(AudioLocation::from_bits(u32::from_le_bytes([
            b0, b1, b2, b3,
        ]))),
        Some(other) => Err(AllocationError::BadLength(other.len())),
        None => Err(AllocationError::Missing),
    }
}

// ── Parsed views ─────────────────────────────────────────────────────────────

/// A validated BASE borrowed from the receive buffer.
#[derive(Debug, Clone, Copy)]
pub struct Base<'a> {
    presentation_delay_us: u32,
    num_subgroups: u8,
    subgroups: &'a [u8],
}

/// One subgroup of a [`Base`].
#[derive(Debug, Clone, Copy)]
pub struct Subgroup<'a> {
    codec_id: CodecId,
    codec_config: &'a [u8],
    metadata: &'a [u8],
    num_bis: u8,
    bis: &'a [u8],
}

/// One BIS entry of a [`Subgroup`].
#[derive(Debug, Clone, Copy)]
pub struct BaseBis<'a> {
    index: BisIndex,
    codec_config: &'a [u8],
}

impl<'a> Base<'a> {
    /// Validate and wrap a raw BASE.
    ///
    /// # Errors
    ///
    /// Returns a [`BaseError`] describing the first structural problem.
    pub fn parse(buf: &'a [u8]) -> Result<Self, BaseError> {
        let mut reader = Reader { buf };
        let delay = reader.bytes(3)?;
        let presentation_delay_us = match delay {
            [d0, d1, d2] => u32::from_le_bytes([*d0, *d1, *d2, 0x00]),
            _ => return Err(BaseError::Truncated),
        };
        let num_subgroups = reader.u8()?;
        if num_subgroups == 0 {
            return Err(BaseError::NoSubgroups);
        }
        let subgroups = reader.buf;
        for _ in 0..num_subgroups {
            Subgroup::read(&mut reader)?;
        }
        if !reader.buf.is_empty() {
            return Err(BaseError::TrailingBytes);
        }
        Ok(Self {
            presentation_delay_us,
            num_subgroups,
            subgroups,
        })
    }

    /// Presentation delay in microseconds.
    #[must_use]
    pub fn presentation_delay_us(&self) -> u32 {
        self.presentation_delay_us
    }

    /// Number of subgroups.
    #[must_use]
    pub fn subgroup_count(&self) -> u8 {
        self.num_subgroups
    }

    /// Iterate the subgroups in wire order.
    pub fn subgroups(&self) -> impl Iterator<Item = Subgroup<'a>> + 'a {
        let mut reader = Reader {
            buf: self.subgroups,
        };
        // parse() already walked every subgroup, so read() cannot fail here
        (0..self.num_subgroups).map_while(move |_| Subgroup::read(&mut reader).ok())
    }
}

impl<'a> Subgroup<'a> {
    fn read(reader: &mut Reader<'a>) -> Result<Self, BaseError> {
        let num_bis = reader.u8()?;
        if num_bis == 0 {
            return Err(BaseError::NoBis);
        }
        let codec_id = CodecId::from_bytes(reader.bytes(CodecId::SIZE)?)?;
        let codec_config = reader.ltv_block()?;
        let metadata = reader.ltv_block()?;
        let bis = reader.buf;
        for _ in 0..num_bis {
            BaseBis::read(reader)?;
        }
        let consumed = bis.len().saturating_sub(reader.buf.len());
        Ok(Self {
            codec_id,
            codec_config,
            metadata,
            num_bis,
            bis: bis.get(..consumed).unwrap_or_default(),
        })
    }

    /// Codec identifier.
    #[must_use]
    pub fn codec_id(&self) -> CodecId {
        self.codec_id
    }

    /// Subgroup-level codec-specific configuration (LTVs).
    #[must_use]
    pub fn codec_config(&self) -> &'a [u8] {
        self.codec_config
    }

    /// Subgroup metadata (LTVs).
    #[must_use]
    pub fn metadata(&self) -> &'a [u8] {
        self.metadata
    }

    /// Number of BIS in this subgroup.
    #[must_use]
    pub fn bis_count(&self) -> u8 {
        self.num_bis
    }

    /// Iterate the BIS entries in wire order.
    pub fn bis(&self) -> impl Iterator<Item = BaseBis<'a>> + 'a {
        let mut reader = Reader { buf: self.bis };
        (0..self.num_bis).map_while(move |_| BaseBis::read(&mut reader).ok())
    }

    /// Set of BIS indexes announced by this subgroup.
    #[must_use]
    pub fn bis_indexes(&self) -> BisBitfield {
        let mut field = BisBitfield::EMPTY;
        for bis in self.bis() {
            field.insert(bis.index);
        }
        field
    }

    /// Channel allocation at subgroup level.
    ///
    /// # Errors
    ///
    /// See [`channel_allocation`].
    pub fn channel_allocation(&self) -> Result<AudioLocation, AllocationError> {
        channel_allocation(self.codec_config)
    }
}

impl<'a> BaseBis<'a> {
    fn read(reader: &mut Reader<'a>) -> Result<Self, BaseError> {
        let raw = reader.u8()?;
        let index = BisIndex::try_new(raw).map_err(|_| BaseError::InvalidBisIndex(raw))?;
        let codec_config = reader.ltv_block()?;
        Ok(Self {
            index,
            codec_config,
        })
    }

    /// BIS index.
    #[must_use]
    pub fn index(&self) -> BisIndex {
        self.index
    }

    /// BIS-level codec-specific configuration (LTVs).
    #[must_use]
    pub fn codec_config(&self) -> &'a [u8] {
        self.codec_config
    }

    /// Channel allocation at BIS level.
    ///
    /// # Errors
    ///
    /// See [`channel_allocation`].
    pub fn channel_allocation(&self) -> Result<AudioLocation, AllocationError> {
        channel_allocation(self.codec_config)
    }
}

// ── Resolved model ───────────────────────────────────────────────────────────

const MAX_BIS: usize = BisIndex::MAX as usize;

/// Per-subgroup BIS layout with resolved channel allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubgroupData {
    bis_indexes: BisBitfield,
    allocated: BisBitfield,
    locations: [AudioLocation; MAX_BIS],
}

impl SubgroupData {
    /// Subgroup with no BIS.
    pub const EMPTY: Self = Self {
        bis_indexes: BisBitfield::EMPTY,
        allocated: BisBitfield::EMPTY,
        locations: [AudioLocation::MONO; MAX_BIS],
    };

    /// BIS indexes present in this subgroup.
    #[must_use]
    pub fn bis_indexes(&self) -> BisBitfield {
        self.bis_indexes
    }

    /// Resolved allocation for `index`, `None` when the BIS is absent.
    #[must_use]
    pub fn allocation(&self, index: BisIndex) -> Option<AudioLocation> {
        if !self.allocated.contains(index) {
            return None;
        }
        self.locations
            .get(usize::from(index.get().saturating_sub(1)))
            .copied()
    }

    fn set_allocation(&mut self, index: BisIndex, location: AudioLocation) {
        if let Some(slot) = self
            .locations
            .get_mut(usize::from(index.get().saturating_sub(1)))
        {
            *slot = location;
            self.allocated.insert(index);
        }
    }

    /// Build one subgroup. Returns `EMPTY` for a non-LC3 codec.
    ///
    /// Allocation per present BIS: BIS level if available, else subgroup
    /// level if available, else mono.
    #[must_use]
    pub fn resolve(subgroup: &Subgroup<'_>) -> Self {
        let mut data = Self::EMPTY;
        let codec = subgroup.codec_id();
        if !codec.is_lc3() {
            warn!("Only LC3 codec supported ({:#x})", codec.format);
            return data;
        }

        data.bis_indexes = subgroup.bis_indexes();

        let subgroup_allocation = match subgroup.channel_allocation() {
            Ok(location) => {
                debug!("Channel allocation (subgroup level) {:#x}", location.bits());
                Some(location)
            }
            Err(_) => {
                debug!("No subgroup level channel allocation");
                None
            }
        };

        for bis in subgroup.bis() {
            match bis.channel_allocation() {
                Ok(location) => data.set_allocation(bis.index(), location),
                Err(_) => debug!("No channel allocation for BIS {}", bis.index().get()),
            }
        }

        for index in data.bis_indexes.iter() {
            if !data.allocated.contains(index) {
                data.set_allocation(index, subgroup_allocation.unwrap_or(AudioLocation::MONO));
            }
            debug!(
                "BIS index {} allocation = {:#x}",
                index.get(),
                data.allocation(index).map_or(0, AudioLocation::bits)
            );
        }
        data
    }
}

impl Default for SubgroupData {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Normalized view of a received BASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseData {
    subgroups: [SubgroupData; BASS_MAX_SUBGROUPS],
    count: u8,
}

impl BaseData {
    /// No subgroups.
    pub const EMPTY: Self = Self {
        subgroups: [SubgroupData::EMPTY; BASS_MAX_SUBGROUPS],
        count: 0,
    };

    /// Resolve up to `max_subgroups` subgroups of `base` (never more than
    /// [`BASS_MAX_SUBGROUPS`]). Subgroup positions are kept: a skipped
    /// non-LC3 subgroup leaves an empty entry at its position.
    #[must_use]
    pub fn resolve(base: &Base<'_>, max_subgroups: usize) -> Self {
        let mut data = Self::EMPTY;
        let limit = max_subgroups.min(BASS_MAX_SUBGROUPS);
        for (slot, subgroup) in data.subgroups.iter_mut().zip(base.subgroups()).take(limit) {
            *slot = SubgroupData::resolve(&subgroup);
            data.count = data.count.saturating_add(1);
        }
        if usize::from(base.subgroup_count()) > limit {
            warn!(
                "Ignoring {} subgroups beyond {}",
                usize::from(base.subgroup_count()).saturating_sub(limit),
                limit
            );
        }
        data
    }

    /// Number of subgroups resolved.
    #[must_use]
    pub fn subgroup_count(&self) -> usize {
        usize::from(self.count)
    }

    /// Subgroup at `position`, `None` beyond the resolved count.
    #[must_use]
    pub fn subgroup(&self, position: usize) -> Option<&SubgroupData> {
        if position < self.subgroup_count() {
            self.subgroups.get(position)
        } else {
            None
        }
    }

    /// All subgroup slots, including unused trailing ones (empty).
    #[must_use]
    pub fn slots(&self) -> &[SubgroupData; BASS_MAX_SUBGROUPS] {
        &self.subgroups
    }
}

impl Default for BaseData {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn idx(i: u8) -> BisIndex {
        BisIndex::try_new(i).unwrap()
    }

    #[rustfmt::skip]
    const TWO_SUBGROUPS: [u8; 25] = [
        0x10, 0x20, 0x30, 0x02,               // presentation delay, num of subgroups
        0x01, 0x03, 0x00, 0x00, 0x00, 0x00,   // num of bis, codec id (subgroup #1)
        0x00,                                 // codec specific config len
        0x00,                                 // metadata len
        0x01, 0x00,                           // bis index, codec specific config len
        0x01, 0x02, 0x00, 0x00, 0x00, 0x00,   // num of bis, codec id (subgroup #2)
        0x00,                                 // codec specific config len
        0x00,                                 // metadata len
        0x02, 0x00,                           // bis index, codec specific config len
        0x00,                                 // stray byte
    ];

    #[test]
    fn parse_rejects_trailing_bytes() {
        assert_eq!(Base::parse(&TWO_SUBGROUPS).unwrap_err(), BaseError::TrailingBytes);
    }

    #[test]
    fn parse_walks_all_subgroups() {
        let base = Base::parse(&TWO_SUBGROUPS[..24]).unwrap();
        assert_eq!(base.presentation_delay_us(), 0x0030_2010);
        assert_eq!(base.subgroup_count(), 2);
        let formats: Vec<u8> = base.subgroups().map(|s| s.codec_id().format).collect();
        assert_eq!(formats, [0x03, 0x02]);
        let second = base.subgroups().nth(1).unwrap();
        assert_eq!(second.bis_indexes().bits(), 0b10);
    }

    #[test]
    fn parse_rejects_zero_subgroups() {
        assert_eq!(Base::parse(&[0, 0, 0, 0]).unwrap_err(), BaseError::NoSubgroups);
    }

    #[test]
    fn parse_rejects_zero_bis() {
        let buf = [0, 0, 0, 1, 0x00, 0x06, 0, 0, 0, 0, 0x00, 0x00];
        assert_eq!(Base::parse(&buf).unwrap_err(), BaseError::NoBis);
    }

    #[test]
    fn parse_rejects_bis_index_zero() {
        let buf = [0, 0, 0, 1, 0x01, 0x06, 0, 0, 0, 0, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(Base::parse(&buf).unwrap_err(), BaseError::InvalidBisIndex(0));
    }

    #[test]
    fn parse_rejects_truncated_codec_config() {
        let buf = [0, 0, 0, 1, 0x01, 0x06, 0, 0, 0, 0, 0x05, 0x02, 0x01];
        assert_eq!(Base::parse(&buf).unwrap_err(), BaseError::Truncated);
    }

    #[test]
    fn parse_rejects_malformed_ltv() {
        // cc_len 3 but inner LTV claims 4 octets
        let buf = [0, 0, 0, 1, 0x01, 0x06, 0, 0, 0, 0, 0x03, 0x04, 0x01, 0x01, 0x00, 0x01, 0x00];
        assert_eq!(Base::parse(&buf).unwrap_err(), BaseError::MalformedLtv);
    }

    #[test]
    fn channel_allocation_reads_le_bitmask() {
        let cc = [0x02, 0x01, 0x06, 0x05, 0x03, 0x03, 0x00, 0x00, 0x0C];
        assert_eq!(
            channel_allocation(&cc).unwrap(),
            AudioLocation::from_bits(0x0C00_0003)
        );
        assert_eq!(channel_allocation(&[0x02, 0x01, 0x06]), Err(AllocationError::Missing));
        assert_eq!(
            channel_allocation(&[0x02, 0x03, 0x01]),
            Err(AllocationError::BadLength(1))
        );
    }

    fn lc3_base(subgroup_alloc: Option<u32>, bis: &[(u8, Option<u32>)]) -> Vec<u8> {
        let mut buf = vec![0x40, 0x9C, 0x00, 0x01];
        buf.push(u8::try_from(bis.len()).unwrap());
        buf.extend_from_slice(&[0x06, 0x00, 0x00, 0x00, 0x00]);
        match subgroup_alloc {
            Some(loc) => {
                buf.push(6);
                buf.extend_from_slice(&[0x05, 0x03]);
                buf.extend_from_slice(&loc.to_le_bytes());
            }
            None => buf.push(0),
        }
        buf.push(0);
        for (index, alloc) in bis {
            buf.push(*index);
            match alloc {
                Some(loc) => {
                    buf.push(6);
                    buf.extend_from_slice(&[0x05, 0x03]);
                    buf.extend_from_slice(&loc.to_le_bytes());
                }
                None => buf.push(0),
            }
        }
        buf
    }

    #[test]
    fn resolve_prefers_bis_then_subgroup_then_mono() {
        let with_subgroup = lc3_base(Some(0x4), &[(1, Some(0x1)), (2, None)]);
        let base = Base::parse(&with_subgroup).unwrap();
        let data = BaseData::resolve(&base, BASS_MAX_SUBGROUPS);
        let sg = data.subgroup(0).unwrap();
        assert_eq!(sg.allocation(idx(1)), Some(AudioLocation::FRONT_LEFT));
        assert_eq!(sg.allocation(idx(2)), Some(AudioLocation::FRONT_CENTER));

        let without_subgroup = lc3_base(None, &[(3, None)]);
        let base = Base::parse(&without_subgroup).unwrap();
        let data = BaseData::resolve(&base, BASS_MAX_SUBGROUPS);
        assert_eq!(data.subgroup(0).unwrap().allocation(idx(3)), Some(AudioLocation::MONO));
    }

    #[test]
    fn resolve_leaves_absent_bis_unallocated() {
        let raw = lc3_base(None, &[(1, Some(0x1))]);
        let data = BaseData::resolve(&Base::parse(&raw).unwrap(), BASS_MAX_SUBGROUPS);
        let sg = data.subgroup(0).unwrap();
        assert_eq!(sg.bis_indexes().bits(), 0b1);
        assert_eq!(sg.allocation(idx(2)), None);
    }

    #[test]
    fn resolve_skips_non_lc3_subgroup_but_keeps_position() {
        let base = Base::parse(&TWO_SUBGROUPS[..24]).unwrap();
        let data = BaseData::resolve(&base, BASS_MAX_SUBGROUPS);
        assert_eq!(data.subgroup_count(), 2);
        assert!(data.subgroup(0).unwrap().bis_indexes().is_empty());
        assert!(data.subgroup(1).unwrap().bis_indexes().is_empty());
    }

    #[test]
    fn resolve_ignores_subgroups_beyond_limit() {
        let base = Base::parse(&TWO_SUBGROUPS[..24]).unwrap();
        let data = BaseData::resolve(&base, 1);
        assert_eq!(data.subgroup_count(), 1);
        assert!(data.subgroup(1).is_none());
    }

    proptest::proptest! {
        /// Resolution depends only on which allocation levels are present.
        #[test]
        fn resolution_is_deterministic(
            sub in proptest::option::of(0u32..0x0FFF_FFFF),
            per_bis in proptest::collection::vec(proptest::option::of(0u32..0x0FFF_FFFF), 1..8),
        ) {
            let bis: Vec<(u8, Option<u32>)> = per_bis
                .iter()
                .enumerate()
                .map(|(i, a)| (u8::try_from(i + 1).unwrap(), *a))
                .collect();
            let raw = lc3_base(sub, &bis);
            let data = BaseData::resolve(&Base::parse(&raw).unwrap(), BASS_MAX_SUBGROUPS);
            let sg = data.subgroup(0).unwrap();
            for (i, alloc) in &bis {
                let expected = alloc.or(sub).map_or(AudioLocation::MONO, AudioLocation::from_bits);
                proptest::prop_assert_eq!(sg.allocation(idx(*i)), Some(expected));
            }
        }
    }
}
