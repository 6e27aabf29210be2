//! LE Audio domain newtypes for compile-time safety.
//!
//! These zero-cost abstractions prevent common errors:
//! - `AudioLocation`: channel-allocation bitmask, `MONO` is the empty mask
//! - `BisIndex`: validates the 1–31 range (index 0 does not exist on air)
//! - `BisBitfield`: bit `n - 1` represents BIS index `n`

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

impl core::fmt::Display for OutOfRangeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "value {} outside {}..={}",
            self.value, self.min, self.max
        )
    }
}

// ── AudioLocation ────────────────────────────────────────────────────────────

/// Audio channel allocation as a Bluetooth SIG audio-location bitmask.
///
/// An empty mask means mono audio (no specific location). Locations combine
/// with `|`, so a stereo BIS carries `FRONT_LEFT | FRONT_RIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct AudioLocation(u32);

impl AudioLocation {
    /// Mono audio: no location bits set.
    pub const MONO: Self = Self(0x0000_0000);
    /// Front left.
    pub const FRONT_LEFT: Self = Self(0x0000_0001);
    /// Front right.
    pub const FRONT_RIGHT: Self = Self(0x0000_0002);
    /// Front center.
    pub const FRONT_CENTER: Self = Self(0x0000_0004);
    /// Low-frequency effects 1.
    pub const LOW_FREQ_EFFECTS_1: Self = Self(0x0000_0008);
    /// Back left.
    pub const BACK_LEFT: Self = Self(0x0000_0010);
    /// Back right.
    pub const BACK_RIGHT: Self = Self(0x0000_0020);
    /// Side left.
    pub const SIDE_LEFT: Self = Self(0x0000_0400);
    /// Side right.
    pub const SIDE_RIGHT: Self = Self(0x0000_0800);
    /// Left surround.
    pub const LEFT_SURROUND: Self = Self(0x0400_0000);
    /// Right surround.
    pub const RIGHT_SURROUND: Self = Self(0x0800_0000);

    /// All location bits defined by the Bluetooth assigned numbers (bits 0–27).
    pub const DEFINED_MASK: u32 = 0x0FFF_FFFF;

    /// Wrap a raw bitmask. Undefined high bits are kept so that a peer's
    /// value round-trips unchanged.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Return the raw bitmask.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// `true` for the mono (empty) allocation.
    #[must_use]
    pub const fn is_mono(self) -> bool {
        self.0 == 0
    }

    /// `true` when the two allocations share at least one location.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Union of both allocations.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Parse a location given as decimal or `0x`-prefixed hex, as used by the
    /// build-time `TARGET_BROADCAST_CHANNEL` setting.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let bits = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => text.parse::<u32>().ok()?,
        };
        Some(Self(bits))
    }
}

impl core::ops::BitOr for AudioLocation {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl core::fmt::Display for AudioLocation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_mono() {
            write!(f, "mono")
        } else {
            write!(f, "{:#010x}", self.0)
        }
    }
}

// ── BisIndex ─────────────────────────────────────────────────────────────────

/// Index of a Broadcast Isochronous Stream inside a BIG.
///
/// Valid range: 1–31. Index 0 is reserved and never appears in a BASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct BisIndex(u8);

impl BisIndex {
    /// Lowest valid BIS index.
    pub const MIN: u8 = 1;
    /// Highest valid BIS index.
    pub const MAX: u8 = 31;

    /// Create a `BisIndex`, returning an error outside 1–31.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `index == 0` or `index > 31`.
    pub fn try_new(index: u8) -> Result<Self, OutOfRangeError> {
        if (Self::MIN..=Self::MAX).contains(&index) {
            Ok(Self(index))
        } else {
            Err(OutOfRangeError {
                value: u32::from(index),
                min: u32::from(Self::MIN),
                max: u32::from(Self::MAX),
            })
        }
    }

    /// Return the raw index (1–31).
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Bit representing this index in a [`BisBitfield`] (`1 << (index - 1)`).
    #[must_use]
    pub fn bit(self) -> u32 {
        // index is 1..=31, so the shift amount is 0..=30
        1u32.wrapping_shl(u32::from(self.0.saturating_sub(1)))
    }

    /// Iterate over every valid index in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(Self)
    }
}

// ── BisBitfield ──────────────────────────────────────────────────────────────

/// Set of BIS indexes, bit `n - 1` for index `n`.
///
/// `0xFFFF_FFFF` is reserved by the Broadcast Audio Scan Service as the
/// "no preference" request value; see [`BisBitfield::NO_PREFERENCE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct BisBitfield(u32);

impl BisBitfield {
    /// No BIS selected.
    pub const EMPTY: Self = Self(0);
    /// Request sentinel: the assistant leaves the choice to the sink.
    pub const NO_PREFERENCE: Self = Self(0xFFFF_FFFF);
    /// Bits that map to a valid BIS index (1–31).
    pub const VALID_MASK: u32 = 0x7FFF_FFFF;

    /// Wrap a raw bitfield.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Return the raw bitfield.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// `true` when no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `true` for the literal no-preference sentinel.
    #[must_use]
    pub const fn is_no_preference(self) -> bool {
        self.0 == Self::NO_PREFERENCE.0
    }

    /// `true` when `index` is part of the set.
    #[must_use]
    pub fn contains(self, index: BisIndex) -> bool {
        self.0 & index.bit() != 0
    }

    /// Add `index` to the set.
    pub fn insert(&mut self, index: BisIndex) {
        self.0 |= index.bit();
    }

    /// Number of valid BIS indexes in the set (the sentinel counts as 31).
    #[must_use]
    pub fn count(self) -> u8 {
        // count_ones of a 31-bit mask is at most 31
        u8::try_from((self.0 & Self::VALID_MASK).count_ones()).unwrap_or(u8::MAX)
    }

    /// Iterate over the contained indexes in ascending order.
    pub fn iter(self) -> impl Iterator<Item = BisIndex> {
        BisIndex::all().filter(move |idx| self.contains(*idx))
    }
}

impl core::fmt::Display for BisBitfield {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
