//! Bluetooth LE Audio data types shared between the host stack and the
//! broadcast sink.
//!
//! Handles are opaque tokens issued by the host stack. They are `Copy` so
//! the sink can record them in its session without borrowing host storage.

use crate::audio_types::BisBitfield;

/// Maximum number of subgroups tracked per broadcast source.
pub const BASS_MAX_SUBGROUPS: usize = 4;

/// Size of a broadcast code in octets.
pub const BROADCAST_CODE_SIZE: usize = 16;

/// PA interval value meaning "unknown" in a PA sync request.
pub const PA_INTERVAL_UNKNOWN: u16 = 0xFFFF;

// ── Addresses ────────────────────────────────────────────────────────────────

/// LE address type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddrKind {
    /// Public device address.
    #[default]
    Public,
    /// Random device address.
    Random,
}

/// LE device address (type + 6 octets, little-endian as on air).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BtAddrLe {
    /// Address type.
    pub kind: AddrKind,
    /// Address octets, least significant first.
    pub bytes: [u8; 6],
}

impl BtAddrLe {
    /// Create an address.
    #[must_use]
    pub const fn new(kind: AddrKind, bytes: [u8; 6]) -> Self {
        Self { kind, bytes }
    }
}

impl core::fmt::Display for BtAddrLe {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let [b0, b1, b2, b3, b4, b5] = self.bytes;
        let kind = match self.kind {
            AddrKind::Public => "public",
            AddrKind::Random => "random",
        };
        write!(
            f,
            "{b5:02X}:{b4:02X}:{b3:02X}:{b2:02X}:{b1:02X}:{b0:02X} ({kind})"
        )
    }
}

// ── Handles ──────────────────────────────────────────────────────────────────

/// ACL connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnHandle(pub u16);

/// Periodic advertising sync handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PaSyncHandle(pub u16);

/// Broadcast sink instance handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SinkHandle(pub u8);

/// Extended advertising set handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvSetHandle(pub u8);

/// Audio stream handle (one per BIS the sink may join).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamId(pub u8);

/// Scan delegator receive-state source id.
pub type SourceId = u8;

// ── Broadcast identity ───────────────────────────────────────────────────────

/// 24-bit broadcast identifier carried in the Broadcast Audio Announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BroadcastId(u32);

impl BroadcastId {
    /// On the wire the id takes 3 octets.
    pub const BYTE_SIZE: usize = 3;
    /// Largest representable id.
    pub const MAX: u32 = 0x00FF_FFFF;

    /// Create an id, rejecting values wider than 24 bits.
    #[must_use]
    pub fn new(raw: u32) -> Option<Self> {
        (raw <= Self::MAX).then_some(Self(raw))
    }

    /// Decode a little-endian 24-bit id from the first three octets.
    #[must_use]
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [b0, b1, b2, ..] => Some(Self(u32::from_le_bytes([*b0, *b1, *b2, 0x00]))),
            _ => None,
        }
    }

    /// Return the raw 24-bit value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for BroadcastId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#08x}", self.0)
    }
}

/// Broadcast code used to decrypt an encrypted BIG.
pub type BroadcastCode = [u8; BROADCAST_CODE_SIZE];

// ── Scan reports ─────────────────────────────────────────────────────────────

/// One advertising report delivered by the scanner.
#[derive(Debug, Clone, Copy)]
pub struct ScanReport<'a> {
    /// Advertiser address.
    pub addr: BtAddrLe,
    /// Advertising set id.
    pub sid: u8,
    /// Periodic advertising interval in 1.25 ms units; 0 when the advertiser
    /// has no periodic train.
    pub interval: u16,
    /// Received signal strength (dBm).
    pub rssi: i8,
    /// Raw advertising data (length/type/value structures).
    pub data: &'a [u8],
}

/// Information reported when a PA sync is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PaSyncedInfo {
    /// Advertiser address.
    pub addr: BtAddrLe,
    /// Advertising set id.
    pub sid: u8,
    /// PA interval in 1.25 ms units.
    pub interval: u16,
}

/// BIGInfo summary relevant to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BigInfo {
    /// Number of BIS in the BIG.
    pub num_bis: u8,
    /// `true` when the BIG is encrypted and needs a broadcast code.
    pub encryption: bool,
}

// ── Host call parameters ─────────────────────────────────────────────────────

/// Parameters for creating a PA sync directly from a scan result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PaSyncParams {
    /// Advertiser address.
    pub addr: BtAddrLe,
    /// Advertising set id.
    pub sid: u8,
    /// Number of periodic advertising events that may be skipped.
    pub skip: u16,
    /// Sync timeout in 10 ms units.
    pub timeout: u16,
    /// Ask the controller to filter duplicate reports.
    pub filter_duplicates: bool,
}

/// Parameters for accepting a periodic advertising sync transfer (PAST).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PastParams {
    /// Number of periodic advertising events that may be skipped.
    pub skip: u16,
    /// Sync timeout in 10 ms units.
    pub timeout: u16,
}

/// LC3 sink capability registered with the published audio capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodecCapability {
    /// Supported sampling frequencies in Hz.
    pub frequencies_hz: [u32; 2],
    /// Frame duration in microseconds.
    pub frame_duration_us: u32,
    /// Supported audio channel count.
    pub channel_count: u8,
    /// Minimum octets per codec frame.
    pub min_octets_per_frame: u16,
    /// Maximum octets per codec frame.
    pub max_octets_per_frame: u16,
    /// Maximum codec frames per SDU.
    pub max_frames_per_sdu: u8,
    /// Supported context bitmask (conversational | media).
    pub contexts: u16,
}

impl CodecCapability {
    /// Conversational audio context bit.
    pub const CONTEXT_CONVERSATIONAL: u16 = 0x0002;
    /// Media audio context bit.
    pub const CONTEXT_MEDIA: u16 = 0x0004;

    /// LC3 at 16/24 kHz, 10 ms frames, mono, 40–60 octets per frame.
    #[must_use]
    pub const fn lc3_sink(max_frames_per_sdu: u8) -> Self {
        Self {
            frequencies_hz: [16_000, 24_000],
            frame_duration_us: 10_000,
            channel_count: 1,
            min_octets_per_frame: 40,
            max_octets_per_frame: 60,
            max_frames_per_sdu,
            contexts: Self::CONTEXT_CONVERSATIONAL | Self::CONTEXT_MEDIA,
        }
    }
}

// ── Scan delegator receive state ─────────────────────────────────────────────

/// PA synchronisation state reported in a receive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PaState {
    /// Not synchronised to the PA.
    #[default]
    NotSynced = 0x00,
    /// SyncInfo requested from the assistant (PAST pending).
    InfoRequested = 0x01,
    /// Synchronised to the PA.
    Synced = 0x02,
    /// Synchronisation failed.
    Failed = 0x03,
    /// The assistant does not support PAST.
    NoPast = 0x04,
}

/// BIG encryption state reported in a receive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncryptState {
    /// BIG is not encrypted.
    #[default]
    NotEncrypted,
    /// A broadcast code is required.
    CodeRequired,
    /// Decrypting with the current code.
    Decrypting,
    /// The provided code was wrong.
    BadCode,
}

/// Per-subgroup part of a receive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceiverSubgroup {
    /// BIS sync state / request for this subgroup.
    pub bis_sync: BisBitfield,
}

/// One broadcast source tracked on behalf of a Broadcast Assistant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReceiverState {
    /// Source id assigned by the scan delegator.
    pub src_id: SourceId,
    /// Broadcaster address.
    pub addr: BtAddrLe,
    /// Advertising set id.
    pub adv_sid: u8,
    /// Broadcast id (24 bits).
    pub broadcast_id: u32,
    /// PA sync state.
    pub pa_sync_state: PaState,
    /// Encryption state.
    pub encrypt_state: EncryptState,
    /// Subgroups announced for this source.
    pub subgroups: heapless::Vec<ReceiverSubgroup, BASS_MAX_SUBGROUPS>,
}

impl ReceiverState {
    /// `true` when the given broadcaster matches this source exactly.
    #[must_use]
    pub fn matches(&self, addr: &BtAddrLe, sid: u8, broadcast_id: BroadcastId) -> bool {
        self.addr == *addr && self.adv_sid == sid && self.broadcast_id == broadcast_id.get()
    }
}
