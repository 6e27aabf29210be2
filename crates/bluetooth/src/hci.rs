//! HCI and GAP constants used by the broadcast sink.
//!
//! Values follow the Bluetooth Core Spec v5.4 (Vol 1 Part F error codes,
//! Vol 4 Part E coding formats, Vol 6 Part B periodic advertising timing)
//! and the Bluetooth Assigned Numbers document for AD types and UUIDs.


// ─────────────────────────────────────────────────────────────────────────────
// Reason codes
// ─────────────────────────────────────────────────────────────────────────────

/// HCI error / disconnect reason codes seen by the sink.
pub mod reason {
    /// Success.
    pub const SUCCESS: u8 = 0x00;
    /// Connection timeout (supervision timeout expired).
    pub const CONN_TIMEOUT: u8 = 0x08;
    /// Remote user terminated the connection.
    pub const REMOTE_USER_TERM_CONN: u8 = 0x13;
    /// Connection terminated by the local host.
    pub const LOCALHOST_TERM_CONN: u8 = 0x16;
    /// Failed to establish synchronization (PA or BIG).
    pub const CONN_FAIL_TO_ESTAB: u8 = 0x3E;
}

/// Short description of an HCI reason code for logs.
#[must_use]
pub fn reason_str(code: u8) -> &'static str {
    match code {
        reason::SUCCESS => "success",
        reason::CONN_TIMEOUT => "connection timeout",
        reason::REMOTE_USER_TERM_CONN => "remote user terminated",
        reason::LOCALHOST_TERM_CONN => "local host terminated",
        reason::CONN_FAIL_TO_ESTAB => "failed to establish",
        _ => "unknown",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Coding formats
// ─────────────────────────────────────────────────────────────────────────────

/// HCI coding format: LC3.
pub const CODING_FORMAT_LC3: u8 = 0x06;

// ─────────────────────────────────────────────────────────────────────────────
// AD types and UUIDs
// ─────────────────────────────────────────────────────────────────────────────

/// Advertising data types parsed or produced by the sink.
pub mod ad_type {
    /// Flags.
    pub const FLAGS: u8 = 0x01;
    /// Complete list of 16-bit service UUIDs.
    pub const UUID16_ALL: u8 = 0x03;
    /// Shortened local name.
    pub const NAME_SHORTENED: u8 = 0x08;
    /// Complete local name.
    pub const NAME_COMPLETE: u8 = 0x09;
    /// Service data with a 16-bit UUID.
    pub const SVC_DATA16: u8 = 0x16;
    /// Broadcast name.
    pub const BROADCAST_NAME: u8 = 0x30;
}

/// AD flag: LE general discoverable mode.
pub const AD_FLAG_GENERAL: u8 = 0x02;
/// AD flag: BR/EDR not supported.
pub const AD_FLAG_NO_BREDR: u8 = 0x04;

/// Broadcast Audio Announcement service UUID.
pub const UUID_BROADCAST_AUDIO: u16 = 0x1852;
/// Broadcast Audio Scan Service UUID.
pub const UUID_BASS: u16 = 0x184F;
/// Published Audio Capabilities Service UUID.
pub const UUID_PACS: u16 = 0x1850;

// ─────────────────────────────────────────────────────────────────────────────
// Periodic advertising timing
// ─────────────────────────────────────────────────────────────────────────────

/// Minimum PA sync timeout (10 ms units): 100 ms.
pub const PER_ADV_MIN_TIMEOUT: u16 = 0x000A;
/// Maximum PA sync timeout (10 ms units): 163.84 s.
pub const PER_ADV_MAX_TIMEOUT: u16 = 0x4000;

/// Convert a PA interval (1.25 ms units) to microseconds.
#[must_use]
pub const fn pa_interval_to_us(interval: u16) -> u32 {
    // u16::MAX * 1250 fits in u32
    (interval as u32).saturating_mul(1250)
}

/// Convert microseconds to PA sync timeout units (10 ms).
#[must_use]
pub const fn us_to_sync_timeout(us: u32) -> u32 {
    us.wrapping_div(10_000)
}
