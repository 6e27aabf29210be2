//! Broadcast sink configuration
//!
//! Defaults mirror the build-time settings of a target image. On target the
//! values are baked in with [`SinkConfig::from_build_env`], which reads the
//! `TARGET_BROADCAST_NAME`, `TARGET_BROADCAST_CHANNEL`, ... variables at
//! compile time. Desktop hosts start from [`SinkConfig::default`] and
//! override fields with the builder methods.

use embassy_time::Duration;
use platform::{AudioLocation, BisIndex};

use crate::adv;

/// Maximum length of the target broadcast name filter.
pub const TARGET_NAME_MAX: usize = 32;

/// Maximum length of the local device name.
pub const DEVICE_NAME_MAX: usize = 32;

/// Default local device name.
pub const DEFAULT_DEVICE_NAME: &str = "Broadcast Sink";

/// Default wait for each rendezvous point.
pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default wait for a Broadcast Assistant (connection and PA request).
pub const DEFAULT_ASSISTANT_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration problems detected by [`SinkConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Neither self-scan nor scan offload is enabled.
    NoScanMode,
    /// Stream count outside 1..=31.
    StreamCount(u8),
    /// Target broadcast name longer than [`TARGET_NAME_MAX`].
    TargetNameTooLong(usize),
    /// Device name does not fit the advertising payload.
    DeviceNameTooLong(usize),
    /// A build-time variable could not be parsed.
    InvalidBuildValue(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoScanMode => write!(f, "either self-scan or scan offload must be enabled"),
            Self::StreamCount(n) => write!(f, "stream count {n} outside 1..=31"),
            Self::TargetNameTooLong(n) => {
                write!(f, "target name is {n} bytes, max {TARGET_NAME_MAX}")
            }
            Self::DeviceNameTooLong(n) => {
                write!(f, "device name is {n} bytes, does not fit advertising data")
            }
            Self::InvalidBuildValue(var) => write!(f, "invalid value for {var}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Runtime configuration of a [`crate::BroadcastSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Case-insensitive substring the broadcaster name must contain.
    /// Empty disables the filter.
    pub target_broadcast_name: heapless::String<TARGET_NAME_MAX>,
    /// Audio location to sync to. `None` selects BIS by request only.
    pub target_channel: Option<AudioLocation>,
    /// Maximum number of concurrently synced streams (1..=31).
    pub stream_count: u8,
    /// Maximum codec frames per SDU advertised in the LC3 capability.
    pub max_codec_frames_per_sdu: u8,
    /// Scan for broadcasters ourselves.
    pub scan_self: bool,
    /// Accept scan delegation from a Broadcast Assistant.
    pub scan_offload: bool,
    /// Accept PA sync transfer (PAST) from the assistant.
    pub past_receiver: bool,
    /// Initialise LC3 decoding during bring-up.
    pub lc3: bool,
    /// Initialise USB audio output during bring-up.
    pub usb_audio: bool,
    /// Complete local name advertised to assistants.
    pub device_name: heapless::String<DEVICE_NAME_MAX>,
    /// Wait for each rendezvous point.
    pub gate_timeout: Duration,
    /// Wait for an assistant connection and PA request.
    pub assistant_timeout: Duration,
}

impl SinkConfig {
    /// Default configuration (no name filter, unconstrained BIS selection,
    /// one stream, both scan modes, PAST accepted).
    #[must_use]
    pub fn new() -> Self {
        let mut device_name = heapless::String::new();
        // DEFAULT_DEVICE_NAME is shorter than DEVICE_NAME_MAX
        let _ = device_name.push_str(DEFAULT_DEVICE_NAME);
        Self {
            target_broadcast_name: heapless::String::new(),
            target_channel: None,
            stream_count: 1,
            max_codec_frames_per_sdu: 1,
            scan_self: true,
            scan_offload: true,
            past_receiver: true,
            lc3: false,
            usb_audio: false,
            device_name,
            gate_timeout: DEFAULT_GATE_TIMEOUT,
            assistant_timeout: DEFAULT_ASSISTANT_TIMEOUT,
        }
    }

    /// Defaults overridden by the build-time environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBuildValue`] naming the first variable
    /// that fails to parse, or any error from [`SinkConfig::validate`].
    pub fn from_build_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();
        if let Some(name) = option_env!("TARGET_BROADCAST_NAME") {
            config = config.with_target_name(name)?;
        }
        if let Some(channel) = option_env!("TARGET_BROADCAST_CHANNEL") {
            let location = AudioLocation::parse(channel)
                .ok_or(ConfigError::InvalidBuildValue("TARGET_BROADCAST_CHANNEL"))?;
            config.target_channel = Some(location);
        }
        if let Some(count) = option_env!("BROADCAST_SNK_STREAM_COUNT") {
            config.stream_count = parse_u8(count, "BROADCAST_SNK_STREAM_COUNT")?;
        }
        if let Some(frames) = option_env!("MAX_CODEC_FRAMES_PER_SDU") {
            config.max_codec_frames_per_sdu = parse_u8(frames, "MAX_CODEC_FRAMES_PER_SDU")?;
        }
        if let Some(flag) = option_env!("SCAN_SELF") {
            config.scan_self = parse_flag(flag, "SCAN_SELF")?;
        }
        if let Some(flag) = option_env!("SCAN_OFFLOAD") {
            config.scan_offload = parse_flag(flag, "SCAN_OFFLOAD")?;
        }
        if let Some(flag) = option_env!("PER_ADV_SYNC_TRANSFER_RECEIVER") {
            config.past_receiver = parse_flag(flag, "PER_ADV_SYNC_TRANSFER_RECEIVER")?;
        }
        if let Some(flag) = option_env!("LIBLC3") {
            config.lc3 = parse_flag(flag, "LIBLC3")?;
        }
        if let Some(flag) = option_env!("USE_USB_AUDIO_OUTPUT") {
            config.usb_audio = parse_flag(flag, "USE_USB_AUDIO_OUTPUT")?;
        }
        if let Some(name) = option_env!("BT_DEVICE_NAME") {
            config = config.with_device_name(name)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Set the broadcast name filter.
    ///
    /// # Errors
    ///
    /// [`ConfigError::TargetNameTooLong`] if `name` exceeds [`TARGET_NAME_MAX`].
    pub fn with_target_name(mut self, name: &str) -> Result<Self, ConfigError> {
        self.target_broadcast_name.clear();
        self.target_broadcast_name
            .push_str(name)
            .map_err(|_| ConfigError::TargetNameTooLong(name.len()))?;
        Ok(self)
    }

    /// Set the advertised device name.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DeviceNameTooLong`] if `name` exceeds [`DEVICE_NAME_MAX`].
    pub fn with_device_name(mut self, name: &str) -> Result<Self, ConfigError> {
        self.device_name.clear();
        self.device_name
            .push_str(name)
            .map_err(|_| ConfigError::DeviceNameTooLong(name.len()))?;
        Ok(self)
    }

    /// Set the target channel.
    #[must_use]
    pub fn with_target_channel(mut self, channel: Option<AudioLocation>) -> Self {
        self.target_channel = channel;
        self
    }

    /// Set the maximum stream count.
    #[must_use]
    pub fn with_stream_count(mut self, count: u8) -> Self {
        self.stream_count = count;
        self
    }

    /// Enable or disable both scan modes.
    #[must_use]
    pub fn with_scan_modes(mut self, scan_self: bool, scan_offload: bool) -> Self {
        self.scan_self = scan_self;
        self.scan_offload = scan_offload;
        self
    }

    /// Set both wait timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, gate: Duration, assistant: Duration) -> Self {
        self.gate_timeout = gate;
        self.assistant_timeout = assistant;
        self
    }

    /// Check the configuration for consistency.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.scan_self && !self.scan_offload {
            return Err(ConfigError::NoScanMode);
        }
        if !(1..=BisIndex::MAX).contains(&self.stream_count) {
            return Err(ConfigError::StreamCount(self.stream_count));
        }
        if self.target_broadcast_name.len() > TARGET_NAME_MAX {
            return Err(ConfigError::TargetNameTooLong(self.target_broadcast_name.len()));
        }
        if adv::assistant_payload(&self.device_name).is_err() {
            return Err(ConfigError::DeviceNameTooLong(self.device_name.len()));
        }
        Ok(())
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_u8(text: &str, var: &'static str) -> Result<u8, ConfigError> {
    text.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidBuildValue(var))
}

/// Kconfig-style boolean: `y`/`n`, also `1`/`0` and `true`/`false`.
fn parse_flag(text: &str, var: &'static str) -> Result<bool, ConfigError> {
    match text.trim() {
        "y" | "Y" | "1" | "true" => Ok(true),
        "n" | "N" | "0" | "false" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBuildValue(var)),
    }
}
