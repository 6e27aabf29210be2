//! Sink error types.
//!
//! [`SinkError`] ends [`crate::BroadcastSink::run`]. Everything recoverable
//! is a [`RestartReason`] carried by [`CycleOutcome::Restart`].

use platform::HostError;

use crate::adv::AdvError;
use crate::config::ConfigError;
use crate::orchestrator::SinkPhase;

/// Fatal sink errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SinkError {
    /// The configuration is inconsistent.
    Config(ConfigError),
    /// Stack bring-up or capability registration failed.
    Init(HostError),
    /// Assistant advertising could not be set up or torn down.
    Advertising(AdvError),
    /// Scanning could not be started.
    ScanStart(HostError),
    /// Joining the BIG failed.
    SinkSync(HostError),
    /// Releasing the previous cycle's resources failed.
    Reset(ResetError),
}

impl core::fmt::Display for SinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration: {err}"),
            Self::Init(err) => write!(f, "bluetooth init failed: {err}"),
            Self::Advertising(err) => write!(f, "assistant advertising: {err}"),
            Self::ScanStart(err) => write!(f, "unable to start scan: {err}"),
            Self::SinkSync(err) => write!(f, "unable to sync to broadcast source: {err}"),
            Self::Reset(err) => write!(f, "reset failed: {err}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SinkError {}

impl From<ConfigError> for SinkError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<AdvError> for SinkError {
    fn from(err: AdvError) -> Self {
        Self::Advertising(err)
    }
}

impl From<ResetError> for SinkError {
    fn from(err: ResetError) -> Self {
        Self::Reset(err)
    }
}

/// Which release step of a reset failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetError {
    /// Deleting the broadcast sink failed.
    SinkDelete(HostError),
    /// Deleting the PA sync failed.
    PaSyncDelete(HostError),
}

impl core::fmt::Display for ResetError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SinkDelete(err) => write!(f, "deleting broadcast sink: {err}"),
            Self::PaSyncDelete(err) => write!(f, "deleting PA sync: {err}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ResetError {}

/// Why a cycle was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RestartReason {
    /// A wait expired in the given phase.
    Timeout(SinkPhase),
    /// Stopping the scan failed.
    ScanStop(HostError),
    /// Creating the PA sync failed.
    PaSyncCreate(HostError),
    /// Creating the broadcast sink failed.
    SinkCreate(HostError),
    /// No BIS matches the request and configuration.
    NoViableBis,
}

impl core::fmt::Display for RestartReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Timeout(phase) => write!(f, "timed out while {phase}"),
            Self::ScanStop(err) => write!(f, "unable to stop scan: {err}"),
            Self::PaSyncCreate(err) => write!(f, "unable to create PA sync: {err}"),
            Self::SinkCreate(err) => write!(f, "unable to create sink: {err}"),
            Self::NoViableBis => write!(f, "no valid BIS sync found"),
        }
    }
}

/// Result of one orchestrator cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    /// The sink streamed and the broadcast ended.
    Completed,
    /// The cycle was abandoned and should start over.
    Restart(RestartReason),
}
