//! Connectable advertising that lets a Broadcast Assistant find the sink.

use platform::{BapHost, HostError};

use crate::hci::{ad_type, AD_FLAG_GENERAL, AD_FLAG_NO_BREDR, UUID_BASS, UUID_PACS};
use crate::ltv::LtvWriter;
use crate::sink::BroadcastSink;

/// Legacy advertising data capacity.
pub const ADV_DATA_MAX: usize = 31;

/// Encoded assistant advertising data.
pub type AdvPayload = heapless::Vec<u8, ADV_DATA_MAX>;

/// Assistant advertising failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvError {
    /// The advertising data does not fit in [`ADV_DATA_MAX`] bytes.
    TooLong,
    /// The host refused an advertising operation.
    Host(HostError),
}

impl core::fmt::Display for AdvError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooLong => write!(f, "advertising data exceeds {ADV_DATA_MAX} bytes"),
            Self::Host(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AdvError {}

impl From<HostError> for AdvError {
    fn from(err: HostError) -> Self {
        Self::Host(err)
    }
}

/// Build the advertising data: flags, BASS + PACS UUIDs, BASS service data
/// and the complete local name.
///
/// # Errors
///
/// [`AdvError::TooLong`] when the name does not fit.
pub fn assistant_payload(device_name: &str) -> Result<AdvPayload, AdvError> {
    let [bass_lo, bass_hi] = UUID_BASS.to_le_bytes();
    let [pacs_lo, pacs_hi] = UUID_PACS.to_le_bytes();

    let mut ad = LtvWriter::<ADV_DATA_MAX>::new();
    ad.push(ad_type::FLAGS, &[AD_FLAG_GENERAL | AD_FLAG_NO_BREDR])
        .and_then(|()| ad.push(ad_type::UUID16_ALL, &[bass_lo, bass_hi, pacs_lo, pacs_hi]))
        .and_then(|()| ad.push(ad_type::SVC_DATA16, &[bass_lo, bass_hi]))
        .and_then(|()| ad.push(ad_type::NAME_COMPLETE, device_name.as_bytes()))
        .map_err(|_| AdvError::TooLong)?;
    Ok(ad.into_inner())
}

impl<H: BapHost> BroadcastSink<H> {
    /// Replace any previous advertising set with a fresh one and start it.
    ///
    /// # Errors
    ///
    /// Any host failure while tearing down the stale set or bringing up the
    /// new one.
    pub(crate) fn start_advertising(&self) -> Result<(), AdvError> {
        let payload = assistant_payload(&self.config().device_name)?;

        self.stop_advertising()?;

        let adv = self.host().adv_create().map_err(|err| {
            error!("Failed to create advertising set: {}", err);
            AdvError::Host(err)
        })?;
        self.with_session(|s| s.adv = Some(adv));

        self.host().adv_set_data(adv, &payload).map_err(|err| {
            error!("Failed to set advertising data: {}", err);
            AdvError::Host(err)
        })?;
        self.host().adv_start(adv).map_err(|err| {
            error!("Failed to start advertising set: {}", err);
            AdvError::Host(err)
        })?;
        info!("Advertising for Broadcast Assistant");
        Ok(())
    }

    /// Stop and delete the advertising set, if any.
    ///
    /// # Errors
    ///
    /// The host failure from stopping or deleting the set. The set is
    /// forgotten only once it is deleted.
    pub(crate) fn stop_advertising(&self) -> Result<(), AdvError> {
        let Some(adv) = self.with_session(|s| s.adv) else {
            return Ok(());
        };
        self.host().adv_stop(adv).map_err(|err| {
            error!("Failed to stop advertising set: {}", err);
            AdvError::Host(err)
        })?;
        self.host().adv_delete(adv).map_err(|err| {
            error!("Failed to delete advertising set: {}", err);
            AdvError::Host(err)
        })?;
        self.with_session(|s| s.adv = None);
        Ok(())
    }
}
