//! The radio the engine drives.
//!
//! Advertising and scanning share one radio. Implementations only return
//! from `stop_advertising` and `scan` once the controller has confirmed the
//! radio is idle, so the engine can alternate between the two without
//! overlap.

use embassy_time::Duration;

use super::config::ADDR_LEN;
use super::identity::DeviceIdentity;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host-test"), derive(defmt::Format))]
pub enum RadioError {
    /// The controller rejected the random address.
    AddressRejected,
    /// The controller rejected the advertisement data.
    PayloadRejected,
    AdvertiseStart,
    AdvertiseStop,
    ScanStart,
    /// The radio is busy with the other role.
    Busy,
}

#[allow(async_fn_in_trait)]
pub trait Radio {
    /// Loads address and payload for the next advertisement. Advertising
    /// must be stopped.
    async fn configure_identity(&mut self, identity: &DeviceIdentity) -> Result<(), RadioError>;

    async fn start_advertising(&mut self) -> Result<(), RadioError>;

    /// Stopping an idle radio is not an error.
    async fn stop_advertising(&mut self) -> Result<(), RadioError>;

    /// Scans for `window` and reports the address of every advertisement
    /// heard. Resolves after the scanner has stopped.
    async fn scan<F>(&mut self, window: Duration, on_report: F) -> Result<(), RadioError>
    where
        F: FnMut(&[u8; ADDR_LEN]);
}
