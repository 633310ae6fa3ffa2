//! Bit-serial transmission driver.
//!
//! One identity is live at a time: each bit is searched, encoded, put on air
//! and held for one dwell window before the next one replaces it. The dwell
//! is an awaited delay so other tasks keep running and keep petting the
//! watchdog.

use embedded_hal_async::delay::DelayNs;

use super::config::{Provisioning, BEACON_DWELL, KEY_LEN, LOCATION_DWELL_REPEATS};
use super::identity::{advertisement_hash, DeviceIdentity};
use super::key::{KeySearch, KeySearchError};
use super::oracle::{CurveOracle, P224Oracle};
use super::radio::{Radio, RadioError};

/// Outcome of one transmission pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(not(feature = "host-test"), derive(defmt::Format))]
pub struct TxReport {
    /// Identities that made it on air.
    pub sent: u32,
    /// Bits dropped because the key search gave up.
    pub search_failures: u32,
    /// Bits dropped because the radio refused the identity.
    pub radio_failures: u32,
}

impl TxReport {
    fn merge(&mut self, other: TxReport) {
        self.sent += other.sent;
        self.search_failures += other.search_failures;
        self.radio_failures += other.radio_failures;
    }
}

pub struct Transmitter<R, D, O = P224Oracle> {
    radio: R,
    delay: D,
    search: KeySearch<O>,
    identity: DeviceIdentity,
    location_key: [u8; KEY_LEN],
    totals: TxReport,
}

impl<R: Radio, D: DelayNs> Transmitter<R, D, P224Oracle> {
    pub fn new(radio: R, delay: D, provisioning: &Provisioning) -> Self {
        Self::with_search(radio, delay, KeySearch::new(provisioning), provisioning)
    }
}

impl<R: Radio, D: DelayNs, O: CurveOracle> Transmitter<R, D, O> {
    pub fn with_search(radio: R, delay: D, search: KeySearch<O>, provisioning: &Provisioning) -> Self {
        Self {
            radio,
            delay,
            search,
            identity: DeviceIdentity::new(),
            location_key: provisioning.location_key,
            totals: TxReport::default(),
        }
    }

    /// The radio, for the census to scan with between transmissions.
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Everything sent or dropped since boot.
    pub fn totals(&self) -> TxReport {
        self.totals
    }

    /// Sends `data` bit by bit, most significant bit first, as message
    /// `message_id`. Returns once the last identity has been taken off air.
    pub async fn send_bytes_blocking(&mut self, data: &[u8], message_id: u32) -> TxReport {
        let mut report = TxReport::default();

        for (byte_index, &byte) in data.iter().enumerate() {
            for bit_index in 0..8u32 {
                let bit = byte & (0x80 >> bit_index) != 0;
                let index = byte_index as u32 * 8 + bit_index;

                let key = match self.search.find_valid_key(index, message_id, bit) {
                    Ok(key) => key,
                    Err(KeySearchError::Exhausted { attempts }) => {
                        error!(
                            "tx: no valid key for message {} bit {} after {} attempts, skipping",
                            message_id,
                            index,
                            attempts
                        );
                        report.search_failures += 1;
                        continue;
                    }
                };

                let hash = advertisement_hash(key.as_bytes());
                debug!(
                    "tx: message {} bit {} = {} (attempt {}, id {=[u8]:x})",
                    message_id,
                    index,
                    bit,
                    key.attempt(),
                    &hash[..4]
                );

                self.identity.encode(key.as_bytes());
                match self.beacon_current_identity().await {
                    Ok(()) => {
                        report.sent += 1;
                        self.delay.delay_ms(BEACON_DWELL.as_millis() as u32).await;
                    }
                    Err(e) => {
                        warn!("tx: message {} bit {} skipped: {:?}", message_id, index, e);
                        report.radio_failures += 1;
                    }
                }
            }
        }

        self.finish(report).await
    }

    /// Broadcasts the pre-agreed location key as a plain offline-finding
    /// beacon for a short fixed window.
    pub async fn send_location_blocking(&mut self) -> TxReport {
        let mut report = TxReport::default();
        let location_key = self.location_key;
        self.identity.encode(&location_key);

        for _ in 0..LOCATION_DWELL_REPEATS {
            match self.beacon_current_identity().await {
                Ok(()) => {
                    report.sent += 1;
                    self.delay.delay_ms(BEACON_DWELL.as_millis() as u32).await;
                }
                Err(e) => {
                    warn!("tx: location beacon skipped: {:?}", e);
                    report.radio_failures += 1;
                }
            }
        }

        self.finish(report).await
    }

    /// Stop, re-address, reload, start. Advertising must be stopped before
    /// the address may change.
    async fn beacon_current_identity(&mut self) -> Result<(), RadioError> {
        self.radio.stop_advertising().await?;
        self.radio.configure_identity(&self.identity).await?;
        self.radio.start_advertising().await
    }

    async fn finish(&mut self, report: TxReport) -> TxReport {
        if let Err(e) = self.radio.stop_advertising().await {
            warn!("tx: failed to stop advertising: {:?}", e);
        }
        self.totals.merge(report);
        report
    }
}
