use core::ptr;

use embassy_executor::task;
use embassy_nrf::wdt::WatchdogHandle;
use embassy_time::{Delay, Duration, Instant, Timer};
use nrf_softdevice::ble::central;
use nrf_softdevice::{raw, RawError, Softdevice};
use static_cell::StaticCell;

use crate::beacon::config::{ADDR_LEN, ADV_INTERVAL_UNITS, ADV_PAYLOAD_LEN, BEACON_LOOP_INTERVAL};
use crate::beacon::engine::BeaconEngine;
use crate::beacon::identity::DeviceIdentity;
use crate::beacon::radio::{Radio, RadioError};
use crate::provisioning::PROVISIONING;
use crate::system_info::SYSTEM_STATE;

/// The SoftDevice reads advertisement data from this buffer for as long as
/// the advertising set is configured.
static ADV_DATA: StaticCell<[u8; ADV_PAYLOAD_LEN]> = StaticCell::new();

/// S140 radio back-end. Owns the single advertising set.
///
/// `sd_ble_gap_adv_stop` is synchronous, and `central::scan` only resolves
/// after the scan timeout event, so the radio is idle whenever one of these
/// calls returns.
pub struct SoftdeviceRadio {
    sd: &'static Softdevice,
    adv_handle: u8,
    adv_data: &'static mut [u8; ADV_PAYLOAD_LEN],
    advertising: bool,
}

impl SoftdeviceRadio {
    pub fn new(sd: &'static Softdevice) -> Self {
        Self {
            sd,
            adv_handle: raw::BLE_GAP_ADV_SET_HANDLE_NOT_SET as u8,
            adv_data: ADV_DATA.init([0; ADV_PAYLOAD_LEN]),
            advertising: false,
        }
    }
}

impl Radio for SoftdeviceRadio {
    async fn configure_identity(&mut self, identity: &DeviceIdentity) -> Result<(), RadioError> {
        if self.advertising {
            return Err(RadioError::Busy);
        }

        // The SoftDevice takes the address least-significant byte first.
        let mut addr_le = identity.address;
        addr_le.reverse();
        let addr = raw::ble_gap_addr_t {
            _bitfield_1: raw::ble_gap_addr_t::new_bitfield_1(
                0,
                raw::BLE_GAP_ADDR_TYPE_RANDOM_STATIC as u8,
            ),
            addr: addr_le,
        };
        RawError::convert(unsafe { raw::sd_ble_gap_addr_set(&addr) }).map_err(|e| {
            defmt::warn!("BLE set addr failed: {:?}", e);
            RadioError::AddressRejected
        })?;

        self.adv_data.copy_from_slice(&identity.payload);

        let mut adv_params: raw::ble_gap_adv_params_t = unsafe { core::mem::zeroed() };
        adv_params.properties.type_ =
            raw::BLE_GAP_ADV_TYPE_NONCONNECTABLE_NONSCANNABLE_UNDIRECTED as u8;
        adv_params.interval = ADV_INTERVAL_UNITS;
        adv_params.duration = 0;
        adv_params.filter_policy = raw::BLE_GAP_ADV_FP_ANY as u8;
        adv_params.primary_phy = raw::BLE_GAP_PHY_1MBPS as u8;

        let adv_data = raw::ble_gap_adv_data_t {
            adv_data: raw::ble_data_t {
                p_data: self.adv_data.as_mut_ptr(),
                len: ADV_PAYLOAD_LEN as u16,
            },
            scan_rsp_data: raw::ble_data_t {
                p_data: ptr::null_mut(),
                len: 0,
            },
        };

        RawError::convert(unsafe {
            raw::sd_ble_gap_adv_set_configure(&mut self.adv_handle, &adv_data, &adv_params)
        })
        .map_err(|e| {
            defmt::warn!("BLE adv configure failed: {:?}", e);
            RadioError::PayloadRejected
        })
    }

    async fn start_advertising(&mut self) -> Result<(), RadioError> {
        RawError::convert(unsafe {
            raw::sd_ble_gap_adv_start(self.adv_handle, raw::BLE_CONN_CFG_TAG_DEFAULT as u8)
        })
        .map_err(|e| {
            defmt::warn!("BLE adv start failed: {:?}", e);
            RadioError::AdvertiseStart
        })?;
        self.advertising = true;
        Ok(())
    }

    async fn stop_advertising(&mut self) -> Result<(), RadioError> {
        if !self.advertising {
            return Ok(());
        }
        match RawError::convert(unsafe { raw::sd_ble_gap_adv_stop(self.adv_handle) }) {
            // Already stopped by the SoftDevice.
            Ok(()) | Err(RawError::InvalidState) => {
                self.advertising = false;
                Ok(())
            }
            Err(e) => {
                defmt::warn!("BLE adv stop failed: {:?}", e);
                Err(RadioError::AdvertiseStop)
            }
        }
    }

    async fn scan<F>(&mut self, window: Duration, mut on_report: F) -> Result<(), RadioError>
    where
        F: FnMut(&[u8; ADDR_LEN]),
    {
        if self.advertising {
            return Err(RadioError::Busy);
        }

        let config = central::ScanConfig {
            // Units of 10 ms.
            timeout: (window.as_millis() / 10) as u16,
            active: false,
            ..Default::default()
        };
        let result = central::scan(self.sd, &config, |report| {
            let mut addr = report.peer_addr.addr;
            addr.reverse();
            on_report(&addr);
            None::<()>
        })
        .await;

        match result {
            Ok(()) | Err(central::ScanError::Timeout) => Ok(()),
            Err(e) => {
                defmt::warn!("BLE scan failed: {:?}", e);
                Err(RadioError::ScanStart)
            }
        }
    }
}

#[task]
pub async fn beacon_task(sd: &'static Softdevice, mut watchdog: WatchdogHandle) {
    defmt::info!(
        "Beacon: modem {=u32:x}, magic {=[u8]:x}",
        PROVISIONING.modem_id,
        &PROVISIONING.pubkey_magic[..]
    );

    let mut engine = BeaconEngine::new(SoftdeviceRadio::new(sd), Delay, &PROVISIONING);

    loop {
        engine.step(Instant::now(), &SYSTEM_STATE).await;
        watchdog.pet();
        Timer::after(BEACON_LOOP_INTERVAL).await;
    }
}
