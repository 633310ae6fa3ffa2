use bme280::i2c::BME280;
use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
use embassy_executor::task;
use embassy_nrf::twim;
use embassy_nrf::wdt::WatchdogHandle;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::{Delay, Timer};
use libm::powf;

use crate::beacon::shared::SensorSample;
use crate::system_info::SYSTEM_STATE;

const SENSOR_UPDATE_INTERVAL_MS: u64 = 1000;
const SEA_LEVEL_HPA: f32 = 1013.25;

pub type SharedI2c = I2cDevice<'static, NoopRawMutex, twim::Twim<'static>>;

/// Polls the BME280 (SDO grounded, 0x76). A sensor that fails to come up
/// stays unavailable and the sensor channels are skipped.
#[task]
pub async fn sensor_task(i2c: SharedI2c, mut watchdog: WatchdogHandle) {
    let mut delay = Delay;
    let mut bme = BME280::new_primary(i2c);

    let available = match bme.init(&mut delay) {
        Ok(()) => {
            defmt::info!("BME280 initialized");
            true
        }
        Err(_) => {
            defmt::warn!("BME280 init failed");
            false
        }
    };
    SYSTEM_STATE.set_sensor_available(available);

    loop {
        if available {
            match bme.measure(&mut delay) {
                Ok(m) => {
                    let pressure_hpa = m.pressure / 100.0;
                    let sample = SensorSample {
                        temperature_c: m.temperature,
                        humidity_pct: m.humidity,
                        pressure_hpa,
                        altitude_m: pressure_to_altitude(pressure_hpa),
                    };
                    defmt::debug!("BME280: {}", sample);
                    SYSTEM_STATE.publish_sample(sample);
                }
                Err(_) => {
                    defmt::warn!("BME280 read failed");
                }
            }
        }

        watchdog.pet();
        Timer::after_millis(SENSOR_UPDATE_INTERVAL_MS).await;
    }
}

fn pressure_to_altitude(pressure_hpa: f32) -> f32 {
    if pressure_hpa <= 0.0 {
        return 0.0;
    }
    let ratio = pressure_hpa / SEA_LEVEL_HPA;
    44_330.0 * (1.0 - powf(ratio, 0.1903))
}
