#![no_std]
#![no_main]

extern crate alloc;

mod beacon;
mod ble;
mod board;
mod button;
mod display;
mod platform;
mod provisioning;
mod sensor;
mod system_info;

use core::cell::RefCell;

use cortex_m::peripheral::SCB;
use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Input, Level, Output, OutputDrive, Pull};
use embassy_nrf::wdt::{self, Watchdog};
use embassy_nrf::{bind_interrupts, peripherals, twim};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use static_cell::StaticCell;

use {defmt_rtt as _, panic_probe as _};
use nrf_softdevice::{raw, Softdevice};

use crate::beacon::config::WATCHDOG_TIMEOUT;

bind_interrupts!(struct Irqs {
    TWISPI0 => twim::InterruptHandler<peripherals::TWISPI0>;
});

// DMA buffers must live in RAM for TWIM.
static mut I2C_TX_BUF: [u8; 32] = [0; 32];
static I2C_BUS: StaticCell<BlockingMutex<NoopRawMutex, RefCell<twim::Twim<'static>>>> =
    StaticCell::new();

/// The watchdog runs off the 32.768 kHz low-frequency clock.
const WDT_TICKS_PER_SECOND: u32 = 32_768;

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) {
    sd.run().await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    platform::init_heap();
    platform::paint_stack();

    let reset_cause = system_info::take_reset_cause();
    defmt::info!("Boot, reset cause: {:?}", reset_cause);

    let mut config = embassy_nrf::config::Config::default();
    config.lfclk_source = embassy_nrf::config::LfclkSource::InternalRC;

    {
        use embassy_nrf::interrupt::Priority;

        config.gpiote_interrupt_priority = Priority::P2;
        config.time_interrupt_priority = Priority::P2;
    }

    let p = embassy_nrf::init(config);
    let board::Board {
        led,
        button,
        i2c_sda,
        i2c_scl,
        twispi0,
        wdt,
    } = board::Board::new(p);

    let sd_config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        // One advertising set for the beacon, one central role for the census.
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        ..Default::default()
    };
    let sd: &'static Softdevice = Softdevice::enable(&sd_config);
    spawner.spawn(softdevice_task(sd)).unwrap();

    let mut wdt_config = wdt::Config::default();
    wdt_config.timeout_ticks = WDT_TICKS_PER_SECOND * WATCHDOG_TIMEOUT.as_secs() as u32;
    // Handles in `supervisor::Unit` slot order.
    let [beacon_wd, sensor_wd, display_wd, input_wd, supervisor_wd] =
        match Watchdog::try_new(wdt, wdt_config) {
            Ok((_watchdog, handles)) => handles,
            Err(_) => {
                defmt::error!("Watchdog already running with another config, resetting");
                SCB::sys_reset();
            }
        };

    let i2c = unsafe {
        let cfg = twim::Config::default();
        let tx_buf = &mut *core::ptr::addr_of_mut!(I2C_TX_BUF);
        twim::Twim::new(twispi0, Irqs, i2c_sda, i2c_scl, cfg, tx_buf)
    };
    let i2c_bus = I2C_BUS.init(BlockingMutex::new(RefCell::new(i2c)));

    spawner.spawn(ble::beacon_task(sd, beacon_wd)).unwrap();
    spawner
        .spawn(sensor::sensor_task(I2cDevice::new(i2c_bus), sensor_wd))
        .unwrap();
    spawner
        .spawn(display::display_task(I2cDevice::new(i2c_bus), display_wd))
        .unwrap();
    spawner
        .spawn(button::input_task(Input::new(button, Pull::Up), input_wd))
        .unwrap();
    spawner
        .spawn(platform::supervisor_task(supervisor_wd))
        .unwrap();

    // LED is on P0.15 per promicro_diy variant; held on as a power indicator.
    let _led = Output::new(led, Level::High, OutputDrive::Standard);
    core::future::pending::<()>().await;
}
