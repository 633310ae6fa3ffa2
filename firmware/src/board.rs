use embassy_nrf::{peripherals, Peri};

pub struct Board {
    pub led: Peri<'static, peripherals::P0_15>,
    pub button: Peri<'static, peripherals::P1_00>,
    pub i2c_sda: Peri<'static, peripherals::P1_04>,
    pub i2c_scl: Peri<'static, peripherals::P0_11>,
    pub twispi0: Peri<'static, peripherals::TWISPI0>,
    pub wdt: Peri<'static, peripherals::WDT>,
}

impl Board {
    pub fn new(p: embassy_nrf::Peripherals) -> Self {
        Self {
            led: p.P0_15,
            button: p.P1_00,
            i2c_sda: p.P1_04,
            i2c_scl: p.P0_11,
            twispi0: p.TWISPI0,
            wdt: p.WDT,
        }
    }
}
