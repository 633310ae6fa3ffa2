//! Logical data sources multiplexed onto the beacon, and their wire formats.
//!
//! Every quantizer clamps first and then scales, so out-of-range readings
//! saturate at the boundary value instead of wrapping.

use libm::roundf;

const TEMPERATURE_MIN_C: f32 = -40.0;
const TEMPERATURE_MAX_C: f32 = 45.0;
const TEMPERATURE_STEPS_PER_C: f32 = 3.0;

const HUMIDITY_MAX_PCT: f32 = 100.0;
const HUMIDITY_STEPS_PER_PCT: f32 = 2.55;

const PRESSURE_MIN_HPA: f32 = 100.0;
const PRESSURE_MAX_HPA: f32 = 1200.0;

const DEVICE_COUNT_MAX: u32 = 510;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host-test"), derive(defmt::Format))]
pub enum TxChannel {
    Temperature = 0,
    Humidity = 1,
    Pressure = 2,
    Location = 3,
    DeviceCount = 4,
    Message = 5,
}

impl TxChannel {
    pub const ALL: [TxChannel; 6] = [
        Self::Temperature,
        Self::Humidity,
        Self::Pressure,
        Self::Location,
        Self::DeviceCount,
        Self::Message,
    ];

    /// Message id carried in every key of this channel.
    pub fn message_id(self) -> u32 {
        self as u32
    }

    /// Successor in the plain round-robin, before any skip rule applies.
    pub fn successor(self) -> Self {
        Self::ALL[(self as usize + 1) % Self::ALL.len()]
    }

    pub fn needs_sensor(self) -> bool {
        matches!(self, Self::Temperature | Self::Humidity | Self::Pressure)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Temperature => "temp",
            Self::Humidity => "humid",
            Self::Pressure => "press",
            Self::Location => "location",
            Self::DeviceCount => "btdev",
            Self::Message => "message",
        }
    }
}

/// [-40, 45] °C in thirds of a degree.
pub fn quantize_temperature(celsius: f32) -> u8 {
    let c = clamp(celsius, TEMPERATURE_MIN_C, TEMPERATURE_MAX_C);
    roundf((c - TEMPERATURE_MIN_C) * TEMPERATURE_STEPS_PER_C) as u8
}

/// [0, 100] %RH in steps of 1/2.55 %.
pub fn quantize_humidity(percent: f32) -> u8 {
    let h = clamp(percent, 0.0, HUMIDITY_MAX_PCT);
    roundf(h * HUMIDITY_STEPS_PER_PCT) as u8
}

/// [100, 1200] hPa spread over 16 bits, big-endian.
pub fn quantize_pressure(hpa: f32) -> [u8; 2] {
    let p = clamp(hpa, PRESSURE_MIN_HPA, PRESSURE_MAX_HPA);
    let scale = u16::MAX as f32 / (PRESSURE_MAX_HPA - PRESSURE_MIN_HPA);
    let steps = roundf((p - PRESSURE_MIN_HPA) * scale);
    (steps.min(u16::MAX as f32) as u16).to_be_bytes()
}

/// [0, 510] devices at a resolution of two.
pub fn quantize_device_count(count: u32) -> u8 {
    (count.min(DEVICE_COUNT_MAX) / 2) as u8
}

/// NaN counts as the lower bound.
fn clamp(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}
