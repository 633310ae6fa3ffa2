//! State shared between the beacon task and its collaborators.
//!
//! Every field has exactly one writer, named on the field. Readers take
//! copies; nothing hands out references into the shared state.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicI16, AtomicU16, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;

use super::channel::TxChannel;
use super::scheduler::TxSnapshot;
use super::transmit::TxReport;

/// `message` value while nothing is queued.
pub const NO_MESSAGE: i16 = -1;

/// Last successful environment reading.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(not(feature = "host-test"), derive(defmt::Format))]
pub struct SensorSample {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub pressure_hpa: f32,
    pub altitude_m: f32,
}

impl SensorSample {
    pub const fn new() -> Self {
        Self {
            temperature_c: 0.0,
            humidity_pct: 0.0,
            pressure_hpa: 0.0,
            altitude_m: 0.0,
        }
    }
}

impl Default for SensorSample {
    fn default() -> Self {
        Self::new()
    }
}

/// What the beacon is doing right now, for the display.
#[derive(Clone, Copy, Debug)]
pub struct BeaconStatus {
    pub channel: TxChannel,
    pub iteration: u32,
    pub snapshot: TxSnapshot,
    pub ends_at: Instant,
    pub totals: TxReport,
}

impl BeaconStatus {
    pub const fn new() -> Self {
        Self {
            channel: TxChannel::Temperature,
            iteration: 0,
            snapshot: TxSnapshot::new(),
            ends_at: Instant::from_ticks(0),
            totals: TxReport {
                sent: 0,
                search_failures: 0,
                radio_failures: 0,
            },
        }
    }

    /// Time left in the current iteration, zero once it is overdue.
    pub fn remaining(&self, now: Instant) -> embassy_time::Duration {
        self.ends_at
            .checked_duration_since(now)
            .unwrap_or(embassy_time::Duration::from_ticks(0))
    }
}

impl Default for BeaconStatus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SharedState {
    /// Sensor task.
    sensor_available: AtomicBool,
    /// Sensor task.
    sensor: Mutex<CriticalSectionRawMutex, Cell<SensorSample>>,
    /// Census.
    nearby_devices: AtomicU16,
    /// Census. Carries the count of the scan that just finished.
    census_completed: Signal<CriticalSectionRawMutex, u16>,
    /// Input task. [`NO_MESSAGE`] or a byte value.
    message: AtomicI16,
    /// Input task. Carries the newly queued value.
    message_queued: Signal<CriticalSectionRawMutex, u8>,
    /// Scheduler.
    status: Mutex<CriticalSectionRawMutex, Cell<BeaconStatus>>,
}

impl SharedState {
    pub const fn new() -> Self {
        Self {
            sensor_available: AtomicBool::new(false),
            sensor: Mutex::new(Cell::new(SensorSample::new())),
            nearby_devices: AtomicU16::new(0),
            census_completed: Signal::new(),
            message: AtomicI16::new(NO_MESSAGE),
            message_queued: Signal::new(),
            status: Mutex::new(Cell::new(BeaconStatus::new())),
        }
    }

    pub fn set_sensor_available(&self, available: bool) {
        self.sensor_available.store(available, Ordering::Relaxed);
    }

    pub fn sensor_available(&self) -> bool {
        self.sensor_available.load(Ordering::Relaxed)
    }

    pub fn publish_sample(&self, sample: SensorSample) {
        self.sensor.lock(|s| s.set(sample));
    }

    /// Never blocks and never triggers a fresh read.
    pub fn latest_sample(&self) -> SensorSample {
        self.sensor.lock(|s| s.get())
    }

    pub fn publish_nearby_devices(&self, count: u16) {
        self.nearby_devices.store(count, Ordering::Relaxed);
        self.census_completed.signal(count);
    }

    pub fn nearby_devices(&self) -> u16 {
        self.nearby_devices.load(Ordering::Relaxed)
    }

    /// Count of a census that finished since the last call.
    pub fn take_census_event(&self) -> Option<u16> {
        self.census_completed.try_take()
    }

    /// Queues the next message value: 0 when nothing is pending, otherwise
    /// the pending value plus one, wrapping 255 to 0.
    pub fn bump_message(&self) -> u8 {
        let next = match self.pending_message() {
            None => 0,
            Some(value) => value.wrapping_add(1),
        };
        self.message.store(i16::from(next), Ordering::Relaxed);
        self.message_queued.signal(next);
        next
    }

    pub fn pending_message(&self) -> Option<u8> {
        u8::try_from(self.message.load(Ordering::Relaxed)).ok()
    }

    /// Raw message value, [`NO_MESSAGE`] when none.
    pub fn message_value(&self) -> i16 {
        self.message.load(Ordering::Relaxed)
    }

    pub fn take_message_event(&self) -> Option<u8> {
        self.message_queued.try_take()
    }

    pub fn publish_status(&self, status: BeaconStatus) {
        self.status.lock(|s| s.set(status));
    }

    pub fn status(&self) -> BeaconStatus {
        self.status.lock(|s| s.get())
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
