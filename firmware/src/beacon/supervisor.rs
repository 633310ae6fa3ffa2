//! Health checks over every running unit and the restart policy.
//!
//! Each unit owns one watchdog slot and pets it from its own loop; a unit
//! that stops yielding resets the device through the watchdog. The
//! supervisor covers the slower failures the watchdog cannot see: shrinking
//! stack or heap headroom, and plain uptime.

use embassy_time::Duration;

use super::config::{HEAP_HEADROOM_THRESHOLD, STACK_HEADROOM_THRESHOLD, UPTIME_CEILING};

pub const UNIT_COUNT: usize = 5;

/// The concurrently scheduled units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host-test"), derive(defmt::Format))]
pub enum Unit {
    Beacon,
    Sensor,
    Display,
    Input,
    Supervisor,
}

impl Unit {
    pub const ALL: [Unit; UNIT_COUNT] = [
        Self::Beacon,
        Self::Sensor,
        Self::Display,
        Self::Input,
        Self::Supervisor,
    ];

    /// Index of the unit's watchdog slot.
    pub const fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host-test"), derive(defmt::Format))]
pub enum RestartReason {
    StackExhausted(Unit),
    HeapExhausted,
    UptimeCeiling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host-test"), derive(defmt::Format))]
pub struct TaskRecord {
    pub unit: Unit,
    /// Lowest stack headroom ever sampled, in bytes.
    pub min_stack_headroom: usize,
    pub watchdog_slot: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host-test"), derive(defmt::Format))]
pub enum Health {
    Ok { min_stack_headroom: usize, min_free_heap: usize },
    Restarting(RestartReason),
}

/// Memory probes and the reset line.
pub trait Platform {
    /// Lowest stack headroom the unit has ever had, in bytes.
    fn stack_headroom(&self, unit: Unit) -> usize;

    /// Lowest free heap since boot, in bytes.
    fn min_free_heap(&self) -> usize;

    /// Resets the device. On hardware this does not return.
    fn restart(&mut self, reason: RestartReason);
}

pub struct Supervisor<P> {
    platform: P,
    records: [TaskRecord; UNIT_COUNT],
    min_free_heap: usize,
    restart: Option<RestartReason>,
}

impl<P: Platform> Supervisor<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            records: Unit::ALL.map(|unit| TaskRecord {
                unit,
                min_stack_headroom: usize::MAX,
                watchdog_slot: unit.slot(),
            }),
            min_free_heap: usize::MAX,
            restart: None,
        }
    }

    #[cfg(test)]
    pub fn records(&self) -> &[TaskRecord; UNIT_COUNT] {
        &self.records
    }

    #[cfg(test)]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Samples every probe and restarts the device when any of them is under
    /// its threshold or the uptime ceiling has passed.
    ///
    /// Restart is requested at most once; later checks only report it.
    pub fn health_check(&mut self, uptime: Duration) -> Health {
        if let Some(reason) = self.restart {
            return Health::Restarting(reason);
        }

        for record in self.records.iter_mut() {
            let headroom = self.platform.stack_headroom(record.unit);
            record.min_stack_headroom = record.min_stack_headroom.min(headroom);
        }
        self.min_free_heap = self.min_free_heap.min(self.platform.min_free_heap());

        let min_stack_headroom = self
            .records
            .iter()
            .map(|r| r.min_stack_headroom)
            .min()
            .unwrap_or(usize::MAX);

        info!(
            "supervisor: uptime {}s, min stack {} B, min heap {} B",
            uptime.as_secs(),
            min_stack_headroom,
            self.min_free_heap
        );

        let Some(reason) = self.restart_reason(uptime) else {
            return Health::Ok {
                min_stack_headroom,
                min_free_heap: self.min_free_heap,
            };
        };

        error!("supervisor: restarting: {:?}", reason);
        self.restart = Some(reason);
        self.platform.restart(reason);
        Health::Restarting(reason)
    }

    fn restart_reason(&self, uptime: Duration) -> Option<RestartReason> {
        if let Some(record) = self
            .records
            .iter()
            .find(|r| r.min_stack_headroom < STACK_HEADROOM_THRESHOLD)
        {
            return Some(RestartReason::StackExhausted(record.unit));
        }
        if self.min_free_heap < HEAP_HEADROOM_THRESHOLD {
            return Some(RestartReason::HeapExhausted);
        }
        if uptime >= UPTIME_CEILING {
            return Some(RestartReason::UptimeCeiling);
        }
        None
    }
}
