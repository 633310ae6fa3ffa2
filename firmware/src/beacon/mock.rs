//! In-memory stand-ins for the engine's collaborators.

use core::cell::Cell;

use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;

use super::config::{Provisioning, ADDR_LEN, KEY_LEN};
use super::identity::DeviceIdentity;
use super::oracle::CurveOracle;
use super::radio::{Radio, RadioError};
use super::supervisor::{Platform, RestartReason, Unit, UNIT_COUNT};

pub const PROVISIONING: Provisioning = Provisioning {
    pubkey_magic: [0xBA, 0xBE],
    modem_id: 0x0042_1337,
    location_key: [
        0x3a, 0x17, 0xc0, 0x5e, 0x91, 0x02, 0x44, 0x8d, 0xe3, 0x6b, 0x20, 0x7f, 0x19, 0xa4,
        0x5c, 0x0e, 0xd2, 0x88, 0x31, 0x6f, 0xb9, 0x04, 0x72, 0xee, 0x13, 0x5a, 0xc8, 0x29,
    ],
};

pub struct RejectAll;

impl CurveOracle for RejectAll {
    fn accepts(&self, _candidate: &[u8; KEY_LEN]) -> bool {
        false
    }
}

/// Wraps an oracle and counts how often it was asked.
pub struct CountingOracle<O> {
    inner: O,
    calls: Cell<u32>,
}

impl<O: CurveOracle> CountingOracle<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl<O: CurveOracle> CurveOracle for CountingOracle<O> {
    fn accepts(&self, candidate: &[u8; KEY_LEN]) -> bool {
        self.calls.set(self.calls.get() + 1);
        self.inner.accepts(candidate)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioCall {
    Start,
    Stop,
    Configure(DeviceIdentity),
    Scan,
}

/// Records every call and panics on advertise/scan overlap.
#[derive(Default)]
pub struct MockRadio {
    calls: Vec<RadioCall>,
    configured: Vec<DeviceIdentity>,
    configure_attempts: usize,
    fail_configure: Vec<usize>,
    advertising: bool,
    scan_reports: Vec<[u8; ADDR_LEN]>,
    fail_scan: bool,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertisers heard by every later scan, duplicates included.
    pub fn with_scan_reports(mut self, reports: Vec<[u8; ADDR_LEN]>) -> Self {
        self.scan_reports = reports;
        self
    }

    pub fn fail_scans(&mut self, fail: bool) {
        self.fail_scan = fail;
    }

    /// Makes the given configure attempts (0-based) fail.
    pub fn fail_configure_on(&mut self, attempts: &[usize]) {
        self.fail_configure = attempts.to_vec();
    }

    pub fn configured(&self) -> &[DeviceIdentity] {
        &self.configured
    }

    pub fn calls(&self) -> &[RadioCall] {
        &self.calls
    }

    pub fn configure_attempts(&self) -> usize {
        self.configure_attempts
    }

    pub fn scans(&self) -> usize {
        self.calls.iter().filter(|c| **c == RadioCall::Scan).count()
    }
}

impl Radio for MockRadio {
    async fn configure_identity(&mut self, identity: &DeviceIdentity) -> Result<(), RadioError> {
        assert!(!self.advertising, "identity changed while advertising");
        let attempt = self.configure_attempts;
        self.configure_attempts += 1;
        if self.fail_configure.contains(&attempt) {
            return Err(RadioError::AddressRejected);
        }
        self.calls.push(RadioCall::Configure(*identity));
        self.configured.push(*identity);
        Ok(())
    }

    async fn start_advertising(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::Start);
        self.advertising = true;
        Ok(())
    }

    async fn stop_advertising(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::Stop);
        self.advertising = false;
        Ok(())
    }

    async fn scan<F>(&mut self, _window: Duration, mut on_report: F) -> Result<(), RadioError>
    where
        F: FnMut(&[u8; ADDR_LEN]),
    {
        assert!(!self.advertising, "scan started while advertising");
        self.calls.push(RadioCall::Scan);
        if self.fail_scan {
            return Err(RadioError::ScanStart);
        }
        for address in &self.scan_reports {
            on_report(address);
        }
        Ok(())
    }
}

/// Returns immediately and adds up what it was asked to wait.
#[derive(Default)]
pub struct MockDelay {
    total_ns: u64,
    calls: usize,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
        self.calls += 1;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.total_ns += u64::from(ms) * 1_000_000;
        self.calls += 1;
    }
}

/// Health probes driven by the test; restarts are recorded, not performed.
pub struct MockPlatform {
    pub stack_headroom: [usize; UNIT_COUNT],
    pub free_heap: usize,
    pub restarts: Vec<RestartReason>,
}

impl MockPlatform {
    pub fn healthy() -> Self {
        Self {
            stack_headroom: [16 * 1024; UNIT_COUNT],
            free_heap: 32 * 1024,
            restarts: Vec::new(),
        }
    }
}

impl Platform for MockPlatform {
    fn stack_headroom(&self, unit: Unit) -> usize {
        self.stack_headroom[unit.slot()]
    }

    fn min_free_heap(&self) -> usize {
        self.free_heap
    }

    fn restart(&mut self, reason: RestartReason) {
        self.restarts.push(reason);
    }
}
