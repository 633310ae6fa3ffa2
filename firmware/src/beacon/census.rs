//! Counts distinct advertisers nearby.
//!
//! The census borrows the same radio the transmitter uses and only runs
//! between transmission passes, so scanning and advertising never overlap.

use alloc::collections::BTreeSet;

use embassy_time::{Duration, Instant};

use super::config::{ADDR_LEN, MAX_TRACKED_ADVERTISERS, SCAN_INTERVAL, SCAN_WINDOW};
use super::radio::Radio;
use super::shared::SharedState;

/// Scans for `window` and returns the number of distinct advertisers heard.
/// A scan that fails to start counts as zero.
pub async fn run_scan_window<R: Radio>(radio: &mut R, window: Duration) -> u16 {
    let mut seen: BTreeSet<[u8; ADDR_LEN]> = BTreeSet::new();
    let result = radio
        .scan(window, |address| {
            if seen.len() < MAX_TRACKED_ADVERTISERS {
                seen.insert(*address);
            }
        })
        .await;

    match result {
        Ok(()) => seen.len() as u16,
        Err(e) => {
            warn!("census: scan failed: {:?}", e);
            0
        }
    }
}

pub struct Census {
    window: Duration,
    interval: Duration,
    last_scan: Option<Instant>,
}

impl Census {
    pub const fn new() -> Self {
        Self::with_cadence(SCAN_WINDOW, SCAN_INTERVAL)
    }

    pub const fn with_cadence(window: Duration, interval: Duration) -> Self {
        Self {
            window,
            interval,
            last_scan: None,
        }
    }

    /// Due at boot, then once per interval.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_scan {
            None => true,
            Some(at) => now >= at + self.interval,
        }
    }

    /// Runs one scan window and publishes the result.
    pub async fn refresh<R: Radio>(&mut self, radio: &mut R, now: Instant, state: &SharedState) -> u16 {
        let count = run_scan_window(radio, self.window).await;
        self.last_scan = Some(now);
        state.publish_nearby_devices(count);
        info!("census: {} nearby devices", count);
        count
    }
}

impl Default for Census {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;
    use crate::beacon::mock::MockRadio;

    fn address(n: u16) -> [u8; ADDR_LEN] {
        let [hi, lo] = n.to_be_bytes();
        [0xC0, 0x00, 0x00, 0x00, hi, lo]
    }

    #[test]
    fn test_duplicate_reports_count_once() {
        let mut radio = MockRadio::new().with_scan_reports(vec![
            address(1),
            address(2),
            address(1),
            address(3),
            address(2),
        ]);
        assert_eq!(block_on(run_scan_window(&mut radio, SCAN_WINDOW)), 3);
    }

    #[test]
    fn test_failed_scan_counts_zero() {
        let mut radio = MockRadio::new().with_scan_reports(vec![address(1)]);
        radio.fail_scans(true);
        assert_eq!(block_on(run_scan_window(&mut radio, SCAN_WINDOW)), 0);
    }

    #[test]
    fn test_tracking_is_capped() {
        let reports = (0..600).map(address).collect();
        let mut radio = MockRadio::new().with_scan_reports(reports);
        assert_eq!(
            block_on(run_scan_window(&mut radio, SCAN_WINDOW)),
            MAX_TRACKED_ADVERTISERS as u16
        );
    }

    #[test]
    fn test_cadence() {
        let census = Census::new();
        assert!(census.is_due(Instant::from_secs(0)));

        let mut census = Census::new();
        let mut radio = MockRadio::new();
        let state = SharedState::new();
        block_on(census.refresh(&mut radio, Instant::from_secs(5), &state));
        assert!(!census.is_due(Instant::from_secs(5)));
        assert!(!census.is_due(Instant::from_secs(64)));
        assert!(census.is_due(Instant::from_secs(65)));
    }

    #[test]
    fn test_refresh_publishes_count() {
        let mut census = Census::new();
        let mut radio = MockRadio::new().with_scan_reports(vec![address(7), address(8)]);
        let state = SharedState::new();

        assert_eq!(block_on(census.refresh(&mut radio, Instant::from_secs(0), &state)), 2);
        assert_eq!(state.nearby_devices(), 2);
        assert_eq!(state.take_census_event(), Some(2));
        assert_eq!(radio.scans(), 1);
    }
}
