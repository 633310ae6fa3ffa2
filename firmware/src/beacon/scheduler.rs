//! Iteration state machine over [`TxChannel`].
//!
//! An iteration freezes a [`TxSnapshot`] of the upstream state and keeps
//! beaconing the same channel from it until either its dwell runs out or an
//! event (census result, queued message) ends it early. A receiver that
//! collects bits over several passes therefore never mixes two readings.

use embassy_time::{Duration, Instant};

use super::channel::{
    quantize_device_count, quantize_humidity, quantize_pressure, quantize_temperature, TxChannel,
};
use super::config::{MESSAGE_ITER_DURATION, TX_ITER_DURATION};
use super::shared::{BeaconStatus, SensorSample, SharedState, NO_MESSAGE};
use super::transmit::TxReport;

/// Upstream state frozen at the start of an iteration, plus the payload
/// quantized from it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TxSnapshot {
    pub data: [u8; 2],
    pub data_len: usize,
    pub sensor_available: bool,
    pub sensor: SensorSample,
    pub nearby_devices: u16,
    /// [`NO_MESSAGE`] or a byte value.
    pub message: i16,
}

impl TxSnapshot {
    pub const fn new() -> Self {
        Self {
            data: [0; 2],
            data_len: 0,
            sensor_available: false,
            sensor: SensorSample::new(),
            nearby_devices: 0,
            message: NO_MESSAGE,
        }
    }

    pub fn capture(state: &SharedState) -> Self {
        Self {
            data: [0; 2],
            data_len: 0,
            sensor_available: state.sensor_available(),
            sensor: state.latest_sample(),
            nearby_devices: state.nearby_devices(),
            message: state.message_value(),
        }
    }

    pub fn pending_message(&self) -> Option<u8> {
        u8::try_from(self.message).ok()
    }

    /// Bytes to send for the iteration's channel. Empty for location.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.data_len]
    }

    fn quantize(&mut self, channel: TxChannel) {
        self.data_len = match channel {
            TxChannel::Temperature => {
                self.data[0] = quantize_temperature(self.sensor.temperature_c);
                1
            }
            TxChannel::Humidity => {
                self.data[0] = quantize_humidity(self.sensor.humidity_pct);
                1
            }
            TxChannel::Pressure => {
                self.data = quantize_pressure(self.sensor.pressure_hpa);
                2
            }
            TxChannel::Location => 0,
            TxChannel::DeviceCount => {
                self.data[0] = quantize_device_count(u32::from(self.nearby_devices));
                1
            }
            TxChannel::Message => match self.pending_message() {
                Some(value) => {
                    self.data[0] = value;
                    1
                }
                None => 0,
            },
        };
    }

    fn is_eligible(&self, channel: TxChannel) -> bool {
        if channel.needs_sensor() {
            return self.sensor_available;
        }
        match channel {
            TxChannel::Location => true,
            TxChannel::DeviceCount => self.nearby_devices > 0,
            TxChannel::Message => self.pending_message().is_some(),
            _ => false,
        }
    }
}

impl Default for TxSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host-test"), derive(defmt::Format))]
pub enum AdvanceReason {
    Boot,
    DwellElapsed,
    /// A census found devices while the current iteration believes there
    /// are none.
    CensusCompleted,
    MessageQueued,
}

/// Channel that follows `current` given the freshly captured `snapshot`.
///
/// A pending message collapses the cycle to Message/Location. Otherwise the
/// round-robin skips every channel the snapshot has nothing for. Location is
/// always eligible, so the walk ends within one lap.
pub fn next_channel(current: TxChannel, snapshot: &TxSnapshot) -> TxChannel {
    if snapshot.pending_message().is_some() {
        return match current {
            TxChannel::Message => TxChannel::Location,
            _ => TxChannel::Message,
        };
    }
    first_eligible(current.successor(), snapshot)
}

/// `start` itself when eligible, else the next eligible channel after it.
fn first_eligible(start: TxChannel, snapshot: &TxSnapshot) -> TxChannel {
    let mut channel = start;
    for _ in 0..TxChannel::ALL.len() {
        if snapshot.is_eligible(channel) {
            return channel;
        }
        channel = channel.successor();
    }
    TxChannel::Location
}

pub struct Scheduler {
    channel: TxChannel,
    iteration: u32,
    snapshot: TxSnapshot,
    started_at: Instant,
    dwell: Duration,
    started: bool,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            channel: TxChannel::Temperature,
            iteration: 0,
            snapshot: TxSnapshot::new(),
            started_at: Instant::from_ticks(0),
            dwell: TX_ITER_DURATION,
            started: false,
        }
    }

    pub fn channel(&self) -> TxChannel {
        self.channel
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn snapshot(&self) -> &TxSnapshot {
        &self.snapshot
    }

    pub fn ends_at(&self) -> Instant {
        self.started_at + self.dwell
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.ends_at()
            .checked_duration_since(now)
            .unwrap_or(Duration::from_ticks(0))
    }

    /// Decides whether the current iteration is over. Consumes pending
    /// census and message events.
    pub fn poll(&mut self, now: Instant, state: &SharedState) -> Option<AdvanceReason> {
        let census = state.take_census_event();
        let message = state.take_message_event();

        if !self.started {
            return Some(AdvanceReason::Boot);
        }
        if message.is_some() {
            return Some(AdvanceReason::MessageQueued);
        }
        if matches!(census, Some(count) if count > 0) && self.snapshot.nearby_devices == 0 {
            return Some(AdvanceReason::CensusCompleted);
        }
        if now >= self.ends_at() {
            return Some(AdvanceReason::DwellElapsed);
        }
        None
    }

    /// Starts a new iteration: freezes a fresh snapshot, picks the channel
    /// and quantizes its payload.
    pub fn advance(&mut self, now: Instant, state: &SharedState, reason: AdvanceReason) {
        let mut snapshot = TxSnapshot::capture(state);
        // A fresh operator value goes out straight away, even when the
        // running iteration is already a Message one.
        let message_first = !self.started || reason == AdvanceReason::MessageQueued;
        let channel = if message_first && snapshot.pending_message().is_some() {
            TxChannel::Message
        } else if self.started {
            next_channel(self.channel, &snapshot)
        } else {
            first_eligible(TxChannel::Temperature, &snapshot)
        };
        snapshot.quantize(channel);

        self.channel = channel;
        self.snapshot = snapshot;
        self.iteration = self.iteration.wrapping_add(1);
        self.started_at = now;
        self.started = true;
        self.dwell = if snapshot.pending_message().is_some() {
            MESSAGE_ITER_DURATION
        } else {
            TX_ITER_DURATION
        };

        info!(
            "sched: iteration {} -> {} ({:?}), payload {=[u8]:x}, dwell {}s",
            self.iteration,
            channel.label(),
            reason,
            self.snapshot.payload(),
            self.dwell.as_secs()
        );
    }

    pub fn status(&self, totals: TxReport) -> BeaconStatus {
        BeaconStatus {
            channel: self.channel,
            iteration: self.iteration,
            snapshot: self.snapshot,
            ends_at: self.ends_at(),
            totals,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor_state() -> SharedState {
        let state = SharedState::new();
        state.set_sensor_available(true);
        state.publish_sample(SensorSample {
            temperature_c: 20.0,
            humidity_pct: 50.0,
            pressure_hpa: 1013.25,
            altitude_m: 0.0,
        });
        state
    }

    /// Runs `iterations` dwell-elapsed advances and returns the channels.
    fn cycle(scheduler: &mut Scheduler, state: &SharedState, iterations: usize) -> Vec<TxChannel> {
        let mut now = Instant::from_secs(0);
        let mut channels = Vec::new();
        for _ in 0..iterations {
            let reason = scheduler.poll(now, state).expect("iteration should be over");
            scheduler.advance(now, state, reason);
            channels.push(scheduler.channel());
            now = scheduler.ends_at();
        }
        channels
    }

    #[test]
    fn test_sensor_cycle_skips_device_count_without_devices() {
        let state = sensor_state();
        let mut scheduler = Scheduler::new();
        let channels = cycle(&mut scheduler, &state, 9);
        assert_eq!(
            channels,
            [
                TxChannel::Temperature,
                TxChannel::Humidity,
                TxChannel::Pressure,
                TxChannel::Location,
                TxChannel::Temperature,
                TxChannel::Humidity,
                TxChannel::Pressure,
                TxChannel::Location,
                TxChannel::Temperature,
            ]
        );
    }

    #[test]
    fn test_full_cycle_with_devices_and_no_message() {
        let state = sensor_state();
        state.publish_nearby_devices(9);
        let mut scheduler = Scheduler::new();
        let channels = cycle(&mut scheduler, &state, 6);
        assert_eq!(
            channels,
            [
                TxChannel::Temperature,
                TxChannel::Humidity,
                TxChannel::Pressure,
                TxChannel::Location,
                TxChannel::DeviceCount,
                TxChannel::Temperature,
            ]
        );
    }

    #[test]
    fn test_no_sensor_leaves_location_only() {
        let state = SharedState::new();
        let mut scheduler = Scheduler::new();
        let channels = cycle(&mut scheduler, &state, 3);
        assert_eq!(channels, [TxChannel::Location; 3]);
    }

    #[test]
    fn test_queued_message_switches_immediately() {
        let state = sensor_state();
        let mut scheduler = Scheduler::new();
        let start = Instant::from_secs(0);
        let reason = scheduler.poll(start, &state).unwrap();
        scheduler.advance(start, &state, reason);
        let reason = scheduler.poll(scheduler.ends_at(), &state).unwrap();
        scheduler.advance(scheduler.ends_at(), &state, reason);
        assert_eq!(scheduler.channel(), TxChannel::Humidity);

        // Mid-iteration, well before the dwell runs out.
        let now = scheduler.ends_at() - Duration::from_secs(300);
        assert_eq!(scheduler.poll(now, &state), None);
        for _ in 0..8 {
            state.bump_message();
        }
        assert_eq!(state.pending_message(), Some(7));

        assert_eq!(scheduler.poll(now, &state), Some(AdvanceReason::MessageQueued));
        scheduler.advance(now, &state, AdvanceReason::MessageQueued);
        assert_eq!(scheduler.channel(), TxChannel::Message);
        assert_eq!(scheduler.snapshot().payload(), &[7]);
        assert_eq!(scheduler.remaining(now), MESSAGE_ITER_DURATION);

        let mut channels = Vec::new();
        let mut now = scheduler.ends_at();
        for _ in 0..4 {
            let reason = scheduler.poll(now, &state).unwrap();
            assert_eq!(reason, AdvanceReason::DwellElapsed);
            scheduler.advance(now, &state, reason);
            channels.push(scheduler.channel());
            now = scheduler.ends_at();
        }
        assert_eq!(
            channels,
            [
                TxChannel::Location,
                TxChannel::Message,
                TxChannel::Location,
                TxChannel::Message,
            ]
        );
    }

    #[test]
    fn test_snapshot_is_frozen_for_the_iteration() {
        let state = sensor_state();
        let mut scheduler = Scheduler::new();
        let now = Instant::from_secs(0);
        scheduler.advance(now, &state, AdvanceReason::Boot);
        let frozen = *scheduler.snapshot();

        state.publish_sample(SensorSample {
            temperature_c: -30.0,
            ..state.latest_sample()
        });
        assert_eq!(scheduler.poll(now + Duration::from_secs(10), &state), None);
        assert_eq!(*scheduler.snapshot(), frozen);
        assert_eq!(scheduler.snapshot().payload(), &[quantize_temperature(20.0)]);
    }

    #[test]
    fn test_census_with_devices_ends_an_empty_iteration() {
        let state = sensor_state();
        let mut scheduler = Scheduler::new();
        let now = Instant::from_secs(0);
        scheduler.advance(now, &state, AdvanceReason::Boot);

        state.publish_nearby_devices(0);
        assert_eq!(scheduler.poll(now, &state), None);

        state.publish_nearby_devices(4);
        assert_eq!(scheduler.poll(now, &state), Some(AdvanceReason::CensusCompleted));
        scheduler.advance(now, &state, AdvanceReason::CensusCompleted);
        assert_eq!(scheduler.snapshot().nearby_devices, 4);

        // Already counting devices: a later census does not cut the dwell short.
        state.publish_nearby_devices(6);
        assert_eq!(scheduler.poll(now, &state), None);
    }

    #[test]
    fn test_payload_per_channel() {
        let state = sensor_state();
        state.publish_nearby_devices(37);
        let mut scheduler = Scheduler::new();
        let mut now = Instant::from_secs(0);
        let mut payloads = Vec::new();
        for _ in 0..5 {
            let reason = scheduler.poll(now, &state).unwrap();
            scheduler.advance(now, &state, reason);
            payloads.push((scheduler.channel(), scheduler.snapshot().payload().to_vec()));
            now = scheduler.ends_at();
        }
        assert_eq!(payloads[0], (TxChannel::Temperature, vec![180]));
        assert_eq!(payloads[1].1, vec![quantize_humidity(50.0)]);
        assert_eq!(payloads[2].1, quantize_pressure(1013.25).to_vec());
        assert_eq!(payloads[3], (TxChannel::Location, vec![]));
        assert_eq!(payloads[4], (TxChannel::DeviceCount, vec![18]));
    }

    #[test]
    fn test_boot_with_pending_message_starts_on_message() {
        let state = sensor_state();
        state.bump_message();
        let mut scheduler = Scheduler::new();
        let now = Instant::from_secs(0);
        assert_eq!(scheduler.poll(now, &state), Some(AdvanceReason::Boot));
        scheduler.advance(now, &state, AdvanceReason::Boot);
        assert_eq!(scheduler.channel(), TxChannel::Message);
        assert_eq!(scheduler.snapshot().payload(), &[0]);
    }

    #[test]
    fn test_requeue_during_message_sends_new_value_at_once() {
        let state = sensor_state();
        state.bump_message();
        let mut scheduler = Scheduler::new();
        let start = Instant::from_secs(0);
        let reason = scheduler.poll(start, &state).unwrap();
        scheduler.advance(start, &state, reason);
        assert_eq!(scheduler.channel(), TxChannel::Message);

        let now = start + Duration::from_secs(5);
        state.bump_message();
        assert_eq!(scheduler.poll(now, &state), Some(AdvanceReason::MessageQueued));
        scheduler.advance(now, &state, AdvanceReason::MessageQueued);
        assert_eq!(scheduler.channel(), TxChannel::Message);
        assert_eq!(scheduler.snapshot().payload(), &[1]);
        assert_eq!(scheduler.remaining(now), MESSAGE_ITER_DURATION);

        // Held button: every bump stays on Message with the latest value.
        for expected in 2..5u8 {
            state.bump_message();
            let reason = scheduler.poll(now, &state).unwrap();
            scheduler.advance(now, &state, reason);
            assert_eq!(scheduler.channel(), TxChannel::Message);
            assert_eq!(scheduler.snapshot().payload(), &[expected]);
        }

        // The dwell running out still alternates to Location.
        let end = scheduler.ends_at();
        assert_eq!(scheduler.poll(end, &state), Some(AdvanceReason::DwellElapsed));
        scheduler.advance(end, &state, AdvanceReason::DwellElapsed);
        assert_eq!(scheduler.channel(), TxChannel::Location);
    }

    #[test]
    fn test_requeue_during_location_goes_back_to_message() {
        let state = sensor_state();
        state.bump_message();
        let mut scheduler = Scheduler::new();
        let start = Instant::from_secs(0);
        scheduler.advance(start, &state, AdvanceReason::Boot);
        let now = scheduler.ends_at();
        scheduler.advance(now, &state, AdvanceReason::DwellElapsed);
        assert_eq!(scheduler.channel(), TxChannel::Location);

        state.bump_message();
        assert_eq!(scheduler.poll(now, &state), Some(AdvanceReason::MessageQueued));
        scheduler.advance(now, &state, AdvanceReason::MessageQueued);
        assert_eq!(scheduler.channel(), TxChannel::Message);
        assert_eq!(scheduler.snapshot().payload(), &[1]);
    }

    #[test]
    fn test_iteration_numbers_increase() {
        let state = SharedState::new();
        let mut scheduler = Scheduler::new();
        cycle(&mut scheduler, &state, 4);
        assert_eq!(scheduler.iteration(), 4);
        assert_eq!(scheduler.status(TxReport::default()).iteration, 4);
    }
}
