//! One beacon loop pass: census, scheduling, status, transmission.

use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;

use super::census::Census;
use super::channel::TxChannel;
use super::config::Provisioning;
use super::oracle::{CurveOracle, P224Oracle};
use super::radio::Radio;
use super::scheduler::Scheduler;
use super::shared::SharedState;
use super::transmit::{Transmitter, TxReport};

/// Owns the radio exclusively. Census and transmission take turns on it
/// inside [`step`](Self::step), so they can never overlap.
pub struct BeaconEngine<R, D, O = P224Oracle> {
    tx: Transmitter<R, D, O>,
    scheduler: Scheduler,
    census: Census,
}

impl<R: Radio, D: DelayNs> BeaconEngine<R, D, P224Oracle> {
    pub fn new(radio: R, delay: D, provisioning: &Provisioning) -> Self {
        Self::with_parts(Transmitter::new(radio, delay, provisioning), Census::new())
    }
}

impl<R: Radio, D: DelayNs, O: CurveOracle> BeaconEngine<R, D, O> {
    pub fn with_parts(tx: Transmitter<R, D, O>, census: Census) -> Self {
        Self {
            tx,
            scheduler: Scheduler::new(),
            census,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn radio_mut(&mut self) -> &mut R {
        self.tx.radio_mut()
    }

    pub async fn step(&mut self, now: Instant, state: &SharedState) -> TxReport {
        if self.census.is_due(now) {
            self.census.refresh(self.tx.radio_mut(), now, state).await;
        }

        if let Some(reason) = self.scheduler.poll(now, state) {
            self.scheduler.advance(now, state, reason);
        }
        state.publish_status(self.scheduler.status(self.tx.totals()));

        let channel = self.scheduler.channel();
        let report = match channel {
            TxChannel::Location => self.tx.send_location_blocking().await,
            _ => {
                let snapshot = *self.scheduler.snapshot();
                self.tx
                    .send_bytes_blocking(snapshot.payload(), channel.message_id())
                    .await
            }
        };

        debug!(
            "engine: {} pass: {} sent, {} search failures, {} radio failures",
            channel.label(),
            report.sent,
            report.search_failures,
            report.radio_failures
        );
        report
    }
}
