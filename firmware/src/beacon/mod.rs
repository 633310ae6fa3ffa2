//! Covert offline-finding beacon engine.
//!
//! Application bytes are sent one bit per forged Find My identity. Each bit
//! becomes a 28-byte candidate public key that is re-rolled until it
//! decompresses to a valid P-224 point, then split across the BLE random
//! address and the manufacturer payload of a single advertisement.
//!
//! Nothing in here touches a peripheral. The radio, the dwell delay and the
//! platform health probes are traits implemented by the firmware, which keeps
//! the whole engine testable on the host (see `tools/beacon_tests`).

#[macro_use]
mod fmt;

pub mod census;
pub mod channel;
pub mod config;
pub mod engine;
pub mod identity;
pub mod key;
pub mod oracle;
pub mod radio;
pub mod scheduler;
pub mod shared;
pub mod supervisor;
pub mod transmit;

#[cfg(test)]
mod mock;
