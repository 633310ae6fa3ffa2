//! Rejection sampler that turns (bit index, message id, bit) into a key.
//!
//! Candidate layout, shared with the receiving service:
//!
//! ```text
//! [0..2)   magic           provisioned
//! [2..6)   bit index       u32 BE
//! [6..10)  message id      u32 BE
//! [10..14) modem id        u32 BE, provisioned
//! [14..18) attempt counter u32 BE
//! [18..27) zero
//! [27]     payload bit
//! ```
//!
//! The receiver walks the attempt counter from zero and keeps the first
//! accepted candidate, so the search has to do the same.

use super::config::{Provisioning, BIT_INDEX_FIELD_LEN, KEY_LEN, MAX_KEY_SEARCH_ATTEMPTS};
use super::oracle::{CurveOracle, P224Oracle};

const MAGIC_OFFSET: usize = 0;
const INDEX_OFFSET: usize = 2;
const MESSAGE_ID_OFFSET: usize = INDEX_OFFSET + BIT_INDEX_FIELD_LEN;
const MODEM_ID_OFFSET: usize = MESSAGE_ID_OFFSET + 4;
const ATTEMPT_OFFSET: usize = MODEM_ID_OFFSET + 4;
const BIT_OFFSET: usize = KEY_LEN - 1;

/// A 28-byte key that the oracle accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CandidateKey([u8; KEY_LEN]);

impl CandidateKey {
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn index(&self) -> u32 {
        read_u32(&self.0, INDEX_OFFSET)
    }

    pub fn message_id(&self) -> u32 {
        read_u32(&self.0, MESSAGE_ID_OFFSET)
    }

    pub fn attempt(&self) -> u32 {
        read_u32(&self.0, ATTEMPT_OFFSET)
    }

    pub fn bit(&self) -> bool {
        self.0[BIT_OFFSET] != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(feature = "host-test"), derive(defmt::Format))]
pub enum KeySearchError {
    /// No accepted candidate within the attempt budget.
    Exhausted { attempts: u32 },
}

pub struct KeySearch<O = P224Oracle> {
    oracle: O,
    magic: [u8; 2],
    modem_id: u32,
    max_attempts: u32,
    scratch: [u8; KEY_LEN],
}

impl KeySearch<P224Oracle> {
    pub fn new(provisioning: &Provisioning) -> Self {
        Self::with_oracle(P224Oracle, provisioning)
    }
}

impl<O: CurveOracle> KeySearch<O> {
    pub fn with_oracle(oracle: O, provisioning: &Provisioning) -> Self {
        Self {
            oracle,
            magic: provisioning.pubkey_magic,
            modem_id: provisioning.modem_id,
            max_attempts: MAX_KEY_SEARCH_ATTEMPTS,
            scratch: [0u8; KEY_LEN],
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Finds the first accepted candidate carrying `bit` at `index` of
    /// message `message_id`.
    pub fn find_valid_key(
        &mut self,
        index: u32,
        message_id: u32,
        bit: bool,
    ) -> Result<CandidateKey, KeySearchError> {
        self.scratch = [0u8; KEY_LEN];
        self.scratch[MAGIC_OFFSET..MAGIC_OFFSET + 2].copy_from_slice(&self.magic);
        write_u32(&mut self.scratch, INDEX_OFFSET, index);
        write_u32(&mut self.scratch, MESSAGE_ID_OFFSET, message_id);
        write_u32(&mut self.scratch, MODEM_ID_OFFSET, self.modem_id);
        self.scratch[BIT_OFFSET] = u8::from(bit);

        for attempt in 0..self.max_attempts {
            write_u32(&mut self.scratch, ATTEMPT_OFFSET, attempt);
            if self.oracle.accepts(&self.scratch) {
                return Ok(CandidateKey(self.scratch));
            }
        }

        Err(KeySearchError::Exhausted {
            attempts: self.max_attempts,
        })
    }
}

fn write_u32(buf: &mut [u8; KEY_LEN], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

fn read_u32(buf: &[u8; KEY_LEN], offset: usize) -> u32 {
    let mut be = [0u8; 4];
    be.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_be_bytes(be)
}
