//! Splits a 28-byte key across a BLE address and an offline-finding payload.
//!
//! The address carries key bytes 0..6 (top two bits forced to the random
//! static pattern), the payload carries bytes 6..28 and the two bits the
//! address had to overwrite. A receiver reassembles the key from both fields
//! of one advertisement.

use sha2::{Digest, Sha256};

use super::config::{ADDR_LEN, ADV_PAYLOAD_LEN, KEY_LEN};

/// Top two address bits of a random static address.
const RANDOM_STATIC_MASK: u8 = 0b1100_0000;

const PAYLOAD_KEY_OFFSET: usize = 7;
const PAYLOAD_KEY_LEN: usize = KEY_LEN - ADDR_LEN;
const PAYLOAD_TOP_BITS_OFFSET: usize = PAYLOAD_KEY_OFFSET + PAYLOAD_KEY_LEN;

/// Advertisement frame with an all-zero key.
const PAYLOAD_TEMPLATE: [u8; ADV_PAYLOAD_LEN] = {
    let mut payload = [0u8; ADV_PAYLOAD_LEN];
    payload[0] = 0x1e; // Length (30)
    payload[1] = 0xff; // Manufacturer Specific Data
    payload[2] = 0x4c; // Apple Company ID (little-endian)
    payload[3] = 0x00;
    payload[4] = 0x12; // Offline Finding type
    payload[5] = 0x19; // Payload length (25 bytes)
    payload[6] = 0x00; // Status
    // [7..29) key bytes 6..28, [29] top bits of key byte 0, [30] hint
    payload
};

/// The radio-facing form of a key.
///
/// `address` is most-significant byte first; back-ends that take a
/// little-endian address reverse it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub address: [u8; ADDR_LEN],
    pub payload: [u8; ADV_PAYLOAD_LEN],
}

impl DeviceIdentity {
    pub const fn new() -> Self {
        Self {
            address: [0u8; ADDR_LEN],
            payload: PAYLOAD_TEMPLATE,
        }
    }

    /// Rewrites the key-carrying bytes in place.
    pub fn encode(&mut self, key: &[u8; KEY_LEN]) {
        self.address.copy_from_slice(&key[..ADDR_LEN]);
        self.address[0] |= RANDOM_STATIC_MASK;

        self.payload[PAYLOAD_KEY_OFFSET..PAYLOAD_TOP_BITS_OFFSET].copy_from_slice(&key[ADDR_LEN..]);
        self.payload[PAYLOAD_TOP_BITS_OFFSET] = key[0] >> 6;
    }

    /// Inverse of [`encode`](Self::encode), as a receiver performs it.
    pub fn reconstruct_key(&self) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        key[..ADDR_LEN].copy_from_slice(&self.address);
        key[0] = (self.address[0] & !RANDOM_STATIC_MASK) | (self.payload[PAYLOAD_TOP_BITS_OFFSET] << 6);
        key[ADDR_LEN..].copy_from_slice(&self.payload[PAYLOAD_KEY_OFFSET..PAYLOAD_TOP_BITS_OFFSET]);
        key
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::new()
    }
}

pub fn derive_identity(key: &[u8; KEY_LEN]) -> DeviceIdentity {
    let mut identity = DeviceIdentity::new();
    identity.encode(key);
    identity
}

/// SHA-256 of the key: the id receivers use to look up reports.
pub fn advertisement_hash(key: &[u8; KEY_LEN]) -> [u8; 32] {
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&Sha256::digest(key));
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::key::KeySearch;
    use crate::beacon::mock::PROVISIONING;

    #[test]
    fn test_frame_header_and_trailer() {
        let identity = derive_identity(&[0xAA; KEY_LEN]);
        assert_eq!(&identity.payload[..7], &[0x1e, 0xff, 0x4c, 0x00, 0x12, 0x19, 0x00]);
        assert_eq!(identity.payload[30], 0x00);
    }

    #[test]
    fn test_address_is_random_static() {
        let identity = derive_identity(&[0x00; KEY_LEN]);
        assert_eq!(identity.address[0] & 0xC0, 0xC0);
        assert_eq!(&identity.address[1..], &[0u8; 5]);
    }

    #[test]
    fn test_key_split() {
        let mut key = [0u8; KEY_LEN];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        key[0] = 0b1001_0110;
        let identity = derive_identity(&key);

        assert_eq!(identity.address, [0b1101_0110, 1, 2, 3, 4, 5]);
        assert_eq!(&identity.payload[7..29], &key[6..28]);
        assert_eq!(identity.payload[29], 0b10);
    }

    #[test]
    fn test_searched_keys_reconstruct_exactly() {
        let mut search = KeySearch::new(&PROVISIONING);
        for (index, message_id, bit) in [(0, 0, false), (7, 2, true), (15, 5, true), (300, 4, false)] {
            let key = search.find_valid_key(index, message_id, bit).unwrap();
            let identity = derive_identity(key.as_bytes());
            assert_eq!(&identity.reconstruct_key(), key.as_bytes());
        }
    }

    #[test]
    fn test_every_top_bit_pattern_survives() {
        for top in 0u8..4 {
            let mut key = [0x3Cu8; KEY_LEN];
            key[0] = (top << 6) | 0x15;
            assert_eq!(derive_identity(&key).reconstruct_key(), key);
        }
    }

    #[test]
    fn test_encode_overwrites_previous_identity() {
        let mut identity = derive_identity(&[0xFF; KEY_LEN]);
        identity.encode(&[0x00; KEY_LEN]);
        assert_eq!(identity, derive_identity(&[0x00; KEY_LEN]));
    }

    #[test]
    fn test_advertisement_hash_matches_sha256() {
        let key = [0u8; KEY_LEN];
        let hash = advertisement_hash(&key);
        assert_eq!(&hash[..], &Sha256::digest(key)[..]);
        assert_ne!(hash, advertisement_hash(&[1u8; KEY_LEN]));
    }
}
