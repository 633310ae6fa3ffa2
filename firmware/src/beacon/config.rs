//! Engine tunables and per-device provisioning.

use embassy_time::Duration;

/// Length of a compressed P-224 x-coordinate without its sign byte.
pub const KEY_LEN: usize = 28;
/// Length of a BLE device address.
pub const ADDR_LEN: usize = 6;
/// Length of a legacy advertisement payload.
pub const ADV_PAYLOAD_LEN: usize = 31;

/// Width of the bit-index field inside a candidate key. Messages longer than
/// `u32::MAX / 8` bytes would wrap the index.
pub const BIT_INDEX_FIELD_LEN: usize = 4;

/// How long one forged identity stays on air: 20 ms per primary advertising
/// channel, three channels.
pub const BEACON_DWELL: Duration = Duration::from_millis(20 * 3);

/// Advertising interval used while an identity is live, in 0.625 ms units.
/// 20 ms, so a single dwell window covers every primary channel.
pub const ADV_INTERVAL_UNITS: u32 = 32;

/// Number of dwell windows the pre-agreed location key stays on air per pass.
pub const LOCATION_DWELL_REPEATS: usize = 2;

/// Pause between two passes of the beacon task loop.
pub const BEACON_LOOP_INTERVAL: Duration = Duration::from_millis(3_000);

/// Dwell of one data iteration. Most bits reach the network within seconds
/// of each other, occasionally a little over five minutes apart.
pub const TX_ITER_DURATION: Duration = Duration::from_secs(6 * 60);

/// Dwell of one iteration while an operator message is pending.
pub const MESSAGE_ITER_DURATION: Duration = Duration::from_secs(60);

pub const SCAN_WINDOW: Duration = Duration::from_secs(1);
pub const SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on distinct advertisers remembered during one scan window.
/// The device-count channel saturates at 510 anyway.
pub const MAX_TRACKED_ADVERTISERS: usize = 511;

/// Attempts the key search makes before it gives up on a bit.
pub const MAX_KEY_SEARCH_ATTEMPTS: u32 = 256;

pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(60);

/// Health checks run three times per watchdog period, so at least two checks
/// land before the watchdog could fire.
pub const HEALTH_CHECK_INTERVAL: Duration =
    Duration::from_ticks(WATCHDOG_TIMEOUT.as_ticks() / 3);

/// Unconditional restart after this much uptime.
pub const UPTIME_CEILING: Duration = Duration::from_secs(20 * 60);

pub const STACK_HEADROOM_THRESHOLD: usize = 2 * 1024;
pub const HEAP_HEADROOM_THRESHOLD: usize = 2 * 1024;

/// Identity material burnt into a node at build time.
///
/// The receiving service holds the same values and regenerates every
/// candidate key from them, so they must match bit for bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Provisioning {
    /// Two leading key bytes that mark a candidate as one of ours.
    pub pubkey_magic: [u8; 2],
    /// Distinguishes several nodes reporting to the same receiver.
    pub modem_id: u32,
    /// Pre-agreed public key broadcast as a plain location beacon.
    pub location_key: [u8; KEY_LEN],
}
