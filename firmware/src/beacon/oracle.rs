//! P-224 point acceptance test for candidate keys.
//!
//! A candidate is the x-coordinate of a compressed point. It is accepted when
//! it decompresses (x is a field element and x³ - 3x + b is a square) and the
//! resulting uncompressed point passes the on-curve check.

use p224::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p224::{AffinePoint, EncodedPoint};

use super::config::KEY_LEN;

/// SEC1 tag for a compressed point with even y.
const SEC1_COMPRESSED_EVEN_Y: u8 = 0x02;

/// Acceptance predicate driving the key search.
pub trait CurveOracle {
    fn accepts(&self, candidate: &[u8; KEY_LEN]) -> bool;
}

impl<T: CurveOracle + ?Sized> CurveOracle for &T {
    fn accepts(&self, candidate: &[u8; KEY_LEN]) -> bool {
        (**self).accepts(candidate)
    }
}

/// The real oracle, backed by `p224`.
#[derive(Clone, Copy, Default)]
pub struct P224Oracle;

impl CurveOracle for P224Oracle {
    fn accepts(&self, candidate: &[u8; KEY_LEN]) -> bool {
        is_valid_point(candidate)
    }
}

/// Returns true when `candidate` is the x-coordinate of a point on P-224.
pub fn is_valid_point(candidate: &[u8; KEY_LEN]) -> bool {
    let mut compressed = [0u8; KEY_LEN + 1];
    compressed[0] = SEC1_COMPRESSED_EVEN_Y;
    compressed[1..].copy_from_slice(candidate);

    let Ok(encoded) = EncodedPoint::from_bytes(compressed) else {
        return false;
    };
    let Some(point) = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded)) else {
        return false;
    };

    // Round-trip through the uncompressed form, which re-checks y² = x³ + ax + b.
    let uncompressed = point.to_encoded_point(false);
    bool::from(AffinePoint::from_encoded_point(&uncompressed).is_some())
}
