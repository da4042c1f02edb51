//! Shared scalar helpers for the quantization kernels

use crate::{Error, Result};

/// Guard added before `log2` so a zero magnitude stays finite
pub(crate) const LOG_EPS: f32 = 1e-12;

/// Guard added to `max - min` so constant tensors do not divide by zero
pub(crate) const RANGE_EPS: f32 = 1e-7;

/// Widest grid the kernels build; wider widths have no `f32` meaning
pub(crate) const MAX_BITS: u32 = 32;

/// Reject bit widths outside `1..=MAX_BITS`
pub(crate) fn check_bits(bits: u32) -> Result<()> {
    if !(1..=MAX_BITS).contains(&bits) {
        return Err(Error::InvalidBits(bits));
    }
    Ok(())
}

/// Reject overflow rates outside [0, 1) (NaN included)
pub(crate) fn check_overflow_rate(overflow_rate: f32) -> Result<()> {
    if !(0.0..1.0).contains(&overflow_rate) {
        return Err(Error::InvalidOverflowRate(overflow_rate));
    }
    Ok(())
}

/// `floor(x + 0.5)`: ties round toward +inf on both sides of zero
#[inline]
pub(crate) fn round_half_up(x: f32) -> f32 {
    (x + 0.5).floor()
}
