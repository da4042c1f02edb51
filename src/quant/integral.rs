//! Integral-part estimation for fixed-point formats
//!
//! Picks the number of integer bits a fixed-point format needs so that all
//! but the `overflow_rate` fraction of largest-magnitude elements fit:
//!
//! ```text
//! v  = |x| sorted descending, element at rank floor(overflow_rate * N)
//! ip = ceil(log2(v + 1e-12))
//! ```
//!
//! Calibrated quantizers turn this into a scale factor `sf = bits - 1 - ip`.

use super::ops::{check_overflow_rate, LOG_EPS};
use crate::{Error, Result, Tensor};

/// Number of integer bits needed to cover `input` with the given overflow tolerance
///
/// `overflow_rate = 0` selects the true maximum magnitude. Larger rates pick a
/// smaller representative magnitude, so the result never increases.
///
/// # Errors
/// * `InvalidOverflowRate` if the rate is outside [0, 1)
/// * `DegenerateRange` for an empty tensor
/// * `NonFinite` if the representative magnitude is NaN or infinite
///
/// An all-zero tensor is not an error: it yields `ceil(log2(1e-12)) = -39`.
pub fn compute_integral_part(input: &Tensor, overflow_rate: f32) -> Result<i32> {
    let magnitudes = input.data().iter().map(|x| x.abs()).collect();
    integral_part_of(magnitudes, overflow_rate)
}

/// Same as [`compute_integral_part`] over a flat list of magnitudes
pub(crate) fn integral_part_of(mut magnitudes: Vec<f32>, overflow_rate: f32) -> Result<i32> {
    check_overflow_rate(overflow_rate)?;
    if magnitudes.is_empty() {
        return Err(Error::DegenerateRange(
            "cannot estimate the integral part of an empty tensor".to_string(),
        ));
    }

    let split_idx = split_index(magnitudes.len(), overflow_rate);
    let (_, v, _) = magnitudes.select_nth_unstable_by(split_idx, |a, b| b.total_cmp(a));
    let v = *v;

    if !v.is_finite() {
        return Err(Error::NonFinite(format!(
            "representative magnitude {v} at rank {split_idx}"
        )));
    }

    Ok((v + LOG_EPS).log2().ceil() as i32)
}

fn split_index(len: usize, overflow_rate: f32) -> usize {
    // f32 product: 0.01 * 100 must land on rank 1, not 0.99999.. -> 0
    let idx = (overflow_rate * len as f32).floor() as usize;
    idx.min(len - 1)
}
