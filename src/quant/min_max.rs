//! Min-max (affine) quantization
//!
//! Maps the exact observed range `[min, max]` onto `R = 2^(bits-1) - 1`
//! uniform steps and back:
//!
//! ```text
//! q = floor((x - min) / (max - min + 1e-7) * R + 0.5) * (max - min) / R + min
//! ```
//!
//! Nothing is calibrated: min and max are recomputed on every call.

use super::ops::{check_bits, round_half_up, RANGE_EPS};
use crate::tensor::sign;
use crate::{Result, Tensor};

/// Affine grid spanning an observed range
#[derive(Clone, Copy, Debug)]
struct MinMaxGrid {
    min: f32,
    range: f32,
    levels: f32,
}

impl MinMaxGrid {
    fn new(min: f32, max: f32, bits: u32) -> Self {
        Self {
            min,
            range: max - min,
            levels: 2f32.powi(bits as i32 - 1) - 1.0,
        }
    }

    fn snap(&self, x: f32) -> f32 {
        round_half_up((x - self.min) / (self.range + RANGE_EPS) * self.levels) * self.range
            / self.levels
            + self.min
    }
}

/// Quantize onto a uniform grid spanning `[min(x), max(x)]`
///
/// A constant tensor comes back unchanged. `bits == 1` yields `sign(x)`.
pub fn min_max_quantize(input: &Tensor, bits: u32) -> Result<Tensor> {
    check_bits(bits)?;
    if bits == 1 {
        return Ok(input.sign());
    }

    let (Some(min), Some(max)) = (input.min(), input.max()) else {
        return Ok(input.clone());
    };

    let grid = MinMaxGrid::new(min, max, bits);
    Ok(input.map(|x| grid.snap(x)))
}

/// Min-max quantization of `ln|x|` with the sign reapplied
///
/// The range is taken over the nonzero elements; zeros stay zero.
pub fn log_min_max_quantize(input: &Tensor, bits: u32) -> Result<Tensor> {
    check_bits(bits)?;
    if bits == 1 {
        return Ok(input.sign());
    }

    let log_abs = input
        .data()
        .iter()
        .filter(|&&x| x != 0.0)
        .map(|&x| x.abs().ln());
    let (min, max) = log_abs.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min > max {
        // no nonzero element
        return Ok(input.sign());
    }

    let grid = MinMaxGrid::new(min, max, bits);
    Ok(input.map(|x| {
        if x == 0.0 {
            0.0
        } else {
            sign(x) * grid.snap(x.abs().ln()).exp()
        }
    }))
}
