//! Signed fixed-point (linear) quantization
//!
//! With scale factor `sf` the grid step is `delta = 2^-sf` and the signed
//! integer code lives in `[-2^(bits-1), 2^(bits-1) - 1]`:
//!
//! ```text
//! q = clamp(floor(x / delta + 0.5), -2^(bits-1), 2^(bits-1) - 1) * delta
//! ```

use super::ops::{check_bits, round_half_up};
use crate::{Result, Tensor};

/// Snap `input` onto the signed fixed-point grid `k * 2^-sf`
///
/// At `bits == 1` the output is `sign(x)`, the 1-bit convention shared by
/// every kernel in this module.
pub fn linear_quantize(input: &Tensor, sf: i32, bits: u32) -> Result<Tensor> {
    check_bits(bits)?;
    if bits == 1 {
        return Ok(input.sign());
    }

    let delta = 2f32.powi(-sf);
    let bound = 2f32.powi(bits as i32 - 1);
    let (min_val, max_val) = (-bound, bound - 1.0);

    Ok(input.map(|x| round_half_up(x / delta).clamp(min_val, max_val) * delta))
}
