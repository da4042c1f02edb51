//! Tanh-saturated quantization
//!
//! `tanh` squashes the input into (-1, 1), the result is quantized onto
//! `2^bits - 1` uniform steps in [0, 1], and `atanh` maps it back to the
//! unbounded domain. Always stateless.

use super::ops::{check_bits, round_half_up};
use crate::{Result, Tensor};

/// Largest |v| fed to `atanh`, so the outermost levels stay finite
const SATURATION: f32 = 1.0 - 1e-6;

/// Quantize through `tanh`, returning to the original domain via `atanh`
///
/// `bits == 1` yields `sign(x)`.
pub fn tanh_quantize(input: &Tensor, bits: u32) -> Result<Tensor> {
    check_bits(bits)?;
    if bits == 1 {
        return Ok(input.sign());
    }

    let n = 2f32.powi(bits as i32) - 1.0;
    Ok(input.map(|x| {
        let rescaled = (x.tanh() + 1.0) / 2.0;
        let v = round_half_up(rescaled * n) / n;
        let v = (2.0 * v - 1.0).clamp(-SATURATION, SATURATION);
        0.5 * ((1.0 + v) / (1.0 - v)).ln()
    }))
}
