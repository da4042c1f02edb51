//! Log-domain fixed-point quantization
//!
//! Quantizes `ln|x|` on a fixed-point grid with one bit fewer than requested
//! (the sign is carried separately) and maps back with `exp`. This keeps
//! relative precision across several orders of magnitude.
//!
//! The scale factor is sized for the `bits - 1` bit log grid, i.e.
//! `sf = (bits - 2) - integral_part(|ln|x||)`.

use super::integral::integral_part_of;
use super::linear::linear_quantize;
use super::ops::check_bits;
use crate::tensor::sign;
use crate::{Result, Tensor};
use ndarray::Zip;

/// Log-domain quantization with the scale factor estimated from `input`
///
/// The integral part is taken over the nonzero elements. A tensor without
/// nonzero elements is returned as zeros.
///
/// The scale factor is `(bits - 2) - ip`, one below the `(bits - 1) - ip`
/// formula often quoted for this scheme. With that formula the largest
/// log-magnitude saturates on the `bits - 1` bit grid.
pub fn log_linear_quantize(input: &Tensor, overflow_rate: f32, bits: u32) -> Result<Tensor> {
    check_bits(bits)?;
    if bits == 1 {
        return Ok(input.sign());
    }

    match log_scale_factor(input, overflow_rate, bits)? {
        Some(sf) => log_linear_quantize_with_sf(input, sf, bits),
        None => Ok(input.sign()),
    }
}

/// Log-domain quantization with a fixed scale factor
///
/// Zero elements stay zero.
pub fn log_linear_quantize_with_sf(input: &Tensor, sf: i32, bits: u32) -> Result<Tensor> {
    check_bits(bits)?;
    if bits == 1 {
        return Ok(input.sign());
    }

    let log_abs = input.map(|x| x.abs().ln());
    let quantized = linear_quantize(&log_abs, sf, bits - 1)?;

    let out = Zip::from(input.data())
        .and(quantized.data())
        .map_collect(|&x, &q| sign(x) * q.exp());
    Ok(Tensor::new(out))
}

/// Scale factor for the log-magnitudes of `input`, `None` if every element is zero
pub(crate) fn log_scale_factor(input: &Tensor, overflow_rate: f32, bits: u32) -> Result<Option<i32>> {
    let magnitudes = log_magnitudes(input);
    if magnitudes.is_empty() {
        return Ok(None);
    }
    let integral = integral_part_of(magnitudes, overflow_rate)?;
    Ok(Some(bits as i32 - 2 - integral))
}

/// `|ln|x||` for every nonzero element
pub(crate) fn log_magnitudes(input: &Tensor) -> Vec<f32> {
    input
        .data()
        .iter()
        .filter(|&&x| x != 0.0)
        .map(|&x| x.abs().ln().abs())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(100))]

        /// Sign is preserved and outputs stay finite
        #[test]
        fn prop_sign_preserved(
            values in prop::collection::vec(prop_oneof![-50.0f32..-0.01, 0.01f32..50.0], 1..32),
            bits in 3u32..9,
        ) {
            let input = Tensor::from_vec(values.clone());
            let out = log_linear_quantize(&input, 0.0, bits).unwrap();
            for (&x, &q) in values.iter().zip(out.data().iter()) {
                prop_assert_eq!(sign(x), sign(q));
                prop_assert!(q.is_finite());
            }
        }
    }

    #[test]
    fn test_largest_log_magnitude_not_clipped() {
        // |ln x| = 3 -> ip 2 -> sf 0 on a 3-bit grid reaching 3
        let x = 3f32.exp();
        let out = log_linear_quantize(&Tensor::from_vec(vec![x, -x]), 0.0, 4).unwrap();
        assert_relative_eq!(out.data()[0], x, max_relative = 1e-5);
        assert_relative_eq!(out.data()[1], -x, max_relative = 1e-5);
    }

    #[test]
    fn test_grid_points_survive() {
        // ln|x| in {0, 0.5, -1} all lie on the log grid
        let e = std::f32::consts::E;
        let input = Tensor::from_vec(vec![1.0, 0.5f32.exp(), -1.0 / e]);
        let out = log_linear_quantize(&input, 0.0, 8).unwrap();
        assert_relative_eq!(out.data()[0], 1.0, max_relative = 1e-5);
        assert_relative_eq!(out.data()[1], 0.5f32.exp(), max_relative = 1e-5);
        assert_relative_eq!(out.data()[2], -1.0 / e, max_relative = 1e-5);
    }

    #[test]
    fn test_with_sf_snaps_log_magnitude() {
        // sf = 0 -> ln|x| rounded to an integer
        let input = Tensor::from_vec(vec![2.0, -20.0]);
        let out = log_linear_quantize_with_sf(&input, 0, 4).unwrap();
        // ln 2 = 0.69 -> 1 ; ln 20 = 3.0 -> 3
        assert_relative_eq!(out.data()[0], 1f32.exp(), max_relative = 1e-6);
        assert_relative_eq!(out.data()[1], -(3f32.exp()), max_relative = 1e-6);
    }

    #[test]
    fn test_zeros_stay_zero() {
        let input = Tensor::from_vec(vec![0.0, 4.0, 0.0]);
        let out = log_linear_quantize(&input, 0.0, 6).unwrap();
        assert_eq!(out.data()[0], 0.0);
        assert_eq!(out.data()[2], 0.0);
        assert!(out.data()[1] > 0.0);

        let zeros = Tensor::zeros(&[3]);
        assert_eq!(log_linear_quantize(&zeros, 0.0, 6).unwrap().to_vec(), vec![0.0; 3]);
    }

    #[test]
    fn test_one_bit_is_sign() {
        let input = Tensor::from_vec(vec![-0.3, 0.0, 9.0]);
        let out = log_linear_quantize(&input, 0.0, 1).unwrap();
        assert_eq!(out.to_vec(), vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_log_scale_factor() {
        // |ln 8| = 2.08 -> integral part 2 -> sf = 6 - 2
        let input = Tensor::from_vec(vec![8.0, 1.0, 0.0]);
        assert_eq!(log_scale_factor(&input, 0.0, 8).unwrap(), Some(4));
        assert_eq!(log_scale_factor(&Tensor::zeros(&[2]), 0.0, 8).unwrap(), None);
    }
}
