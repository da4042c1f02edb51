//! Quantization error analysis
//!
//! Compares a tensor against its quantized counterpart:
//! - Mean squared and mean absolute error
//! - Maximum absolute error
//! - Signal-to-quantization-noise ratio

use crate::{Error, Result, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error statistics for one quantized tensor
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantErrorStats {
    /// Mean Squared Error
    pub mse: f32,
    /// Mean Absolute Error
    pub mae: f32,
    /// Maximum absolute error
    pub max_error: f32,
    /// Signal-to-Quantization-Noise Ratio (SQNR) in dB
    pub sqnr_db: f32,
    /// Number of samples
    pub num_samples: usize,
}

impl QuantErrorStats {
    /// Measure the error of `quantized` against `original`
    pub fn between(original: &Tensor, quantized: &Tensor) -> Result<Self> {
        if original.shape() != quantized.shape() {
            return Err(Error::ShapeMismatch {
                expected: original.shape().to_vec(),
                got: quantized.shape().to_vec(),
            });
        }
        if original.is_empty() {
            return Ok(Self::default());
        }

        let n = original.len() as f32;
        let (mut sq, mut abs, mut max_error, mut signal) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
        for (&o, &q) in original.data().iter().zip(quantized.data().iter()) {
            let e = (o - q).abs();
            sq += e * e;
            abs += e;
            max_error = max_error.max(e);
            signal += o * o;
        }
        let mse = sq / n;

        // SQNR = 10 * log10(signal_power / noise_power)
        let signal_power = signal / n;
        let sqnr_db = if mse > 1e-10 {
            10.0 * (signal_power / mse).log10()
        } else {
            f32::INFINITY
        };

        Ok(Self {
            mse,
            mae: abs / n,
            max_error,
            sqnr_db,
            num_samples: original.len(),
        })
    }

    /// Root Mean Squared Error
    pub fn rmse(&self) -> f32 {
        self.mse.sqrt()
    }
}

impl fmt::Display for QuantErrorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mse={:.3e} mae={:.3e} max={:.3e} sqnr={:.2}dB n={}",
            self.mse, self.mae, self.max_error, self.sqnr_db, self.num_samples
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quant::linear_quantize;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(200))]

        /// Fixed-point error never exceeds half a step inside the range
        #[test]
        fn prop_linear_error_bounded(
            values in prop::collection::vec(-0.5f32..0.5, 1..64),
            bits in 3u32..12,
        ) {
            let input = Tensor::from_vec(values);
            let sf = bits as i32 - 1;
            let q = linear_quantize(&input, sf, bits).unwrap();
            let stats = QuantErrorStats::between(&input, &q).unwrap();
            let half_step = 2f32.powi(-sf) / 2.0;
            prop_assert!(stats.max_error <= half_step * (1.0 + 1e-4) + 1e-6);
            prop_assert!(stats.mae <= stats.max_error + 1e-7);
            prop_assert!(stats.rmse() <= stats.max_error + 1e-6);
        }
    }

    #[test]
    fn test_known_errors() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let b = Tensor::from_vec(vec![1.0, 2.5, 3.0, 3.0]);
        let stats = QuantErrorStats::between(&a, &b).unwrap();
        assert_abs_diff_eq!(stats.mse, (0.25 + 1.0) / 4.0);
        assert_abs_diff_eq!(stats.mae, 1.5 / 4.0);
        assert_abs_diff_eq!(stats.max_error, 1.0);
        assert_eq!(stats.num_samples, 4);
        // signal power 7.5, noise 0.3125 -> 10*log10(24)
        assert_abs_diff_eq!(stats.sqnr_db, 13.802, epsilon = 1e-3);
    }

    #[test]
    fn test_identical_is_infinite_sqnr() {
        let a = Tensor::from_vec(vec![0.5, -0.5]);
        let stats = QuantErrorStats::between(&a, &a).unwrap();
        assert_eq!(stats.mse, 0.0);
        assert!(stats.sqnr_db.is_infinite());
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Tensor::from_vec(vec![1.0, 2.0]);
        let b = Tensor::from_vec(vec![1.0]);
        assert!(matches!(
            QuantErrorStats::between(&a, &b),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_is_default() {
        let a = Tensor::from_vec(vec![]);
        assert_eq!(QuantErrorStats::between(&a, &a).unwrap(), QuantErrorStats::default());
    }
}
