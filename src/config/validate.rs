//! Configuration validation

use super::schema::QuantSpec;
use crate::quant::FULL_PRECISION_BITS;

/// Validation error type
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid param_bits: {0} (must be in 1..=32)")]
    InvalidParamBits(u32),

    #[error("Invalid bn_bits: {0} (must be in 1..=32)")]
    InvalidBnBits(u32),

    #[error("Invalid fwd_bits: {0} (must be in 1..=32)")]
    InvalidFwdBits(u32),

    #[error("Invalid overflow rate: {0} (must be in [0, 1))")]
    InvalidOverflowRate(f32),

    #[error("Invalid calibration_batches: 0 (scheme {0} needs at least one batch)")]
    NoCalibrationBatches(String),
}

/// Validate a quantization specification
///
/// Checks:
/// - Bit widths are in `1..=32` (32 keeps weights in full precision)
/// - Overflow rate is in [0, 1)
/// - Calibrated schemes observe at least one batch
pub fn validate_config(spec: &QuantSpec) -> Result<(), ValidationError> {
    let bit_range = 1..=FULL_PRECISION_BITS;
    if !bit_range.contains(&spec.param_bits) {
        return Err(ValidationError::InvalidParamBits(spec.param_bits));
    }
    if !bit_range.contains(&spec.bn_bits) {
        return Err(ValidationError::InvalidBnBits(spec.bn_bits));
    }
    if !bit_range.contains(&spec.fwd_bits) {
        return Err(ValidationError::InvalidFwdBits(spec.fwd_bits));
    }
    if !(0.0..1.0).contains(&spec.overflow_rate) {
        return Err(ValidationError::InvalidOverflowRate(spec.overflow_rate));
    }
    if spec.scheme.is_calibrated() && spec.calibration_batches == 0 {
        return Err(ValidationError::NoCalibrationBatches(
            spec.scheme.to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quant::QuantScheme;

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&QuantSpec::default()).is_ok());
    }

    #[test]
    fn test_zero_bits() {
        let spec = QuantSpec {
            param_bits: 0,
            ..Default::default()
        };
        assert_eq!(validate_config(&spec), Err(ValidationError::InvalidParamBits(0)));

        let spec = QuantSpec {
            bn_bits: 0,
            ..Default::default()
        };
        assert_eq!(validate_config(&spec), Err(ValidationError::InvalidBnBits(0)));

        let spec = QuantSpec {
            fwd_bits: 0,
            ..Default::default()
        };
        assert_eq!(validate_config(&spec), Err(ValidationError::InvalidFwdBits(0)));
    }

    #[test]
    fn test_bits_above_full_precision() {
        let spec = QuantSpec {
            bn_bits: 32,
            param_bits: 32,
            ..Default::default()
        };
        assert!(validate_config(&spec).is_ok());

        let spec = QuantSpec {
            bn_bits: 64,
            ..Default::default()
        };
        assert_eq!(validate_config(&spec), Err(ValidationError::InvalidBnBits(64)));

        let spec = QuantSpec {
            fwd_bits: u32::MAX,
            ..Default::default()
        };
        assert_eq!(
            validate_config(&spec),
            Err(ValidationError::InvalidFwdBits(u32::MAX))
        );
    }

    #[test]
    fn test_overflow_rate_bounds() {
        for rate in [-0.1, 1.0, 2.0, f32::NAN] {
            let spec = QuantSpec {
                overflow_rate: rate,
                ..Default::default()
            };
            assert!(matches!(
                validate_config(&spec),
                Err(ValidationError::InvalidOverflowRate(_))
            ));
        }
    }

    #[test]
    fn test_calibration_batches_only_matter_for_calibrated_schemes() {
        let spec = QuantSpec {
            calibration_batches: 0,
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&spec),
            Err(ValidationError::NoCalibrationBatches(_))
        ));

        let spec = QuantSpec {
            scheme: QuantScheme::Tanh,
            calibration_batches: 0,
            ..Default::default()
        };
        assert!(validate_config(&spec).is_ok());
    }
}
