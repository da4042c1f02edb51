//! Quantization configuration schema

use crate::quant::{ActivationQuantConfig, QuantScheme, WeightQuantConfig};
use serde::{Deserialize, Serialize};

/// Quantization run configuration
///
/// ```yaml
/// scheme: linear
/// param_bits: 8
/// bn_bits: 32
/// fwd_bits: 8
/// overflow_rate: 0.0
/// calibration_batches: 20
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantSpec {
    /// Scheme for both weights and activations
    #[serde(default)]
    pub scheme: QuantScheme,

    /// Bits for weights and biases (32 keeps full precision)
    #[serde(default = "default_param_bits")]
    pub param_bits: u32,

    /// Bits for batch-norm running statistics (32 keeps full precision)
    #[serde(default = "default_bn_bits")]
    pub bn_bits: u32,

    /// Bits for activation quantizers
    #[serde(default = "default_fwd_bits")]
    pub fwd_bits: u32,

    /// Fraction of largest magnitudes allowed to clip
    #[serde(default)]
    pub overflow_rate: f32,

    /// Batches observed by calibrated activation quantizers
    #[serde(default = "default_calibration_batches")]
    pub calibration_batches: usize,
}

fn default_param_bits() -> u32 {
    8
}

fn default_bn_bits() -> u32 {
    32
}

fn default_fwd_bits() -> u32 {
    8
}

fn default_calibration_batches() -> usize {
    20
}

impl Default for QuantSpec {
    fn default() -> Self {
        Self {
            scheme: QuantScheme::default(),
            param_bits: default_param_bits(),
            bn_bits: default_bn_bits(),
            fwd_bits: default_fwd_bits(),
            overflow_rate: 0.0,
            calibration_batches: default_calibration_batches(),
        }
    }
}

impl QuantSpec {
    /// Settings for post-training weight quantization
    pub fn weight_config(&self) -> WeightQuantConfig {
        WeightQuantConfig {
            param_bits: self.param_bits,
            bn_bits: self.bn_bits,
            overflow_rate: self.overflow_rate,
            scheme: self.scheme,
        }
    }

    /// Settings for inserted activation quantizers
    pub fn activation_config(&self) -> ActivationQuantConfig {
        ActivationQuantConfig::new(
            self.fwd_bits,
            self.overflow_rate,
            self.calibration_batches,
            self.scheme,
        )
    }
}
