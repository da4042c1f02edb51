//! Post-training weight quantization
//!
//! Parameters are quantized once, in place, before activation quantizers are
//! inserted. Batch-norm running statistics (any name containing `running`)
//! get their own bit width.

use super::integral::compute_integral_part;
use super::linear::linear_quantize;
use super::log_linear::log_linear_quantize;
use super::min_max::{log_min_max_quantize, min_max_quantize};
use super::ops::{check_bits, check_overflow_rate, MAX_BITS};
use super::scheme::QuantScheme;
use super::tanh::tanh_quantize;
use crate::nn::Node;
use crate::{Result, Tensor};
use serde::{Deserialize, Serialize};

/// Bit widths at or above this leave a tensor in full precision
pub const FULL_PRECISION_BITS: u32 = MAX_BITS;

/// Weight quantization settings
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightQuantConfig {
    /// Bits for ordinary parameters
    pub param_bits: u32,
    /// Bits for batch-norm running statistics
    pub bn_bits: u32,
    /// Overflow rate used to pick the fixed-point format
    pub overflow_rate: f32,
    pub scheme: QuantScheme,
}

impl Default for WeightQuantConfig {
    fn default() -> Self {
        Self {
            param_bits: 8,
            bn_bits: 32,
            overflow_rate: 0.0,
            scheme: QuantScheme::Linear,
        }
    }
}

impl WeightQuantConfig {
    pub fn validate(&self) -> Result<()> {
        check_bits(self.param_bits)?;
        check_bits(self.bn_bits)?;
        check_overflow_rate(self.overflow_rate)
    }

    /// Bit width for the named parameter, or `None` if it stays full precision
    pub fn bits_for(&self, name: &str) -> Option<u32> {
        if self.param_bits >= FULL_PRECISION_BITS {
            return None;
        }
        let bits = if name.contains("running") {
            self.bn_bits
        } else {
            self.param_bits
        };
        (bits < FULL_PRECISION_BITS).then_some(bits)
    }
}

/// Quantize one tensor with the configured scheme
pub fn quantize_tensor(
    tensor: &Tensor,
    scheme: QuantScheme,
    bits: u32,
    overflow_rate: f32,
) -> Result<Tensor> {
    match scheme {
        QuantScheme::Linear => {
            if tensor.is_empty() {
                return Ok(tensor.clone());
            }
            let sf = bits as i32 - 1 - compute_integral_part(tensor, overflow_rate)?;
            linear_quantize(tensor, sf, bits)
        }
        QuantScheme::Log | QuantScheme::MinMaxLog => log_min_max_quantize(tensor, bits),
        QuantScheme::MinMax => min_max_quantize(tensor, bits),
        QuantScheme::Tanh => tanh_quantize(tensor, bits),
        QuantScheme::LogLinear => log_linear_quantize(tensor, overflow_rate, bits),
    }
}

/// Quantize every entry of a state dict, preserving order and names
pub fn quantize_state_dict(
    state: &[(String, Tensor)],
    config: &WeightQuantConfig,
) -> Result<Vec<(String, Tensor)>> {
    config.validate()?;
    let mut out = Vec::with_capacity(state.len());
    let mut quantized = 0usize;
    for (name, tensor) in state {
        let value = match config.bits_for(name) {
            Some(bits) => {
                quantized += 1;
                tracing::debug!(param = %name, bits, scheme = %config.scheme, "quantizing parameter");
                quantize_tensor(tensor, config.scheme, bits, config.overflow_rate)?
            }
            None => tensor.clone(),
        };
        out.push((name.clone(), value));
    }
    tracing::info!(
        quantized,
        total = state.len(),
        scheme = %config.scheme,
        "weight quantization finished"
    );
    Ok(out)
}

/// Quantize the parameters held by a layer tree in place
pub fn quantize_model_weights(model: &mut Node, config: &WeightQuantConfig) -> Result<()> {
    let state = model.named_parameters();
    let quantized = quantize_state_dict(&state, config)?;
    model.load_state_dict(&quantized)
}
