//! Quantization: fixed-point, min-max, log and tanh schemes
//!
//! Provides:
//! - Per-call quantization kernels over [`Tensor`](crate::Tensor)
//! - Calibrated quantizers that learn a fixed-point format from observed batches
//! - Stateless quantizers for the min-max, log min-max and tanh schemes
//! - Post-training weight quantization and error statistics

mod calibrated;
mod error_analysis;
mod integral;
mod linear;
mod log_linear;
mod min_max;
mod ops;
mod quantizer;
mod scheme;
mod stateless;
mod tanh;
mod weights;

pub use calibrated::{CalibratedKind, CalibratedQuant, CalibrationState};
pub use error_analysis::QuantErrorStats;
pub use integral::compute_integral_part;
pub use linear::linear_quantize;
pub use log_linear::{log_linear_quantize, log_linear_quantize_with_sf};
pub use min_max::{log_min_max_quantize, min_max_quantize};
pub use quantizer::{ActivationQuantConfig, Quantizer};
pub use scheme::QuantScheme;
pub use stateless::{NormalQuant, StatelessKernel};
pub use tanh::tanh_quantize;
pub use weights::{
    quantize_model_weights, quantize_state_dict, quantize_tensor, WeightQuantConfig,
    FULL_PRECISION_BITS,
};
