//! # Cuantizar: Post-Training Quantization
//!
//! Cuantizar quantizes the weights and activations of small convolutional and
//! fully-connected networks to fixed-point, logarithmic, min-max or tanh
//! grids, calibrating activation formats from a few observed batches.
//!
//! ## Architecture
//!
//! - **tensor**: Dense `f32` tensor over `ndarray`
//! - **quant**: Kernels, calibrated and stateless quantizers, weight quantization
//! - **nn**: Layer tree, inference and activation quantizer insertion
//! - **io**: Checkpoint loading and saving (SafeTensors, JSON, YAML)
//! - **config**: Declarative YAML configuration and CLI arguments
//!
//! ## Example
//!
//! ```
//! use cuantizar::nn::{duplicate_model_with_quant, Layer, Linear, Node, Sequential};
//! use cuantizar::quant::{ActivationQuantConfig, QuantScheme};
//! use cuantizar::Tensor;
//!
//! let model: Node = Sequential::new()
//!     .add("fc", Layer::Linear(Linear::zeros(4, 2)?))
//!     .add("relu", Layer::ReLU)
//!     .into();
//!
//! let config = ActivationQuantConfig::new(8, 0.0, 1, QuantScheme::Linear);
//! let mut quantized = duplicate_model_with_quant(model, &config)?;
//!
//! // first batch calibrates, later batches are quantized
//! let x = Tensor::from_shape_vec(&[1, 4], vec![0.5, -1.0, 0.25, 2.0])?;
//! quantized.forward(&x)?;
//! assert!(!quantized.is_calibrating());
//! # Ok::<(), cuantizar::Error>(())
//! ```

pub mod config;
pub mod io;
pub mod nn;
pub mod quant;
pub mod tensor;

pub mod error;

// Re-export commonly used types
pub use error::{Error, Result};
pub use tensor::Tensor;
