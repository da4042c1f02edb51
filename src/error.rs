//! Error types for Cuantizar

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid bit width: {0} (must be in 1..=32)")]
    InvalidBits(u32),

    #[error("Invalid overflow rate: {0} (must be in [0, 1))")]
    InvalidOverflowRate(f32),

    #[error("Degenerate range: {0}")]
    DegenerateRange(String),

    #[error("Non-finite value: {0}")]
    NonFinite(String),

    #[error("Quantizer not calibrated: {0}")]
    NotCalibrated(String),

    #[error("Unknown quantization scheme: {0} (valid: linear, minmax, log, tanh, minmax_log, log_linear)")]
    UnknownScheme(String),

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
