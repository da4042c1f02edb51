//! Declarative YAML configuration
//!
//! # Example
//!
//! ```yaml
//! scheme: linear
//! param_bits: 8
//! bn_bits: 32
//! fwd_bits: 8
//! overflow_rate: 0.0
//! calibration_batches: 20
//! ```

mod cli;
mod load;
mod schema;
mod validate;


#[cfg(test)]
mod property_tests;

pub use cli::{
    apply_overrides, parse_args, Cli, Command, InfoArgs, OutputFormat, QuantizeArgs, ValidateArgs,
};
pub use load::{load_config, parse_config};
pub use schema::QuantSpec;
pub use validate::{validate_config, ValidationError};
