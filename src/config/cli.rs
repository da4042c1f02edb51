//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! cuantizar quantize model.safetensors --output model-q.safetensors
//! cuantizar quantize model.safetensors -o model-q.json --config quant.yaml --param-bits 4
//! cuantizar validate quant.yaml
//! cuantizar info quant.yaml --format json
//! ```

use super::schema::QuantSpec;
use crate::quant::QuantScheme;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cuantizar: post-training quantization
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "cuantizar")]
#[command(author = "PAIML")]
#[command(version)]
#[command(about = "Post-training quantization with fixed-point, log, min-max and tanh schemes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log per-tensor progress and resolved settings
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Quantize the weights of a checkpoint
    Quantize(QuantizeArgs),

    /// Check a quantization config without touching any model
    Validate(ValidateArgs),

    /// Print a config with defaults filled in
    Info(InfoArgs),
}

/// Arguments for the quantize command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct QuantizeArgs {
    /// Path to model checkpoint (safetensors, json or yaml)
    #[arg(value_name = "MODEL")]
    pub model: PathBuf,

    /// Output path for the quantized checkpoint
    #[arg(short, long)]
    pub output: PathBuf,

    /// YAML quantization config
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override quantization scheme
    #[arg(short, long)]
    pub scheme: Option<QuantScheme>,

    /// Override bits for weights and biases
    #[arg(long)]
    pub param_bits: Option<u32>,

    /// Override bits for batch-norm running statistics
    #[arg(long)]
    pub bn_bits: Option<u32>,

    /// Override overflow rate
    #[arg(long)]
    pub overflow_rate: Option<f32>,

    /// Print per-tensor error statistics
    #[arg(long)]
    pub report: bool,
}

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Quantization config (YAML)
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Also print the weight and activation settings the config resolves to
    #[arg(short, long)]
    pub detailed: bool,
}

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Quantization config (YAML)
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// text, json or yaml
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// How `info` renders a config
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    const ALL: [OutputFormat; 3] = [OutputFormat::Text, OutputFormat::Json, OutputFormat::Yaml];

    fn name(self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown format '{s}' (expected text, json or yaml)"))
    }
}

/// Parse an explicit argv instead of the process arguments
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Fold `--scheme`, `--param-bits`, `--bn-bits` and `--overflow-rate` into `spec`
pub fn apply_overrides(spec: &mut QuantSpec, args: &QuantizeArgs) {
    if let Some(scheme) = args.scheme {
        spec.scheme = scheme;
    }
    if let Some(bits) = args.param_bits {
        spec.param_bits = bits;
    }
    if let Some(bits) = args.bn_bits {
        spec.bn_bits = bits;
    }
    if let Some(rate) = args.overflow_rate {
        spec.overflow_rate = rate;
    }
}
