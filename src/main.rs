//! Cuantizar CLI
//!
//! Weight quantization entry point for the cuantizar library.
//!
//! # Usage
//!
//! ```bash
//! # Quantize a checkpoint with the default settings (linear, 8-bit params)
//! cuantizar quantize model.safetensors --output model-q8.safetensors
//!
//! # Quantize with a config and overrides, printing error statistics
//! cuantizar quantize model.safetensors -o model-q4.json -c quant.yaml --param-bits 4 --report
//!
//! # Check a config
//! cuantizar validate quant.yaml
//!
//! # Print a config with defaults filled in
//! cuantizar info quant.yaml --format yaml
//! ```
//!
//! Diagnostics go through `tracing`; `RUST_LOG` overrides the level picked
//! from `--verbose` / `--quiet`.

use clap::Parser;
use cuantizar::config::{
    apply_overrides, load_config, validate_config, Cli, Command, InfoArgs, OutputFormat,
    QuantSpec, QuantizeArgs, ValidateArgs,
};
use cuantizar::io::{load_checkpoint, save_checkpoint, Checkpoint, ModelFormat, SaveConfig};
use cuantizar::quant::{quantize_state_dict, QuantErrorStats, WeightQuantConfig};
use cuantizar::Tensor;
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LogLevel::Quiet,
        (false, true) => LogLevel::Verbose,
        (false, false) => LogLevel::Normal,
    };
    init_tracing(level);

    let outcome = match cli.command {
        Command::Quantize(args) => run_quantize(&args, level),
        Command::Validate(args) => run_validate(&args, level),
        Command::Info(args) => run_info(&args),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[derive(Clone, Copy, PartialEq)]
enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

impl LogLevel {
    fn filter(self) -> &'static str {
        match self {
            LogLevel::Quiet => "error",
            LogLevel::Normal => "info",
            LogLevel::Verbose => "debug",
        }
    }
}

fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.filter()));
    // a second init (e.g. under a test harness) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

/// User-facing status line on stdout, silenced by `--quiet`
fn status(level: LogLevel, msg: impl AsRef<str>) {
    if level != LogLevel::Quiet {
        println!("{}", msg.as_ref());
    }
}

fn run_quantize(args: &QuantizeArgs, level: LogLevel) -> Result<(), String> {
    let mut spec = match &args.config {
        Some(path) => load_config(path).map_err(|e| format!("Config error: {e}"))?,
        None => QuantSpec::default(),
    };
    apply_overrides(&mut spec, args);
    validate_config(&spec).map_err(|e| format!("Invalid settings: {e}"))?;

    let output_format = ModelFormat::from_path(&args.output).ok_or_else(|| {
        format!(
            "Unsupported output extension: {} (use .safetensors, .json or .yaml)",
            args.output.display()
        )
    })?;

    status(
        level,
        format!(
            "Quantizing {} ({}, {}-bit params)",
            args.model.display(),
            spec.scheme,
            spec.param_bits
        ),
    );
    tracing::debug!(
        bn_bits = spec.bn_bits,
        overflow_rate = spec.overflow_rate,
        output = %args.output.display(),
        "resolved weight settings"
    );

    let original =
        load_checkpoint(&args.model).map_err(|e| format!("Failed to load model: {e}"))?;
    let weight_config = spec.weight_config();
    let quantized = quantize_state_dict(&original.parameters, &weight_config)
        .map_err(|e| format!("Quantization failed: {e}"))?;

    if args.report {
        print_report(&original.parameters, &quantized, &weight_config)?;
    }

    let quantized_count = original
        .parameters
        .iter()
        .filter(|(name, _)| weight_config.bits_for(name).is_some())
        .count();

    let output = Checkpoint {
        metadata: original.metadata.clone(),
        parameters: quantized,
    }
    .with_metadata("quant.scheme", spec.scheme.to_string())
    .with_metadata("quant.param_bits", spec.param_bits.to_string())
    .with_metadata("quant.bn_bits", spec.bn_bits.to_string())
    .with_metadata("quant.overflow_rate", spec.overflow_rate.to_string());

    save_checkpoint(&output, &args.output, &SaveConfig::new(output_format))
        .map_err(|e| format!("Failed to save model: {e}"))?;

    status(
        level,
        format!(
            "Quantized {quantized_count}/{} tensors -> {}",
            original.parameters.len(),
            args.output.display()
        ),
    );
    Ok(())
}

fn print_report(
    original: &[(String, Tensor)],
    quantized: &[(String, Tensor)],
    config: &WeightQuantConfig,
) -> Result<(), String> {
    println!(
        "\n{:<40} {:>6} {:>12} {:>12} {:>10}",
        "tensor", "bits", "mse", "max_err", "sqnr_db"
    );
    for ((name, before), (_, after)) in original.iter().zip(quantized) {
        let stats = QuantErrorStats::between(before, after)
            .map_err(|e| format!("Error analysis failed for {name}: {e}"))?;
        let bits = config
            .bits_for(name)
            .map_or_else(|| "fp32".to_string(), |b| b.to_string());
        println!(
            "{:<40} {:>6} {:>12.3e} {:>12.3e} {:>10.2}",
            name, bits, stats.mse, stats.max_error, stats.sqnr_db
        );
    }
    println!();
    Ok(())
}

fn run_validate(args: &ValidateArgs, level: LogLevel) -> Result<(), String> {
    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    status(level, format!("{}: ok", args.config.display()));

    if args.detailed {
        let weights = spec.weight_config();
        let activations = spec.activation_config();
        let bn = match weights.bits_for("running_mean") {
            Some(bits) => format!("{bits}-bit"),
            None => "full precision".to_string(),
        };
        println!("\nscheme       {}", spec.scheme);
        println!("weights      {}-bit, running stats {bn}", weights.param_bits);
        println!(
            "activations  {}-bit, overflow rate {}",
            activations.bits, activations.overflow_rate
        );
        if spec.scheme.is_calibrated() {
            println!("calibration  {} batches", activations.counter);
        } else {
            println!("calibration  none (stateless scheme)");
        }
    }

    Ok(())
}

fn run_info(args: &InfoArgs) -> Result<(), String> {
    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;

    let rendered = match args.format {
        OutputFormat::Text => format!(
            "scheme: {}\nparams: {}-bit (bn {}-bit)\nactivations: {}-bit\noverflow rate: {}\ncalibration batches: {}",
            spec.scheme,
            spec.param_bits,
            spec.bn_bits,
            spec.fwd_bits,
            spec.overflow_rate,
            spec.calibration_batches
        ),
        OutputFormat::Json => serde_json::to_string_pretty(&spec)
            .map_err(|e| format!("JSON serialization error: {e}"))?,
        OutputFormat::Yaml => {
            serde_yaml::to_string(&spec).map_err(|e| format!("YAML serialization error: {e}"))?
        }
    };
    println!("{}", rendered.trim_end());
    Ok(())
}
