//! YAML configuration loading

use super::schema::QuantSpec;
use super::validate::validate_config;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Load and validate a quantization spec from a YAML file
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<QuantSpec> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    let spec = parse_config(&yaml_content)?;
    tracing::debug!(path = %config_path.as_ref().display(), scheme = %spec.scheme, "config loaded");
    Ok(spec)
}

/// Parse and validate a quantization spec from YAML text
pub fn parse_config(yaml: &str) -> Result<QuantSpec> {
    let spec: QuantSpec = serde_yaml::from_str(yaml)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {}", e)))?;

    validate_config(&spec).map_err(|e| Error::ConfigError(format!("Invalid config: {}", e)))?;

    Ok(spec)
}
