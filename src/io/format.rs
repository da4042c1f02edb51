//! Checkpoint formats and write options

use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk checkpoint layout, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFormat {
    /// Shapes plus one flat `data` array
    Json,

    /// Same layout as `Json`
    Yaml,

    /// Binary F32 tensors, metadata in the header
    SafeTensors,
}

impl ModelFormat {
    /// Canonical extension, without the dot
    pub fn extension(&self) -> &str {
        match self {
            ModelFormat::Json => "json",
            ModelFormat::Yaml => "yaml",
            ModelFormat::SafeTensors => "safetensors",
        }
    }

    /// Case-insensitive; `yml` is accepted for YAML
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(ModelFormat::Json),
            "yaml" | "yml" => Some(ModelFormat::Yaml),
            "safetensors" => Some(ModelFormat::SafeTensors),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        Self::from_extension(path.extension()?.to_str()?)
    }
}

/// How [`save_checkpoint`](super::save_checkpoint) writes a file
#[derive(Debug, Clone)]
pub struct SaveConfig {
    pub format: ModelFormat,

    /// Indent JSON output; ignored by the other formats
    pub pretty: bool,
}

impl SaveConfig {
    pub fn new(format: ModelFormat) -> Self {
        Self {
            format,
            pretty: true,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}
