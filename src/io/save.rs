//! Checkpoint saving

use super::checkpoint::Checkpoint;
use super::format::{ModelFormat, SaveConfig};
use crate::{Error, Result, Tensor};
use safetensors::tensor::{Dtype, TensorView};
use std::collections::HashMap;
use std::path::Path;

/// Save a checkpoint in the configured format
///
/// # Example
///
/// ```no_run
/// use cuantizar::io::{save_checkpoint, Checkpoint, ModelFormat, SaveConfig};
/// use cuantizar::Tensor;
///
/// let ckpt = Checkpoint::new(vec![("w".to_string(), Tensor::from_vec(vec![1.0, 2.0]))]);
/// save_checkpoint(&ckpt, "model.json", &SaveConfig::new(ModelFormat::Json)).unwrap();
/// ```
pub fn save_checkpoint(
    checkpoint: &Checkpoint,
    path: impl AsRef<Path>,
    config: &SaveConfig,
) -> Result<()> {
    let path = path.as_ref();
    let text = match config.format {
        ModelFormat::SafeTensors => {
            let metadata: HashMap<String, String> = checkpoint
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            return save_safetensors(path, &checkpoint.parameters, Some(metadata));
        }
        ModelFormat::Json => {
            let state = checkpoint.to_state();
            let result = if config.pretty {
                serde_json::to_string_pretty(&state)
            } else {
                serde_json::to_string(&state)
            };
            result.map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?
        }
        ModelFormat::Yaml => serde_yaml::to_string(&checkpoint.to_state())
            .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))?,
    };
    std::fs::write(path, text)?;
    tracing::debug!(path = %path.display(), format = ?config.format, "checkpoint saved");
    Ok(())
}

/// Write named tensors as F32 SafeTensors, keeping their shapes
pub fn save_safetensors(
    path: impl AsRef<Path>,
    tensors: &[(String, Tensor)],
    metadata: Option<HashMap<String, String>>,
) -> Result<()> {
    let buffers: Vec<(&str, Vec<u8>, Vec<usize>)> = tensors
        .iter()
        .map(|(name, tensor)| {
            let values = tensor.to_vec();
            let bytes: Vec<u8> = bytemuck::cast_slice(&values).to_vec();
            (name.as_str(), bytes, tensor.shape().to_vec())
        })
        .collect();

    let views = buffers
        .iter()
        .map(|(name, bytes, shape)| {
            TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map(|view| (*name, view))
                .map_err(|e| Error::Serialization(format!("invalid tensor {name}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let bytes = safetensors::serialize(views, metadata)
        .map_err(|e| Error::Serialization(format!("SafeTensors serialization failed: {e}")))?;
    std::fs::write(path.as_ref(), bytes)?;
    Ok(())
}
