//! Checkpoint loading

use super::checkpoint::{Checkpoint, CheckpointState};
use super::format::ModelFormat;
use crate::{Error, Result, Tensor};
use safetensors::tensor::Dtype;
use safetensors::SafeTensors;
use std::collections::BTreeMap;
use std::path::Path;

/// Load a checkpoint, picking the format from the file extension
///
/// # Example
///
/// ```no_run
/// use cuantizar::io::load_checkpoint;
///
/// let ckpt = load_checkpoint("model.safetensors").unwrap();
/// println!("{} parameters", ckpt.parameters.len());
/// ```
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let path = path.as_ref();
    let format = ModelFormat::from_path(path).ok_or_else(|| {
        Error::Serialization(format!("Unsupported file extension: {}", path.display()))
    })?;

    let state: CheckpointState = match format {
        ModelFormat::SafeTensors => return parse_safetensors(&std::fs::read(path)?),
        ModelFormat::Json => serde_json::from_str(&std::fs::read_to_string(path)?)
            .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {e}")))?,
        ModelFormat::Yaml => serde_yaml::from_str(&std::fs::read_to_string(path)?)
            .map_err(|e| Error::Serialization(format!("YAML deserialization failed: {e}")))?,
    };
    Checkpoint::from_state(state)
}

/// Load the F32 tensors of a SafeTensors file, sorted by name
///
/// Tensors of any other dtype are skipped with a warning.
pub fn load_safetensors(path: impl AsRef<Path>) -> Result<Vec<(String, Tensor)>> {
    let data = std::fs::read(path.as_ref())?;
    Ok(parse_safetensors(&data)?.parameters)
}

fn parse_safetensors(data: &[u8]) -> Result<Checkpoint> {
    let (_, header) = SafeTensors::read_metadata(data)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;
    let metadata: BTreeMap<String, String> = header
        .metadata()
        .as_ref()
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    let st = SafeTensors::deserialize(data)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;

    let mut parameters = Vec::new();
    for (name, view) in st.tensors() {
        if view.dtype() != Dtype::F32 {
            tracing::warn!(tensor = %name, dtype = ?view.dtype(), "skipping non-f32 tensor");
            continue;
        }
        // the byte buffer carries no alignment guarantee
        let values: Vec<f32> = bytemuck::pod_collect_to_vec(view.data());
        let tensor = Tensor::from_shape_vec(view.shape(), values)?;
        parameters.push((name, tensor));
    }
    parameters.sort_by(|a, b| a.0.cmp(&b.0));
    tracing::debug!(tensors = parameters.len(), "loaded safetensors");

    Ok(Checkpoint {
        metadata,
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{save_checkpoint, SaveConfig};
    use safetensors::tensor::TensorView;
    use tempfile::TempDir;

    fn sample() -> Checkpoint {
        Checkpoint::new(vec![
            (
                "a.weight".to_string(),
                Tensor::from_shape_vec(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap(),
            ),
            ("b.bias".to_string(), Tensor::from_vec(vec![-0.25])),
        ])
        .with_metadata("scheme", "minmax")
    }

    #[test]
    fn test_text_formats_round_trip() {
        let dir = TempDir::new().unwrap();
        for format in [ModelFormat::Json, ModelFormat::Yaml] {
            let path = dir.path().join(format!("model.{}", format.extension()));
            save_checkpoint(&sample(), &path, &SaveConfig::new(format)).unwrap();
            assert_eq!(load_checkpoint(&path).unwrap(), sample());
        }
    }

    #[test]
    fn test_safetensors_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.safetensors");
        save_checkpoint(&sample(), &path, &SaveConfig::new(ModelFormat::SafeTensors)).unwrap();

        let loaded = load_checkpoint(&path).unwrap();
        assert_eq!(loaded.metadata.get("scheme").map(String::as_str), Some("minmax"));
        assert_eq!(loaded.get("a.weight").unwrap().shape(), &[2, 3]);
        assert_eq!(load_safetensors(&path).unwrap(), sample().parameters);
    }

    #[test]
    fn test_non_f32_tensors_skipped() {
        let floats: Vec<u8> = bytemuck::cast_slice(&[1.0f32, 2.0]).to_vec();
        let ints: Vec<u8> = bytemuck::cast_slice(&[7i32, 8]).to_vec();
        let views = vec![
            ("f", TensorView::new(Dtype::F32, vec![2], &floats).unwrap()),
            ("i", TensorView::new(Dtype::I32, vec![2], &ints).unwrap()),
        ];
        let bytes = safetensors::serialize(views, None).unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mixed.safetensors");
        std::fs::write(&path, bytes).unwrap();

        let loaded = load_safetensors(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, "f");
        assert_eq!(loaded[0].1.to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            load_checkpoint("model.bin"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            load_safetensors("/nonexistent/model.safetensors"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_garbage_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.safetensors");
        std::fs::write(&path, b"not a safetensors file").unwrap();
        assert!(matches!(load_safetensors(&path), Err(Error::Serialization(_))));
    }
}
