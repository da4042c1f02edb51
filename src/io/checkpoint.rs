//! In-memory checkpoint: named tensors plus string metadata

use crate::{Error, Result, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shape record for one parameter in a text checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Dotted parameter path, e.g. `features.0.weight`
    pub name: String,
    pub shape: Vec<usize>,
}

/// Serializable form used by the JSON and YAML formats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointState {
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    pub parameters: Vec<ParameterInfo>,

    /// Row-major parameter data, concatenated in `parameters` order
    pub data: Vec<f32>,
}

/// Named tensors with free-form metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checkpoint {
    pub metadata: BTreeMap<String, String>,
    pub parameters: Vec<(String, Tensor)>,
}

impl Checkpoint {
    pub fn new(parameters: Vec<(String, Tensor)>) -> Self {
        Self {
            metadata: BTreeMap::new(),
            parameters,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Get parameter by name
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// Total number of scalar values
    pub fn num_values(&self) -> usize {
        self.parameters.iter().map(|(_, t)| t.len()).sum()
    }

    pub fn to_state(&self) -> CheckpointState {
        let mut data = Vec::with_capacity(self.num_values());
        let parameters = self
            .parameters
            .iter()
            .map(|(name, tensor)| {
                data.extend(tensor.data().iter().copied());
                ParameterInfo {
                    name: name.clone(),
                    shape: tensor.shape().to_vec(),
                }
            })
            .collect();
        CheckpointState {
            metadata: self.metadata.clone(),
            parameters,
            data,
        }
    }

    /// Rebuild from the text form; the data length must match the shapes
    pub fn from_state(state: CheckpointState) -> Result<Self> {
        let mut offset = 0usize;
        let mut parameters = Vec::with_capacity(state.parameters.len());
        for info in state.parameters {
            let len: usize = info.shape.iter().product();
            let end = offset + len;
            let chunk = state.data.get(offset..end).ok_or_else(|| {
                Error::Serialization(format!(
                    "parameter {} needs values {offset}..{end}, data has {}",
                    info.name,
                    state.data.len()
                ))
            })?;
            parameters.push((info.name, Tensor::from_shape_vec(&info.shape, chunk.to_vec())?));
            offset = end;
        }
        if offset != state.data.len() {
            return Err(Error::Serialization(format!(
                "{} trailing values after last parameter",
                state.data.len() - offset
            )));
        }
        Ok(Self {
            metadata: state.metadata,
            parameters,
        })
    }
}
