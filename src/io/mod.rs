//! Checkpoint I/O
//!
//! Named-tensor checkpoints in SafeTensors, JSON or YAML. Only F32 tensors
//! are read from SafeTensors files.

mod checkpoint;
mod format;
mod load;
mod save;

pub use checkpoint::{Checkpoint, CheckpointState, ParameterInfo};
pub use format::{ModelFormat, SaveConfig};
pub use load::{load_checkpoint, load_safetensors};
pub use save::{save_checkpoint, save_safetensors};
