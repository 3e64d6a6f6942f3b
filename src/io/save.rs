//! Checkpoint saving

use super::checkpoint::Checkpoint;
use super::format::{ModelFormat, SaveConfig};
use crate::{Error, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Save a checkpoint to a file
///
/// A checkpoint without optimizer state is written as its bare model state.
///
/// # Example
///
/// ```no_run
/// use aprendiz::io::{save_checkpoint, Checkpoint, ModelFormat, ModelState, SaveConfig};
/// use aprendiz::Tensor;
///
/// let params = vec![Tensor::from_vec(vec![1.0, 2.0], true)];
/// let model = ModelState::from_tensors(&["weight".to_string()], &params).unwrap();
/// let config = SaveConfig::new(ModelFormat::Json);
///
/// save_checkpoint(&Checkpoint::new(model, None), "model.json", &config).unwrap();
/// ```
pub fn save_checkpoint(
    checkpoint: &Checkpoint,
    path: impl AsRef<Path>,
    config: &SaveConfig,
) -> Result<()> {
    let path = path.as_ref();
    let data = match &checkpoint.optimizer {
        Some(_) => encode(checkpoint, config)?,
        None => encode(&checkpoint.model, config)?,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;

    log::debug!(
        "saved {} parameters{} to {}",
        checkpoint.model.len(),
        if checkpoint.has_optimizer() {
            " and optimizer state"
        } else {
            ""
        },
        path.display()
    );
    Ok(())
}

fn encode<T: Serialize>(value: &T, config: &SaveConfig) -> Result<String> {
    match config.format {
        ModelFormat::Json => {
            let data = if config.pretty {
                serde_json::to_string_pretty(value)
            } else {
                serde_json::to_string(value)
            };
            data.map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))
        }
        ModelFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}"))),
    }
}
