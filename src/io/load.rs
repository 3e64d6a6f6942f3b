//! Checkpoint loading

use super::checkpoint::Checkpoint;
use super::format::ModelFormat;
use super::model::ModelState;
use crate::optim::OptimizerState;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A checkpoint file whose optimizer section is still an undecoded value
#[derive(Deserialize)]
struct Record<V> {
    model: ModelState,
    #[serde(default)]
    optimizer: Option<V>,
}

/// Load a checkpoint from a file
///
/// The format is detected from the file extension. Both full checkpoints
/// and bare model states are accepted; the latter load with no optimizer.
/// A malformed optimizer section is an error here; use [`read_checkpoint`]
/// to get at the model regardless.
///
/// # Example
///
/// ```no_run
/// use aprendiz::io::load_checkpoint;
///
/// let ckpt = load_checkpoint("models/model.json").unwrap();
/// println!("{} parameters", ckpt.model.len());
/// ```
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let (model, optimizer) = read_checkpoint(path)?;
    Ok(Checkpoint::new(model, optimizer.transpose()?))
}

/// Load a checkpoint, decoding the model and the optimizer separately
///
/// The outer result fails when the file or its model section can't be
/// read. The optimizer is `None` when the file holds none, and
/// `Some(Err(_))` when it holds one that doesn't decode.
pub fn read_checkpoint(
    path: impl AsRef<Path>,
) -> Result<(ModelState, Option<Result<OptimizerState>>)> {
    let path = path.as_ref();

    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Serialization("File has no extension".to_string()))?;

    let format = ModelFormat::from_extension(ext)
        .ok_or_else(|| Error::Serialization(format!("Unsupported file extension: {ext}")))?;

    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;

    match format {
        ModelFormat::Json => split_record::<serde_json::Value>(&content, format, |v| {
            serde_json::from_value(v).map_err(|e| {
                Error::Serialization(format!("Invalid optimizer state in checkpoint: {e}"))
            })
        }),
        ModelFormat::Yaml => split_record::<serde_yaml::Value>(&content, format, |v| {
            serde_yaml::from_value(v).map_err(|e| {
                Error::Serialization(format!("Invalid optimizer state in checkpoint: {e}"))
            })
        }),
    }
}

fn split_record<V: DeserializeOwned + Default>(
    content: &str,
    format: ModelFormat,
    decode_opt: impl FnOnce(V) -> Result<OptimizerState>,
) -> Result<(ModelState, Option<Result<OptimizerState>>)> {
    match decode::<Record<V>>(content, format) {
        Ok(record) => Ok((record.model, record.optimizer.map(decode_opt))),
        Err(record_err) => match decode::<ModelState>(content, format) {
            Ok(model) => Ok((model, None)),
            Err(_) => Err(record_err),
        },
    }
}

fn decode<T: DeserializeOwned>(content: &str, format: ModelFormat) -> Result<T> {
    match format {
        ModelFormat::Json => serde_json::from_str(content)
            .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {e}"))),
        ModelFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| Error::Serialization(format!("YAML deserialization failed: {e}"))),
    }
}
