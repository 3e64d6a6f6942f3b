//! Data sources

use super::Batch;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Where a model's parameters should live
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Gpu(usize),
}

/// Index of the training set in a [`DataSource`]
pub const TRAIN_IDX: usize = 0;
/// Index of the validation set in a [`DataSource`]
pub const VALID_IDX: usize = 1;

/// Finite, restartable sequences of batches
///
/// Dataset 0 is the training set and dataset 1 the validation set. Every
/// call to [`DataSource::batches`] starts the sequence over.
pub trait DataSource {
    fn batches(&self, ds_idx: usize) -> Result<Vec<Batch>>;

    /// Device the model should be moved to before fitting
    fn device(&self) -> Device {
        Device::Cpu
    }

    fn train(&self) -> Result<Vec<Batch>> {
        self.batches(TRAIN_IDX)
    }

    fn valid(&self) -> Result<Vec<Batch>> {
        self.batches(VALID_IDX)
    }
}

/// In-memory datasets
#[derive(Clone, Debug, Default)]
pub struct DataBunch {
    datasets: Vec<Vec<Batch>>,
    device: Device,
}

impl DataBunch {
    pub fn new(train: Vec<Batch>, valid: Vec<Batch>) -> Self {
        Self {
            datasets: vec![train, valid],
            device: Device::Cpu,
        }
    }

    /// Add a further dataset (a test set, say) and return its index
    pub fn push(&mut self, batches: Vec<Batch>) -> usize {
        self.datasets.push(batches);
        self.datasets.len() - 1
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn n_datasets(&self) -> usize {
        self.datasets.len()
    }
}

impl DataSource for DataBunch {
    fn batches(&self, ds_idx: usize) -> Result<Vec<Batch>> {
        self.datasets.get(ds_idx).cloned().ok_or_else(|| {
            Error::InvalidParameter(format!(
                "dataset {ds_idx} requested but there are only {}",
                self.datasets.len()
            ))
        })
    }

    fn device(&self) -> Device {
        self.device
    }
}
