//! Shared training state handed to callbacks

use super::{DataSource, LossFn, Model, RowLogger};
use crate::optim::Optimizer;
use crate::{Error, Result, Tensor};

/// Everything callbacks may read or change while the loop runs
///
/// Owned by the [`super::Learner`]; every callback handler receives it
/// mutably.
pub struct TrainState {
    pub model: Box<dyn Model>,
    pub data: Box<dyn DataSource>,
    pub loss_func: Box<dyn LossFn>,
    /// Created on the first `fit` (or `freeze_to`, `load`)
    pub opt: Option<Optimizer>,
    pub logger: Box<dyn RowLogger>,

    pub training: bool,
    pub epoch: usize,
    pub n_epoch: usize,
    /// Index of the batch in flight
    pub iter: usize,
    /// Number of batches in the current pass
    pub n_iter: usize,
    /// Training batches completed during this fit
    pub train_iter: usize,
    /// Fraction of the fit done
    pub pct_train: f32,

    pub xb: Tensor,
    pub yb: Tensor,
    pub pred: Tensor,
    pub loss: Tensor,
    /// Smoothed training loss, kept up to date by the recorder
    pub smooth_loss: Option<f32>,
}

impl TrainState {
    pub fn new(
        model: Box<dyn Model>,
        data: Box<dyn DataSource>,
        loss_func: Box<dyn LossFn>,
        logger: Box<dyn RowLogger>,
    ) -> Self {
        Self {
            model,
            data,
            loss_func,
            opt: None,
            logger,
            training: false,
            epoch: 0,
            n_epoch: 0,
            iter: 0,
            n_iter: 0,
            train_iter: 0,
            pct_train: 0.0,
            xb: Tensor::zeros(0, false),
            yb: Tensor::zeros(0, false),
            pred: Tensor::zeros(0, false),
            loss: Tensor::zeros(0, false),
            smooth_loss: None,
        }
    }

    /// The optimizer, or a configuration error if none was created yet
    pub fn opt(&self) -> Result<&Optimizer> {
        self.opt
            .as_ref()
            .ok_or_else(|| Error::Config("no optimizer has been created".to_string()))
    }

    /// Learning rate of the last parameter group
    pub fn lr(&self) -> Option<f32> {
        self.opt
            .as_ref()
            .and_then(|o| o.hypers().last())
            .and_then(|h| h.get("lr").copied())
    }

    /// Number of samples in the batch in flight
    pub fn batch_size(&self) -> usize {
        self.yb.len()
    }
}

impl std::fmt::Debug for TrainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainState")
            .field("opt", &self.opt)
            .field("training", &self.training)
            .field("epoch", &self.epoch)
            .field("n_epoch", &self.n_epoch)
            .field("iter", &self.iter)
            .field("n_iter", &self.n_iter)
            .field("train_iter", &self.train_iter)
            .field("pct_train", &self.pct_train)
            .field("smooth_loss", &self.smooth_loss)
            .finish_non_exhaustive()
    }
}
