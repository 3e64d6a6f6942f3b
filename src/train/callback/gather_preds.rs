//! Gathering predictions during an inference pass

use super::Callback;
use crate::train::{CallbackAction, TrainState};
use crate::Result;
use ndarray::Array1;

/// Predictions and targets of a whole dataset
#[derive(Clone, Debug, PartialEq)]
pub struct Predictions {
    pub preds: Array1<f32>,
    pub targets: Array1<f32>,
    /// Per-sample losses, when requested
    pub losses: Option<Array1<f32>>,
}

/// Saves predictions, targets and optionally losses of every batch
#[derive(Clone, Debug, Default)]
pub struct GatherPredsCallback {
    with_loss: bool,
    preds: Vec<f32>,
    targets: Vec<f32>,
    losses: Vec<f32>,
}

impl GatherPredsCallback {
    pub fn new(with_loss: bool) -> Self {
        Self {
            with_loss,
            ..Self::default()
        }
    }

    /// Concatenate what has been gathered, leaving the buffers empty
    pub fn take(&mut self) -> Predictions {
        Predictions {
            preds: Array1::from(std::mem::take(&mut self.preds)),
            targets: Array1::from(std::mem::take(&mut self.targets)),
            losses: self
                .with_loss
                .then(|| Array1::from(std::mem::take(&mut self.losses))),
        }
    }
}

impl Callback for GatherPredsCallback {
    fn begin_validate(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        self.preds.clear();
        self.targets.clear();
        self.losses.clear();
        Ok(CallbackAction::Continue)
    }

    fn after_batch(&mut self, state: &mut TrainState) -> Result<CallbackAction> {
        self.preds.extend(state.pred.data().iter().copied());
        self.targets.extend(state.yb.data().iter().copied());
        if self.with_loss {
            self.losses.extend(state.loss.data().iter().copied());
        }
        Ok(CallbackAction::Continue)
    }
}
