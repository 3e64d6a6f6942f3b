//! Iteration counters and train/eval mode

use super::Callback;
use crate::train::{CallbackAction, TrainState};
use crate::Result;

/// Tracks the iteration counters and switches the model between training
/// and evaluation. Always attached.
#[derive(Clone, Debug, Default)]
pub struct TrainEvalCallback;

impl Callback for TrainEvalCallback {
    fn begin_fit(&mut self, state: &mut TrainState) -> Result<CallbackAction> {
        state.train_iter = 0;
        state.pct_train = 0.0;
        let device = state.data.device();
        state.model.to_device(device);
        Ok(CallbackAction::Continue)
    }

    fn after_batch(&mut self, state: &mut TrainState) -> Result<CallbackAction> {
        if !state.training {
            return Ok(CallbackAction::Continue);
        }
        let total = state.n_iter * state.n_epoch;
        if total > 0 {
            state.pct_train += 1.0 / total as f32;
        }
        state.train_iter += 1;
        Ok(CallbackAction::Continue)
    }

    fn begin_train(&mut self, state: &mut TrainState) -> Result<CallbackAction> {
        if state.n_epoch > 0 {
            state.pct_train = state.epoch as f32 / state.n_epoch as f32;
        }
        state.model.set_training(true);
        state.training = true;
        Ok(CallbackAction::Continue)
    }

    fn begin_validate(&mut self, state: &mut TrainState) -> Result<CallbackAction> {
        state.model.set_training(false);
        state.training = false;
        Ok(CallbackAction::Continue)
    }
}
