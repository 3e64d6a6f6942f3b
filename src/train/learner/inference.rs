//! Inference-only passes: validation and prediction gathering

use super::Learner;
use crate::train::callback::{Callback, GatherPredsCallback, Predictions};
use crate::train::cancel::{Flow, Interrupt};
use crate::train::{Batch, Event, LogValue, VALID_IDX};
use crate::{Error, Result};

impl Learner {
    /// Run one validation pass over the validation set and return the
    /// recorded metric row
    pub fn validate(&mut self) -> Result<Vec<LogValue>> {
        self.validate_with(VALID_IDX, None, Vec::new())
    }

    /// Run one validation pass over `batches`, or dataset `ds_idx` when
    /// `batches` is `None`, with `cbs` attached and row logging silenced
    pub fn validate_with(
        &mut self,
        ds_idx: usize,
        batches: Option<Vec<Batch>>,
        cbs: Vec<Box<dyn Callback>>,
    ) -> Result<Vec<LogValue>> {
        let batches = match batches {
            Some(batches) => batches,
            None => self.state.data.batches(ds_idx)?,
        };

        let mut learn = self.added_cbs(cbs)?;
        let mut learn = learn.no_logging();
        learn
            .inference_pass(batches)
            .map_err(Interrupt::into_error)?;

        let row = learn.recorder().and_then(|r| r.values().last().cloned());
        row.ok_or_else(|| Error::Config("no metric row was recorded".to_string()))
    }

    /// Predictions and targets over dataset `ds_idx`, plus per-sample
    /// losses when `with_loss` is set
    pub fn get_preds(&mut self, ds_idx: usize, with_loss: bool) -> Result<Predictions> {
        let batches = self.state.data.batches(ds_idx)?;

        let mut learn = self.no_logging();
        let gather: Box<dyn Callback> = Box::new(GatherPredsCallback::new(with_loss));
        let mut learn = learn.added_cbs(vec![gather])?;
        let preds = if with_loss {
            learn.loss_not_reduced().gather_preds(batches)?
        } else {
            learn.gather_preds(batches)?
        };
        Ok(preds)
    }

    fn gather_preds(&mut self, batches: Vec<Batch>) -> Result<Predictions> {
        self.inference_pass(batches)
            .map_err(Interrupt::into_error)?;
        self.callback_mut::<GatherPredsCallback>()
            .map(GatherPredsCallback::take)
            .ok_or_else(|| Error::Config("prediction gatherer is not attached".to_string()))
    }

    /// The begin and end events of a fit around a single validation phase.
    /// Only the batch scope is opened.
    fn inference_pass(&mut self, batches: Vec<Batch>) -> Flow {
        self.dispatch_all(&Event::BEFORE_INFERENCE)?;
        self.all_batches(batches)?;
        self.dispatch_all(&Event::AFTER_INFERENCE)
    }
}
