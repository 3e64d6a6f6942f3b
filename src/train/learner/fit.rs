//! The fit loop: nested fit, epoch, phase and batch scopes

use super::Learner;
use crate::optim::HyperValue;
use crate::train::cancel::{CancelSignal, Flow, Interrupt};
use crate::train::{Batch, Event, FitOptions};
use crate::Result;

impl Learner {
    /// Train for `n_epoch` epochs
    ///
    /// Callbacks in `options` are attached for this call only. The
    /// optimizer is created on the first call, or again with
    /// [`FitOptions::reset_opt`]; its `lr` and `wd` hypers are then set from
    /// `options`, falling back to the learner's configuration.
    ///
    /// A cancellation signal is handled by its scope and never surfaces,
    /// except when no enclosing scope matches it, in which case it is
    /// returned as [`crate::Error::Cancelled`].
    pub fn fit(&mut self, n_epoch: usize, options: FitOptions) -> Result<()> {
        let FitOptions {
            lr,
            wd,
            cbs,
            reset_opt,
        } = options;

        let mut learn = self.added_cbs(cbs)?;
        if reset_opt || learn.state.opt.is_none() {
            learn.create_opt()?;
        }
        let lr = lr.unwrap_or_else(|| learn.config.lr.clone());
        let wd = HyperValue::Scalar(wd.unwrap_or(learn.config.wd));
        if let Some(opt) = learn.state.opt.as_mut() {
            opt.set_hypers([("lr", lr), ("wd", wd)])?;
        }

        log::debug!("fitting for {n_epoch} epochs");
        learn.do_fit(n_epoch).map_err(Interrupt::into_error)
    }

    fn do_fit(&mut self, n_epoch: usize) -> Flow {
        self.scope(
            CancelSignal::Fit,
            Event::AfterCancelFit,
            Event::AfterFit,
            |learn| {
                learn.state.n_epoch = n_epoch;
                learn.dispatch(Event::BeginFit)?;
                (0..n_epoch).try_for_each(|epoch| learn.do_epoch(epoch))
            },
        )
    }

    fn do_epoch(&mut self, epoch: usize) -> Flow {
        self.scope(
            CancelSignal::Epoch,
            Event::AfterCancelEpoch,
            Event::AfterEpoch,
            |learn| {
                learn.state.epoch = epoch;
                learn.dispatch(Event::BeginEpoch)?;
                learn.do_epoch_train()?;
                learn.do_epoch_validate()
            },
        )
    }

    fn do_epoch_train(&mut self) -> Flow {
        self.scope(
            CancelSignal::Train,
            Event::AfterCancelTrain,
            Event::AfterTrain,
            |learn| {
                let batches = learn.state.data.train()?;
                learn.dispatch(Event::BeginTrain)?;
                learn.all_batches(batches)
            },
        )
    }

    fn do_epoch_validate(&mut self) -> Flow {
        self.scope(
            CancelSignal::Valid,
            Event::AfterCancelValidate,
            Event::AfterValidate,
            |learn| {
                let batches = learn.state.data.valid()?;
                learn.dispatch(Event::BeginValidate)?;
                learn.all_batches(batches)
            },
        )
    }

    pub(super) fn all_batches(&mut self, batches: Vec<Batch>) -> Flow {
        self.state.n_iter = batches.len();
        batches
            .into_iter()
            .enumerate()
            .try_for_each(|(i, batch)| self.one_batch(i, batch))
    }

    fn one_batch(&mut self, i: usize, batch: Batch) -> Flow {
        self.scope(
            CancelSignal::Batch,
            Event::AfterCancelBatch,
            Event::AfterBatch,
            |learn| learn.batch_body(i, batch),
        )
    }

    fn batch_body(&mut self, i: usize, batch: Batch) -> Flow {
        self.state.iter = i;
        self.state.xb = batch.inputs;
        self.state.yb = batch.targets;
        self.dispatch(Event::BeginBatch)?;

        let state = &mut self.state;
        let pred = state.model.forward(&state.xb)?;
        // no gradient is tracked outside of training
        state.pred = if state.training { pred } else { pred.detach() };
        self.dispatch(Event::AfterPred)?;

        let state = &mut self.state;
        state.loss = state.loss_func.forward(&state.pred, &state.yb)?;
        self.dispatch(Event::AfterLoss)?;
        if !self.state.training {
            return Ok(());
        }

        crate::backward(&mut self.state.loss, None);
        self.dispatch(Event::AfterBackward)?;

        let state = &mut self.state;
        if let Some(opt) = state.opt.as_mut() {
            opt.step(state.model.parameters_mut())?;
        }
        self.dispatch(Event::AfterStep)?;

        let state = &self.state;
        if let Some(opt) = state.opt.as_ref() {
            opt.zero_grad(state.model.parameters());
        }
        Ok(())
    }
}
