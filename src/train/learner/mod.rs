//! The training engine

mod checkpoint;
mod fit;
mod guards;
mod inference;


pub use guards::{AddedCallbacks, LossNotReduced, NoLogging};

use super::callback::{Callback, CallbackManager, Recorder, TrainEvalCallback};
use super::cancel::{CancelSignal, Flow, Interrupt};
use super::{DataSource, Event, LearnerConfig, LossFn, Metric, Model, PrintLogger, RowLogger, TrainState};
use crate::optim::Optimizer;
use crate::Result;

/// Groups a model, its data and a loss function, and trains the model
///
/// The learner owns the shared [`TrainState`] and the attached callbacks.
/// [`TrainEvalCallback`] and [`Recorder`] are attached on construction.
///
/// # Example
///
/// ```no_run
/// use aprendiz::train::{AffineModel, Batch, DataBunch, FitOptions, Learner, LearnerConfig, MSELoss};
///
/// let train = vec![Batch::from_vecs(vec![0.0, 1.0, 2.0], vec![1.0, 3.0, 5.0])];
/// let valid = vec![Batch::from_vecs(vec![3.0], vec![7.0])];
///
/// let mut learn = Learner::new(
///     AffineModel::new(0.0, 0.0),
///     DataBunch::new(train, valid),
///     MSELoss::default(),
///     LearnerConfig::default(),
///     Vec::new(),
/// )
/// .unwrap();
///
/// learn.fit(5, FitOptions::new().lr(0.05f32)).unwrap();
/// ```
pub struct Learner {
    state: TrainState,
    cbs: CallbackManager,
    config: LearnerConfig,
}

impl Learner {
    pub fn new(
        model: impl Model + 'static,
        data: impl DataSource + 'static,
        loss_func: impl LossFn + 'static,
        config: LearnerConfig,
        metrics: Vec<Box<dyn Metric>>,
    ) -> Result<Self> {
        config.validate()?;
        let state = TrainState::new(
            Box::new(model),
            Box::new(data),
            Box::new(loss_func),
            Box::new(PrintLogger),
        );
        let recorder = Recorder::new(
            config.add_time,
            config.train_metrics,
            config.smooth_beta,
            metrics,
        );
        let mut learn = Self {
            state,
            cbs: CallbackManager::new(),
            config,
        };
        learn.add_cb(TrainEvalCallback)?;
        learn.add_cb(recorder)?;
        Ok(learn)
    }

    pub fn state(&self) -> &TrainState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TrainState {
        &mut self.state
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn model(&self) -> &dyn Model {
        self.state.model.as_ref()
    }

    pub fn opt(&self) -> Option<&Optimizer> {
        self.state.opt.as_ref()
    }

    pub fn opt_mut(&mut self) -> Option<&mut Optimizer> {
        self.state.opt.as_mut()
    }

    /// Replace the sink of the per-epoch metric rows
    pub fn set_logger(&mut self, logger: impl RowLogger + 'static) {
        self.state.logger = Box::new(logger);
    }

    pub fn recorder(&self) -> Option<&Recorder> {
        self.cbs.get::<Recorder>()
    }

    /// The attached callback of type `T`
    pub fn callback<T: Callback + 'static>(&self) -> Option<&T> {
        self.cbs.get::<T>()
    }

    pub fn callback_mut<T: Callback + 'static>(&mut self) -> Option<&mut T> {
        self.cbs.get_mut::<T>()
    }

    /// Names of the attached callbacks, in dispatch order
    pub fn callback_names(&self) -> Vec<&str> {
        self.cbs.names()
    }

    pub fn add_cb(&mut self, cb: impl Callback + 'static) -> Result<()> {
        self.cbs.add(Box::new(cb))
    }

    pub fn add_cbs(&mut self, cbs: Vec<Box<dyn Callback>>) -> Result<()> {
        cbs.into_iter().try_for_each(|cb| self.cbs.add(cb))
    }

    /// Detach the callback called `name`
    pub fn remove_cb(&mut self, name: &str) -> Option<Box<dyn Callback>> {
        self.cbs.remove(name)
    }

    /// Attach `cbs` until the returned guard is dropped
    pub fn added_cbs(&mut self, cbs: Vec<Box<dyn Callback>>) -> Result<AddedCallbacks<'_>> {
        AddedCallbacks::new(self, cbs)
    }

    /// Silence the row logger until the returned guard is dropped
    pub fn no_logging(&mut self) -> NoLogging<'_> {
        NoLogging::new(self)
    }

    /// Make the loss per-sample until the returned guard is dropped
    pub fn loss_not_reduced(&mut self) -> LossNotReduced<'_> {
        LossNotReduced::new(self)
    }

    /// Build the optimizer over the model's parameter groups
    ///
    /// Unless `wd_bn_bias` is set, normalisation and bias parameters are
    /// excluded from weight decay; with `train_bn`, normalisation
    /// parameters stay trainable when their group is frozen.
    pub fn create_opt(&mut self) -> Result<()> {
        let model = &self.state.model;
        let mut opt = self
            .config
            .opt
            .build(model.param_groups(), self.config.lr.clone())?;

        let norm = model.norm_params();
        if !self.config.wd_bn_bias {
            for &idx in norm.iter().chain(model.bias_params().iter()) {
                opt.state_mut(idx).set_flag("do_wd", false);
            }
        }
        if self.config.train_bn {
            for &idx in &norm {
                opt.state_mut(idx).set_flag("force_train", true);
            }
        }
        self.state.opt = Some(opt);
        Ok(())
    }

    /// Freeze parameter groups `< n`; see [`Optimizer::freeze_to`]
    pub fn freeze_to(&mut self, n: isize) -> Result<()> {
        if self.state.opt.is_none() {
            self.create_opt()?;
        }
        let state = &mut self.state;
        match state.opt.as_mut() {
            Some(opt) => opt.freeze_to(n, state.model.parameters_mut()),
            None => Ok(()),
        }
    }

    /// Freeze every group but the last
    pub fn freeze(&mut self) -> Result<()> {
        self.freeze_to(-1)
    }

    pub fn unfreeze(&mut self) -> Result<()> {
        self.freeze_to(0)
    }

    fn dispatch(&mut self, event: Event) -> Flow {
        self.cbs.dispatch(event, &mut self.state)
    }

    fn dispatch_all(&mut self, events: &[Event]) -> Flow {
        events.iter().try_for_each(|&event| self.dispatch(event))
    }

    /// Run `body`, turning a matching `signal` into `cancel_event`, then
    /// always dispatch `after_event`
    ///
    /// An interrupt raised while cleaning up replaces the body's outcome,
    /// except that a fatal error from the body is never replaced.
    fn scope(
        &mut self,
        signal: CancelSignal,
        cancel_event: Event,
        after_event: Event,
        body: impl FnOnce(&mut Self) -> Flow,
    ) -> Flow {
        let result = match body(self) {
            Err(Interrupt::Cancel(s)) if s == signal => self.dispatch(cancel_event),
            other => other,
        };
        let cleanup = self.dispatch(after_event);
        match (result, cleanup) {
            (Err(Interrupt::Fatal(e)), _) => Err(Interrupt::Fatal(e)),
            (_, Err(interrupt)) => Err(interrupt),
            (result, Ok(())) => result,
        }
    }
}

impl std::fmt::Debug for Learner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Learner")
            .field("state", &self.state)
            .field("cbs", &self.cbs)
            .field("config", &self.config)
            .finish()
    }
}
