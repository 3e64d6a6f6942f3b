//! Loss, learning-rate and metric history

use super::Callback;
use crate::train::logger::format_time;
use crate::train::{AvgLoss, AvgSmoothLoss, CallbackAction, LogValue, Metric, TrainState};
use crate::Result;
use std::time::Instant;

/// Records the smoothed loss and learning rate of every training batch and
/// one row of metrics per epoch, which it also sends to the row logger.
/// Always attached.
///
/// Columns are `epoch`, then `train_loss`, `valid_loss` and the name of each
/// metric (or `train_*`/`valid_*` pairs of the loss and every metric when
/// training metrics are on), then `time` if enabled. A phase that was
/// cancelled, or never ran, is recorded as `None` values.
pub struct Recorder {
    add_time: bool,
    train_metrics: bool,
    loss: AvgLoss,
    smooth_loss: AvgSmoothLoss,
    metrics: Vec<Box<dyn Metric>>,

    lrs: Vec<f32>,
    losses: Vec<f32>,
    values: Vec<Vec<LogValue>>,
    metric_names: Vec<String>,

    log: Vec<LogValue>,
    start_epoch: Option<Instant>,
    cancel_train: bool,
    cancel_valid: bool,
    train_logged: bool,
    valid_logged: bool,
}

impl Recorder {
    pub fn new(
        add_time: bool,
        train_metrics: bool,
        beta: f32,
        metrics: Vec<Box<dyn Metric>>,
    ) -> Self {
        Self {
            add_time,
            train_metrics,
            loss: AvgLoss::default(),
            smooth_loss: AvgSmoothLoss::new(beta),
            metrics,
            lrs: Vec::new(),
            losses: Vec::new(),
            values: Vec::new(),
            metric_names: Vec::new(),
            log: Vec::new(),
            start_epoch: None,
            cancel_train: false,
            cancel_valid: false,
            train_logged: false,
            valid_logged: false,
        }
    }

    /// Learning rate of the last group, per training batch
    pub fn lrs(&self) -> &[f32] {
        &self.lrs
    }

    /// Smoothed loss, per training batch
    pub fn losses(&self) -> &[f32] {
        &self.losses
    }

    /// One row per epoch, without the epoch index and the time
    pub fn values(&self) -> &[Vec<LogValue>] {
        &self.values
    }

    pub fn metric_names(&self) -> &[String] {
        &self.metric_names
    }

    pub fn metrics(&self) -> &[Box<dyn Metric>] {
        &self.metrics
    }

    fn n_train_cols(&self) -> usize {
        1 + if self.train_metrics { self.metrics.len() } else { 0 }
    }

    fn n_valid_cols(&self) -> usize {
        1 + self.metrics.len()
    }

    /// The loss followed by the metrics tracked during this phase
    fn phase_metrics<'a>(
        &'a mut self,
        training: bool,
    ) -> impl Iterator<Item = &'a mut (dyn Metric + 'static)> {
        let with_metrics = !training || self.train_metrics;
        let metrics: &mut [Box<dyn Metric>] = if with_metrics {
            &mut self.metrics
        } else {
            &mut []
        };
        std::iter::once(&mut self.loss as &mut (dyn Metric + 'static))
            .chain(metrics.iter_mut().map(|m| m.as_mut()))
    }

    fn phase_values(&mut self, training: bool) -> Vec<LogValue> {
        self.phase_metrics(training)
            .map(|m| LogValue::Float(m.value()))
            .collect()
    }
}

impl Callback for Recorder {
    fn run_after(&self) -> &[&str] {
        &["train_eval"]
    }

    fn begin_fit(&mut self, state: &mut TrainState) -> Result<CallbackAction> {
        self.lrs.clear();
        self.losses.clear();
        self.values.clear();

        let metric_names: Vec<String> = self.metrics.iter().map(|m| m.name()).collect();
        let mut names = vec!["epoch".to_string()];
        if self.train_metrics {
            let all: Vec<String> = std::iter::once(self.loss.name())
                .chain(metric_names)
                .collect();
            names.extend(all.iter().map(|n| format!("train_{n}")));
            names.extend(all.iter().map(|n| format!("valid_{n}")));
        } else {
            names.push("train_loss".to_string());
            names.push("valid_loss".to_string());
            names.extend(metric_names);
        }
        if self.add_time {
            names.push("time".to_string());
        }
        self.metric_names = names;
        self.smooth_loss.reset();
        state.logger.header(&self.metric_names);
        Ok(CallbackAction::Continue)
    }

    fn after_batch(&mut self, state: &mut TrainState) -> Result<CallbackAction> {
        self.smooth_loss.accumulate(state)?;
        let cancelled = if state.training {
            self.cancel_train
        } else {
            self.cancel_valid
        };
        if !cancelled {
            for metric in self.phase_metrics(state.training) {
                metric.accumulate(state)?;
            }
        }
        if !state.training {
            return Ok(CallbackAction::Continue);
        }

        if let Some(lr) = state.lr() {
            self.lrs.push(lr);
        }
        let smooth = self.smooth_loss.value();
        if let Some(loss) = smooth {
            self.losses.push(loss);
        }
        state.smooth_loss = smooth;
        Ok(CallbackAction::Continue)
    }

    fn begin_epoch(&mut self, state: &mut TrainState) -> Result<CallbackAction> {
        self.cancel_train = false;
        self.cancel_valid = false;
        self.train_logged = false;
        self.valid_logged = false;
        self.start_epoch = self.add_time.then(Instant::now);
        self.log = vec![LogValue::Int(state.epoch)];
        Ok(CallbackAction::Continue)
    }

    fn begin_train(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        self.phase_metrics(true).for_each(|m| m.reset());
        Ok(CallbackAction::Continue)
    }

    fn begin_validate(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        self.phase_metrics(false).for_each(|m| m.reset());
        Ok(CallbackAction::Continue)
    }

    fn after_cancel_train(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        self.cancel_train = true;
        Ok(CallbackAction::Continue)
    }

    fn after_cancel_validate(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        self.cancel_valid = true;
        Ok(CallbackAction::Continue)
    }

    fn after_train(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        let values = if self.cancel_train {
            vec![LogValue::Float(None); self.n_train_cols()]
        } else {
            self.phase_values(true)
        };
        self.log.extend(values);
        self.train_logged = true;
        Ok(CallbackAction::Continue)
    }

    fn after_validate(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        let values = if self.cancel_valid {
            vec![LogValue::Float(None); self.n_valid_cols()]
        } else {
            self.phase_values(false)
        };
        self.log.extend(values);
        self.valid_logged = true;
        Ok(CallbackAction::Continue)
    }

    fn after_epoch(&mut self, state: &mut TrainState) -> Result<CallbackAction> {
        // a validation-only pass keeps just its own columns
        if self.train_logged || !self.valid_logged {
            let width = 1 + self.n_train_cols() + self.n_valid_cols();
            self.log.resize(width.max(self.log.len()), LogValue::Float(None));
        }
        self.values
            .push(self.log.get(1..).map(<[_]>::to_vec).unwrap_or_default());
        if let Some(start) = self.start_epoch {
            self.log
                .push(LogValue::Text(format_time(start.elapsed().as_secs_f64())));
        }
        state.logger.log_row(&self.log);
        Ok(CallbackAction::Continue)
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("metric_names", &self.metric_names)
            .field("values", &self.values)
            .field("n_losses", &self.losses.len())
            .finish_non_exhaustive()
    }
}
