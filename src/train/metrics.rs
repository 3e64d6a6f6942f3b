//! Metrics accumulated over a pass
//!
//! A [`Metric`] is reset at the start of each training or validation pass,
//! folds in every batch, and reports one aggregate value.

use super::names::class2attr;
use super::TrainState;
use crate::{Result, Tensor};

/// Trait for accumulated metrics
pub trait Metric {
    /// Clear the accumulated state
    fn reset(&mut self);

    /// Fold in the batch currently held by `state`
    fn accumulate(&mut self, state: &TrainState) -> Result<()>;

    /// Current aggregate; `None` before anything was accumulated
    fn value(&self) -> Option<f32>;

    /// Column name, derived from the type name by default
    fn name(&self) -> String {
        class2attr(std::any::type_name::<Self>(), "Metric")
    }
}

/// Batch-size weighted average of a per-batch function of predictions and
/// targets
pub struct AvgMetric {
    name: String,
    func: Box<dyn Fn(&Tensor, &Tensor) -> f32>,
    total: f32,
    count: usize,
}

impl AvgMetric {
    pub fn new(name: impl Into<String>, func: impl Fn(&Tensor, &Tensor) -> f32 + 'static) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
            total: 0.0,
            count: 0,
        }
    }
}

impl Metric for AvgMetric {
    fn reset(&mut self) {
        self.total = 0.0;
        self.count = 0;
    }

    fn accumulate(&mut self, state: &TrainState) -> Result<()> {
        let bs = state.batch_size();
        self.total += (self.func)(&state.pred, &state.yb) * bs as f32;
        self.count += bs;
        Ok(())
    }

    fn value(&self) -> Option<f32> {
        (self.count != 0).then(|| self.total / self.count as f32)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

impl std::fmt::Debug for AvgMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvgMetric")
            .field("name", &self.name)
            .field("total", &self.total)
            .field("count", &self.count)
            .finish()
    }
}

/// Batch-size weighted average of the loss
#[derive(Clone, Debug, Default)]
pub struct AvgLoss {
    total: f32,
    count: usize,
}

impl Metric for AvgLoss {
    fn reset(&mut self) {
        self.total = 0.0;
        self.count = 0;
    }

    fn accumulate(&mut self, state: &TrainState) -> Result<()> {
        let bs = state.batch_size();
        self.total += state.loss.mean() * bs as f32;
        self.count += bs;
        Ok(())
    }

    fn value(&self) -> Option<f32> {
        (self.count != 0).then(|| self.total / self.count as f32)
    }

    fn name(&self) -> String {
        "loss".to_string()
    }
}

/// Exponentially weighted loss with bias correction
///
/// `val = beta * val + (1 - beta) * loss`, reported as
/// `val / (1 - beta^count)`.
#[derive(Clone, Debug)]
pub struct AvgSmoothLoss {
    beta: f32,
    count: i32,
    val: f32,
}

impl AvgSmoothLoss {
    pub fn new(beta: f32) -> Self {
        Self {
            beta,
            count: 0,
            val: 0.0,
        }
    }

    /// Feed one loss value directly
    pub fn update(&mut self, loss: f32) {
        self.count += 1;
        self.val = loss + self.beta * (self.val - loss);
    }

    /// Smoothed value before bias correction
    pub fn raw(&self) -> f32 {
        self.val
    }
}

impl Default for AvgSmoothLoss {
    fn default() -> Self {
        Self::new(0.98)
    }
}

impl Metric for AvgSmoothLoss {
    fn reset(&mut self) {
        self.count = 0;
        self.val = 0.0;
    }

    fn accumulate(&mut self, state: &TrainState) -> Result<()> {
        self.update(state.loss.mean());
        Ok(())
    }

    fn value(&self) -> Option<f32> {
        (self.count != 0).then(|| self.val / (1.0 - self.beta.powi(self.count)))
    }

    fn name(&self) -> String {
        "smooth_loss".to_string()
    }
}

/// Mean absolute error between predictions and targets
pub fn mae(pred: &Tensor, targ: &Tensor) -> f32 {
    (pred.data() - targ.data()).mapv(f32::abs).mean().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::{AffineModel, DataBunch, MSELoss, NoopLogger};
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn state_with(pred: Vec<f32>, yb: Vec<f32>, loss: Vec<f32>) -> TrainState {
        let mut state = TrainState::new(
            Box::new(AffineModel::new(1.0, 0.0)),
            Box::new(DataBunch::default()),
            Box::new(MSELoss::default()),
            Box::new(NoopLogger),
        );
        state.pred = Tensor::from_vec(pred, false);
        state.yb = Tensor::from_vec(yb, false);
        state.loss = Tensor::from_vec(loss, false);
        state
    }

    #[test]
    fn test_avg_metric_weights_by_batch_size() {
        let mut metric = AvgMetric::new("mae", mae);
        assert_eq!(metric.value(), None);

        metric
            .accumulate(&state_with(vec![1.0, 1.0, 1.0], vec![0.0, 0.0, 0.0], vec![0.0]))
            .unwrap();
        metric
            .accumulate(&state_with(vec![0.0], vec![0.0], vec![0.0]))
            .unwrap();
        // (1 * 3 + 0 * 1) / 4
        assert_abs_diff_eq!(metric.value().unwrap(), 0.75, epsilon = 1e-6);
        assert_eq!(metric.name(), "mae");

        metric.reset();
        assert_eq!(metric.value(), None);
    }

    #[test]
    fn test_avg_loss() {
        let mut metric = AvgLoss::default();
        metric
            .accumulate(&state_with(vec![0.0; 2], vec![0.0; 2], vec![1.0]))
            .unwrap();
        metric
            .accumulate(&state_with(vec![0.0; 2], vec![0.0; 2], vec![3.0]))
            .unwrap();
        assert_abs_diff_eq!(metric.value().unwrap(), 2.0, epsilon = 1e-6);
        assert_eq!(metric.name(), "loss");
    }

    #[test]
    fn test_avg_loss_unreduced() {
        let mut metric = AvgLoss::default();
        metric
            .accumulate(&state_with(vec![0.0; 2], vec![0.0; 2], vec![1.0, 3.0]))
            .unwrap();
        assert_abs_diff_eq!(metric.value().unwrap(), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_smooth_loss_bias_correction() {
        let mut metric = AvgSmoothLoss::new(0.98);
        assert_eq!(metric.value(), None);

        for _ in 0..3 {
            metric.update(1.0);
            let corrected = metric.value().unwrap();
            assert!(metric.raw() < corrected);
            assert_abs_diff_eq!(corrected, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_default_name_from_type() {
        struct RootMeanSquareMetric;
        impl Metric for RootMeanSquareMetric {
            fn reset(&mut self) {}
            fn accumulate(&mut self, _state: &TrainState) -> Result<()> {
                Ok(())
            }
            fn value(&self) -> Option<f32> {
                None
            }
        }
        assert_eq!(RootMeanSquareMetric.name(), "root_mean_square");
    }

    proptest! {
        #[test]
        fn prop_smooth_loss_between_raw_and_mean(
            beta in 0.5f32..0.99,
            losses in prop::collection::vec(0.1f32..10.0, 1..20)
        ) {
            let mut metric = AvgSmoothLoss::new(beta);
            for &l in &losses {
                metric.update(l);
            }
            let min = losses.iter().cloned().fold(f32::INFINITY, f32::min);
            let max = losses.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let value = metric.value().unwrap();
            // a convex combination of the inputs
            prop_assert!(value >= min - 1e-3 && value <= max + 1e-3);
            prop_assert!(metric.raw() <= value + 1e-6);
        }
    }
}
