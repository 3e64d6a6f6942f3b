//! Running statistics kept per parameter

use super::pipeline::{grad_of, GroupHypers, Stat};
use super::state::{ParamState, StateValue};
use crate::{Result, Tensor};
use ndarray::Array1;

fn l2_norm(a: &Array1<f32>) -> f32 {
    a.dot(a).sqrt()
}

/// Moving average of gradients under `grad_avg`
///
/// `grad_avg = mom * grad_avg + damp * grad` with `damp = 1 - mom` when
/// dampening, 1 otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct AverageGrad {
    pub dampening: bool,
}

impl AverageGrad {
    pub fn new(dampening: bool) -> Self {
        Self { dampening }
    }
}

impl Stat for AverageGrad {
    fn name(&self) -> &'static str {
        "average_grad"
    }

    fn defaults(&self) -> Vec<(&'static str, f32)> {
        vec![("mom", 0.9)]
    }

    fn required(&self) -> &'static [&'static str] {
        &["mom"]
    }

    fn update(
        &self,
        mut state: ParamState,
        param: &Tensor,
        hypers: &GroupHypers<'_>,
    ) -> Result<ParamState> {
        let mom = hypers.get("mom")?;
        let grad = grad_of(param)?;
        let damp = if self.dampening { 1.0 - mom } else { 1.0 };

        let avg = match state.array("grad_avg") {
            Some(prev) => prev * mom + &grad * damp,
            None => &grad * damp,
        };
        state.insert("grad_avg", StateValue::Array(avg));
        Ok(state)
    }
}

/// Moving average of squared gradients under `sqr_avg`
#[derive(Clone, Copy, Debug)]
pub struct AverageSqrGrad {
    pub dampening: bool,
}

impl AverageSqrGrad {
    pub fn new(dampening: bool) -> Self {
        Self { dampening }
    }
}

impl Default for AverageSqrGrad {
    fn default() -> Self {
        Self { dampening: true }
    }
}

impl Stat for AverageSqrGrad {
    fn name(&self) -> &'static str {
        "average_sqr_grad"
    }

    fn defaults(&self) -> Vec<(&'static str, f32)> {
        vec![("sqr_mom", 0.99)]
    }

    fn required(&self) -> &'static [&'static str] {
        &["sqr_mom"]
    }

    fn update(
        &self,
        mut state: ParamState,
        param: &Tensor,
        hypers: &GroupHypers<'_>,
    ) -> Result<ParamState> {
        let sqr_mom = hypers.get("sqr_mom")?;
        let grad = grad_of(param)?;
        let damp = if self.dampening { 1.0 - sqr_mom } else { 1.0 };
        let sq = &grad * &grad * damp;

        let avg = match state.array("sqr_avg") {
            Some(prev) => prev * sqr_mom + &sq,
            None => sq,
        };
        state.insert("sqr_avg", StateValue::Array(avg));
        Ok(state)
    }
}

/// Counts the updates applied to a parameter under `step`
#[derive(Clone, Copy, Debug, Default)]
pub struct StepStat;

impl Stat for StepStat {
    fn name(&self) -> &'static str {
        "step"
    }

    fn update(
        &self,
        mut state: ParamState,
        _param: &Tensor,
        _hypers: &GroupHypers<'_>,
    ) -> Result<ParamState> {
        let step = state.count("step").unwrap_or(0) + 1;
        state.insert("step", StateValue::Count(step));
        Ok(state)
    }
}

/// Layer-wise learning rate for LARC, stored under `local_lr`
///
/// Computed before weight decay touches the parameter.
#[derive(Clone, Copy, Debug)]
pub struct LarcLayerLr {
    pub clip: bool,
}

impl LarcLayerLr {
    pub fn new(clip: bool) -> Self {
        Self { clip }
    }
}

impl Default for LarcLayerLr {
    fn default() -> Self {
        Self { clip: true }
    }
}

impl Stat for LarcLayerLr {
    fn name(&self) -> &'static str {
        "larc_layer_lr"
    }

    fn defaults(&self) -> Vec<(&'static str, f32)> {
        vec![("trust_coeff", 0.02), ("wd", 0.0), ("eps", 1e-8)]
    }

    fn required(&self) -> &'static [&'static str] {
        &["lr", "trust_coeff", "wd", "eps"]
    }

    fn update(
        &self,
        mut state: ParamState,
        param: &Tensor,
        hypers: &GroupHypers<'_>,
    ) -> Result<ParamState> {
        let lr = hypers.get("lr")?;
        let trust_coeff = hypers.get("trust_coeff")?;
        let wd = hypers.get("wd")?;
        let eps = hypers.get("eps")?;

        let p_norm = l2_norm(param.data());
        let g_norm = l2_norm(&grad_of(param)?);
        let local_lr = lr * trust_coeff * p_norm / (g_norm + p_norm * wd + eps);

        let local_lr = if self.clip { lr.min(local_lr) } else { local_lr };
        state.insert("local_lr", StateValue::Scalar(local_lr));
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::Hypers;
    use approx::assert_abs_diff_eq;

    fn hypers(pairs: &[(&str, f32)]) -> Hypers {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn param_with_grad(data: Vec<f32>, grad: Vec<f32>) -> Tensor {
        let p = Tensor::from_vec(data, true);
        p.set_grad(Array1::from(grad));
        p
    }

    #[test]
    fn test_average_grad_without_dampening() {
        let h = hypers(&[("mom", 0.9)]);
        let p = param_with_grad(vec![0.0, 0.0], vec![1.0, 2.0]);
        let stat = AverageGrad::new(false);

        let state = stat
            .update(ParamState::new(), &p, &GroupHypers::new(0, &h))
            .unwrap();
        let state = stat.update(state, &p, &GroupHypers::new(0, &h)).unwrap();

        // 0.9 * 1 + 1 = 1.9
        let avg = state.array("grad_avg").unwrap();
        assert_abs_diff_eq!(avg[0], 1.9, epsilon = 1e-6);
        assert_abs_diff_eq!(avg[1], 3.8, epsilon = 1e-6);
    }

    #[test]
    fn test_average_grad_with_dampening() {
        let h = hypers(&[("mom", 0.9)]);
        let p = param_with_grad(vec![0.0], vec![1.0]);
        let state = AverageGrad::new(true)
            .update(ParamState::new(), &p, &GroupHypers::new(0, &h))
            .unwrap();
        assert_abs_diff_eq!(state.array("grad_avg").unwrap()[0], 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_average_sqr_grad() {
        let h = hypers(&[("sqr_mom", 0.99)]);
        let p = param_with_grad(vec![0.0], vec![2.0]);
        let state = AverageSqrGrad::default()
            .update(ParamState::new(), &p, &GroupHypers::new(0, &h))
            .unwrap();
        // (1 - 0.99) * 4
        assert_abs_diff_eq!(state.array("sqr_avg").unwrap()[0], 0.04, epsilon = 1e-5);
    }

    #[test]
    fn test_step_stat_counts() {
        let h = Hypers::new();
        let p = param_with_grad(vec![0.0], vec![1.0]);
        let mut state = ParamState::new();
        for _ in 0..3 {
            state = StepStat.update(state, &p, &GroupHypers::new(0, &h)).unwrap();
        }
        assert_eq!(state.count("step"), Some(3));
    }

    #[test]
    fn test_larc_layer_lr_clipped_to_lr() {
        let h = hypers(&[("lr", 0.1), ("trust_coeff", 10.0), ("wd", 0.0), ("eps", 1e-8)]);
        let p = param_with_grad(vec![3.0, 4.0], vec![0.0, 0.001]);

        let clipped = LarcLayerLr::new(true)
            .update(ParamState::new(), &p, &GroupHypers::new(0, &h))
            .unwrap();
        assert_abs_diff_eq!(clipped.scalar("local_lr").unwrap(), 0.1);

        let raw = LarcLayerLr::new(false)
            .update(ParamState::new(), &p, &GroupHypers::new(0, &h))
            .unwrap();
        assert!(raw.scalar("local_lr").unwrap() > 0.1);
    }

    #[test]
    fn test_stat_missing_hyper_is_error() {
        let h = Hypers::new();
        let p = param_with_grad(vec![0.0], vec![1.0]);
        assert!(AverageGrad::default()
            .update(ParamState::new(), &p, &GroupHypers::new(0, &h))
            .is_err());
    }
}
