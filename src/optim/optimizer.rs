//! Optimizer over parameter groups

use super::hyper::{HyperValue, Hypers};
use super::pipeline::{GroupHypers, Stat, StepArgs, Stepper};
use super::state::{ParamState, KEEP_ON_CLEAR};
use crate::{Error, Result, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Serialized optimizer: per-parameter state in group order, then one
/// hyperparameter map per group
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    pub state: Vec<ParamState>,
    pub hypers: Vec<Hypers>,
}

/// Updates the parameters of a model through a pipeline of [`Stat`]s and
/// [`Stepper`]s
///
/// Parameters are identified by their index in the model's flat parameter
/// list. Each parameter group is an ordered list of such indices and owns
/// one set of hyperparameters.
pub struct Optimizer {
    param_groups: Vec<Vec<usize>>,
    stats: Vec<Box<dyn Stat>>,
    steppers: Vec<Box<dyn Stepper>>,
    hypers: Vec<Hypers>,
    state: BTreeMap<usize, ParamState>,
    frozen_idx: usize,
}

impl Optimizer {
    /// Build an optimizer
    ///
    /// Hyperparameter defaults are merged in order: those declared by the
    /// stats, then by the steppers, then `defaults`. Later entries win.
    pub fn new(
        param_groups: Vec<Vec<usize>>,
        steppers: Vec<Box<dyn Stepper>>,
        stats: Vec<Box<dyn Stat>>,
        defaults: Vec<(&str, HyperValue)>,
    ) -> Result<Self> {
        if param_groups.is_empty() {
            return Err(Error::Config(
                "an optimizer needs at least one parameter group".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for &idx in param_groups.iter().flatten() {
            if !seen.insert(idx) {
                return Err(Error::Config(format!(
                    "parameter {idx} appears in more than one parameter group"
                )));
            }
        }

        let mut merged: Vec<(String, HyperValue)> = Vec::new();
        let declared = stats
            .iter()
            .flat_map(|s| s.defaults())
            .chain(steppers.iter().flat_map(|s| s.defaults()))
            .map(|(k, v)| (k.to_string(), HyperValue::Scalar(v)))
            .chain(defaults.into_iter().map(|(k, v)| (k.to_string(), v)));
        for (key, value) in declared {
            match merged.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => merged.push((key, value)),
            }
        }

        let n_groups = param_groups.len();
        let mut opt = Self {
            param_groups,
            stats,
            steppers,
            hypers: vec![Hypers::new(); n_groups],
            state: BTreeMap::new(),
            frozen_idx: 0,
        };
        opt.set_hypers(merged.iter().map(|(k, v)| (k.as_str(), v.clone())))?;
        opt.check_required(&opt.hypers)?;
        Ok(opt)
    }

    fn check_required(&self, hypers: &[Hypers]) -> Result<()> {
        let required = self
            .stats
            .iter()
            .flat_map(|s| s.required())
            .chain(self.steppers.iter().flat_map(|s| s.required()));
        for key in required {
            for (group, h) in hypers.iter().enumerate() {
                if !h.contains_key(*key) {
                    return Err(Error::MissingHyper {
                        key: key.to_string(),
                        group,
                    });
                }
            }
        }
        Ok(())
    }

    /// Apply one update to every parameter that has a pending gradient
    ///
    /// For each such parameter, in group order, the state is folded through
    /// every stat and the steppers are then applied left to right.
    pub fn step(&mut self, params: &mut [Tensor]) -> Result<()> {
        for (g, group) in self.param_groups.iter().enumerate() {
            let hypers = GroupHypers::new(g, &self.hypers[g]);
            for &idx in group {
                let param = param_at(params, g, idx)?;
                if !param.has_grad() {
                    continue;
                }

                // the stored state only changes once the whole update succeeds
                let mut state = self.state.get(&idx).cloned().unwrap_or_default();
                for stat in &self.stats {
                    state = stat.update(state, param, &hypers)?;
                }
                let args = StepArgs::new(&state, hypers);
                for stepper in &self.steppers {
                    stepper.step(param, &args)?;
                }
                self.state.insert(idx, state);
            }
        }
        Ok(())
    }

    /// Drop the gradient of every parameter in the groups
    pub fn zero_grad(&self, params: &[Tensor]) {
        for &idx in self.param_groups.iter().flatten() {
            if let Some(p) = params.get(idx) {
                if p.has_grad() {
                    p.zero_grad();
                }
            }
        }
    }

    /// Set one hyperparameter in every group
    ///
    /// See [`HyperValue::resolve`] for how `value` is spread over groups.
    pub fn set_hyper(&mut self, name: &str, value: impl Into<HyperValue>) -> Result<()> {
        let values = value.into().resolve(name, self.param_groups.len())?;
        for (h, v) in self.hypers.iter_mut().zip(values) {
            h.insert(name.to_string(), v);
        }
        Ok(())
    }

    /// Set several hyperparameters; nothing changes if any of them fails to
    /// resolve
    pub fn set_hypers<'a, I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, HyperValue)>,
    {
        let n = self.param_groups.len();
        let resolved = pairs
            .into_iter()
            .map(|(name, value)| Ok((name, value.resolve(name, n)?)))
            .collect::<Result<Vec<_>>>()?;
        for (name, values) in resolved {
            for (h, v) in self.hypers.iter_mut().zip(values) {
                h.insert(name.to_string(), v);
            }
        }
        Ok(())
    }

    pub fn hypers(&self) -> &[Hypers] {
        &self.hypers
    }

    pub fn param_groups(&self) -> &[Vec<usize>] {
        &self.param_groups
    }

    pub fn n_groups(&self) -> usize {
        self.param_groups.len()
    }

    /// Number of parameter groups currently frozen
    pub fn frozen_idx(&self) -> usize {
        self.frozen_idx
    }

    pub fn state(&self, idx: usize) -> Option<&ParamState> {
        self.state.get(&idx)
    }

    /// State of parameter `idx`, created empty if needed. Used to set the
    /// `force_train` and `do_wd` flags.
    pub fn state_mut(&mut self, idx: usize) -> &mut ParamState {
        self.state.entry(idx).or_default()
    }

    /// Freeze groups `< n` and unfreeze the rest
    ///
    /// Negative `n` counts from the end. Parameters flagged `force_train`
    /// stay trainable in frozen groups. Asking for as many groups as exist,
    /// or more, freezes everything with a warning.
    pub fn freeze_to(&mut self, n: isize, params: &mut [Tensor]) -> Result<()> {
        let len = self.param_groups.len();
        let idx = if n >= 0 {
            n as usize
        } else {
            (len as isize + n).max(0) as usize
        };
        if idx >= len {
            log::warn!(
                "Trying to freeze {idx} parameter groups when there are only {len}, the whole model is frozen."
            );
        }
        self.frozen_idx = idx.min(len);

        for (g, group) in self.param_groups.iter().enumerate() {
            let trainable = g >= self.frozen_idx;
            for &i in group {
                let force = self
                    .state
                    .get(&i)
                    .is_some_and(|s| s.flag("force_train", false));
                param_at(params, g, i)?.set_requires_grad(trainable || force);
            }
        }
        Ok(())
    }

    /// Freeze every group but the last
    pub fn freeze(&mut self, params: &mut [Tensor]) -> Result<()> {
        if self.param_groups.len() < 2 {
            return Err(Error::Config(
                "freeze needs more than one parameter group".to_string(),
            ));
        }
        self.freeze_to(-1, params)
    }

    pub fn unfreeze(&mut self, params: &mut [Tensor]) -> Result<()> {
        self.freeze_to(0, params)
    }

    /// Forget running statistics, keeping only the per-parameter flags
    pub fn clear_state(&mut self) {
        for state in self.state.values_mut() {
            state.retain_keys(&KEEP_ON_CLEAR);
        }
    }

    pub fn state_dict(&self) -> OptimizerState {
        let state = self
            .param_groups
            .iter()
            .flatten()
            .map(|idx| self.state.get(idx).cloned().unwrap_or_default())
            .collect();
        OptimizerState {
            state,
            hypers: self.hypers.clone(),
        }
    }

    /// Restore from [`Optimizer::state_dict`]; group and parameter counts
    /// must match exactly
    pub fn load_state_dict(&mut self, sd: OptimizerState) -> Result<()> {
        let n_params: usize = self.param_groups.iter().map(Vec::len).sum();
        if sd.hypers.len() != self.param_groups.len() {
            return Err(Error::StateDictMismatch(format!(
                "{} hyperparameter groups for {} parameter groups",
                sd.hypers.len(),
                self.param_groups.len()
            )));
        }
        if sd.state.len() != n_params {
            return Err(Error::StateDictMismatch(format!(
                "{} parameter states for {} parameters",
                sd.state.len(),
                n_params
            )));
        }
        self.check_required(&sd.hypers)?;

        self.hypers = sd.hypers;
        self.state = self
            .param_groups
            .iter()
            .flatten()
            .copied()
            .zip(sd.state)
            .filter(|(_, s)| !s.is_empty())
            .collect();
        Ok(())
    }
}

fn param_at(params: &mut [Tensor], group: usize, idx: usize) -> Result<&mut Tensor> {
    let n = params.len();
    params.get_mut(idx).ok_or_else(|| {
        Error::InvalidParameter(format!(
            "parameter group {group} refers to parameter {idx} but only {n} were given"
        ))
    })
}

impl std::fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats: Vec<_> = self.stats.iter().map(|s| s.name()).collect();
        let steppers: Vec<_> = self.steppers.iter().map(|s| s.name()).collect();
        f.debug_struct("Optimizer")
            .field("param_groups", &self.param_groups)
            .field("stats", &stats)
            .field("steppers", &steppers)
            .field("hypers", &self.hypers)
            .field("frozen_idx", &self.frozen_idx)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::{AverageGrad, MomentumStep, SgdStep, StateValue, WeightDecay};
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn params(n: usize) -> Vec<Tensor> {
        (0..n).map(|i| Tensor::from_vec(vec![i as f32 + 1.0], true)).collect()
    }

    fn sgd(groups: Vec<Vec<usize>>, lr: f32) -> Optimizer {
        Optimizer::new(
            groups,
            vec![Box::new(SgdStep)],
            vec![],
            vec![("lr", HyperValue::from(lr))],
        )
        .unwrap()
    }

    fn requires_grad(ps: &[Tensor]) -> Vec<bool> {
        ps.iter().map(Tensor::requires_grad).collect()
    }

    #[test]
    fn test_defaults_merge_order() {
        // WeightDecay declares wd = 0, explicit value wins
        let opt = Optimizer::new(
            vec![vec![0]],
            vec![Box::new(WeightDecay), Box::new(MomentumStep)],
            vec![Box::new(AverageGrad::default())],
            vec![("lr", 0.1f32.into()), ("wd", 0.01f32.into())],
        )
        .unwrap();
        let h = &opt.hypers()[0];
        assert_eq!(h["mom"], 0.9);
        assert_eq!(h["wd"], 0.01);
        assert_eq!(h["lr"], 0.1);
    }

    #[test]
    fn test_missing_required_hyper_rejected() {
        let err = Optimizer::new(vec![vec![0]], vec![Box::new(SgdStep)], vec![], vec![])
            .unwrap_err();
        assert!(matches!(err, Error::MissingHyper { ref key, .. } if key == "lr"));
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let err = Optimizer::new(
            vec![vec![0, 1], vec![1]],
            vec![Box::new(SgdStep)],
            vec![],
            vec![("lr", 0.1f32.into())],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_step_skips_params_without_grad() {
        let mut ps = params(2);
        ps[0].set_grad(ndarray::arr1(&[1.0]));
        let mut opt = sgd(vec![vec![0, 1]], 0.5);

        opt.step(&mut ps).unwrap();

        assert_abs_diff_eq!(ps[0].data()[0], 0.5);
        assert_abs_diff_eq!(ps[1].data()[0], 2.0);
        assert!(opt.state(1).is_none());
    }

    #[test]
    fn test_step_runs_stats_before_steppers() {
        let mut ps = params(1);
        let mut opt = Optimizer::new(
            vec![vec![0]],
            vec![Box::new(MomentumStep)],
            vec![Box::new(AverageGrad::default())],
            vec![("lr", 1.0f32.into()), ("mom", 0.5f32.into())],
        )
        .unwrap();

        ps[0].set_grad(ndarray::arr1(&[1.0]));
        opt.step(&mut ps).unwrap();
        // grad_avg = 1
        assert_abs_diff_eq!(ps[0].data()[0], 0.0);

        opt.step(&mut ps).unwrap();
        // grad_avg = 0.5 * 1 + 1
        assert_abs_diff_eq!(ps[0].data()[0], -1.5);
    }

    #[test]
    fn test_failed_step_keeps_state() {
        let mut ps = params(1);
        // no stat tracks grad_avg, so the momentum stepper fails
        let mut opt = Optimizer::new(
            vec![vec![0]],
            vec![Box::new(MomentumStep)],
            vec![],
            vec![("lr", 0.1f32.into())],
        )
        .unwrap();
        opt.state_mut(0).set_flag("do_wd", false);
        opt.state_mut(0).set_flag("force_train", true);
        ps[0].set_grad(ndarray::arr1(&[1.0]));

        assert!(opt.step(&mut ps).is_err());

        let state = opt.state(0).unwrap();
        assert!(!state.flag("do_wd", true));
        assert!(state.flag("force_train", false));
        assert_abs_diff_eq!(ps[0].data()[0], 1.0);
    }

    #[test]
    fn test_zero_grad_clears_grads() {
        let ps = params(2);
        ps[0].set_grad(ndarray::arr1(&[1.0]));
        let opt = sgd(vec![vec![0, 1]], 0.1);
        opt.zero_grad(&ps);
        assert!(!ps[0].has_grad());
    }

    #[test]
    fn test_hyper_count_mismatch_leaves_hypers_untouched() {
        let mut opt = sgd(vec![vec![0], vec![1], vec![2]], 0.1);
        let err = opt
            .set_hypers([("wd", 0.2f32.into()), ("lr", vec![0.1f32, 0.2].into())])
            .unwrap_err();
        assert!(matches!(err, Error::HyperCount { .. }));
        assert!(opt.hypers()[0].get("wd").is_none());
    }

    #[test]
    fn test_discriminative_lr() {
        let mut opt = sgd(vec![vec![0], vec![1], vec![2]], 0.1);
        opt.set_hyper("lr", ..1e-2f32).unwrap();
        let lrs: Vec<f32> = opt.hypers().iter().map(|h| h["lr"]).collect();
        assert_eq!(lrs, vec![1e-2 / 10.0, 1e-2 / 10.0, 1e-2]);
    }

    #[test]
    fn test_freeze_to_last_group() {
        let mut ps = params(3);
        let mut opt = sgd(vec![vec![0], vec![1], vec![2]], 0.1);

        opt.freeze_to(-1, &mut ps).unwrap();
        assert_eq!(requires_grad(&ps), vec![false, false, true]);
        assert_eq!(opt.frozen_idx(), 2);

        opt.unfreeze(&mut ps).unwrap();
        assert_eq!(requires_grad(&ps), vec![true, true, true]);
    }

    #[test]
    fn test_force_train_survives_freeze() {
        let mut ps = params(3);
        let mut opt = sgd(vec![vec![0, 1], vec![2]], 0.1);
        opt.state_mut(1).set_flag("force_train", true);

        opt.freeze(&mut ps).unwrap();
        assert_eq!(requires_grad(&ps), vec![false, true, true]);
    }

    #[test]
    fn test_over_freeze_freezes_everything() {
        let mut ps = params(2);
        let mut opt = sgd(vec![vec![0], vec![1]], 0.1);
        opt.freeze_to(5, &mut ps).unwrap();
        assert_eq!(requires_grad(&ps), vec![false, false]);
        assert_eq!(opt.frozen_idx(), 2);
    }

    #[test]
    fn test_freeze_single_group_is_error() {
        let mut ps = params(2);
        let mut opt = sgd(vec![vec![0, 1]], 0.1);
        assert!(opt.freeze(&mut ps).is_err());
    }

    #[test]
    fn test_unfreeze_is_idempotent() {
        let mut ps = params(3);
        let mut opt = sgd(vec![vec![0], vec![1], vec![2]], 0.1);
        opt.state_mut(0).set_flag("do_wd", false);

        opt.unfreeze(&mut ps).unwrap();
        let once = (opt.state_dict(), opt.frozen_idx(), requires_grad(&ps));
        opt.unfreeze(&mut ps).unwrap();
        let twice = (opt.state_dict(), opt.frozen_idx(), requires_grad(&ps));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_clear_state_keeps_flags() {
        let mut ps = params(1);
        let mut opt = Optimizer::new(
            vec![vec![0]],
            vec![Box::new(MomentumStep)],
            vec![Box::new(AverageGrad::default())],
            vec![("lr", 0.1f32.into())],
        )
        .unwrap();
        opt.state_mut(0).set_flag("force_train", true);
        ps[0].set_grad(ndarray::arr1(&[1.0]));
        opt.step(&mut ps).unwrap();
        assert!(opt.state(0).unwrap().contains("grad_avg"));

        opt.clear_state();
        let state = opt.state(0).unwrap();
        assert!(!state.contains("grad_avg"));
        assert!(state.flag("force_train", false));
    }

    #[test]
    fn test_state_dict_roundtrip() {
        let mut ps = params(3);
        let groups = vec![vec![0, 1], vec![2]];
        let mut opt = Optimizer::new(
            groups.clone(),
            vec![Box::new(MomentumStep)],
            vec![Box::new(AverageGrad::default())],
            vec![("lr", HyperValue::from(vec![0.01f32, 0.1]))],
        )
        .unwrap();
        for p in &ps {
            p.set_grad(ndarray::arr1(&[0.5]));
        }
        opt.step(&mut ps).unwrap();
        let sd = opt.state_dict();

        let json = serde_json::to_string(&sd).unwrap();
        let restored: OptimizerState = serde_json::from_str(&json).unwrap();

        let mut fresh = Optimizer::new(
            groups,
            vec![Box::new(MomentumStep)],
            vec![Box::new(AverageGrad::default())],
            vec![("lr", 0.5f32.into())],
        )
        .unwrap();
        fresh.load_state_dict(restored).unwrap();
        assert_eq!(fresh.state_dict(), sd);
        assert_eq!(
            fresh.state(2).unwrap().get("grad_avg"),
            Some(&StateValue::Array(ndarray::arr1(&[0.5])))
        );
    }

    #[test]
    fn test_load_state_dict_cardinality_mismatch() {
        let mut opt = sgd(vec![vec![0], vec![1]], 0.1);
        let sd = OptimizerState {
            state: vec![ParamState::new(); 2],
            hypers: vec![Hypers::new()],
        };
        assert!(matches!(
            opt.load_state_dict(sd),
            Err(Error::StateDictMismatch(_))
        ));

        let sd = OptimizerState {
            state: vec![ParamState::new(); 3],
            hypers: opt.hypers().to_vec(),
        };
        assert!(matches!(
            opt.load_state_dict(sd),
            Err(Error::StateDictMismatch(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_freeze_to_partitions_groups(n_groups in 1usize..8, n in -10isize..10) {
            let mut ps = params(n_groups);
            let groups = (0..n_groups).map(|i| vec![i]).collect();
            let mut opt = sgd(groups, 0.1);
            opt.freeze_to(n, &mut ps).unwrap();

            let frozen = opt.frozen_idx();
            prop_assert!(frozen <= n_groups);
            for (g, p) in ps.iter().enumerate() {
                prop_assert_eq!(p.requires_grad(), g >= frozen);
            }
        }
    }
}
