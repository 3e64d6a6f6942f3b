//! Ready-made optimizers
//!
//! Each variant picks the stats and steppers of a well known algorithm. Weight
//! decay is prepended only when `wd` is non-zero, as decoupled decay when
//! `true_wd` is set and as L2 regularisation otherwise.

use super::hyper::HyperValue;
use super::optimizer::Optimizer;
use super::pipeline::{Stat, Stepper};
use super::stats::{AverageGrad, AverageSqrGrad, LarcLayerLr, StepStat};
use super::steppers::{
    AdamStep, L2Reg, LambStep, LarcStep, MomentumStep, RmsPropStep, SgdStep, WeightDecay,
};
use crate::Result;
use serde::{Deserialize, Serialize};

fn default_mom() -> f32 {
    0.9
}

fn default_sqr_mom() -> f32 {
    0.99
}

fn default_adam_eps() -> f32 {
    1e-5
}

fn default_larc_eps() -> f32 {
    1e-8
}

fn default_trust_coeff() -> f32 {
    0.02
}

fn default_true() -> bool {
    true
}

/// Optimizer recipe, selectable from configuration
///
/// ```yaml
/// type: adam
/// mom: 0.9
/// wd: 0.01
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd {
        #[serde(default)]
        mom: f32,
        #[serde(default)]
        wd: f32,
        #[serde(default = "default_true")]
        true_wd: bool,
    },
    RmsProp {
        #[serde(default = "default_sqr_mom")]
        sqr_mom: f32,
        #[serde(default)]
        mom: f32,
        #[serde(default)]
        wd: f32,
        #[serde(default = "default_true")]
        true_wd: bool,
    },
    Adam {
        #[serde(default = "default_mom")]
        mom: f32,
        #[serde(default = "default_sqr_mom")]
        sqr_mom: f32,
        #[serde(default = "default_adam_eps")]
        eps: f32,
        #[serde(default)]
        wd: f32,
        #[serde(default = "default_true")]
        true_wd: bool,
    },
    Larc {
        #[serde(default = "default_mom")]
        mom: f32,
        #[serde(default = "default_true")]
        clip: bool,
        #[serde(default = "default_trust_coeff")]
        trust_coeff: f32,
        #[serde(default = "default_larc_eps")]
        eps: f32,
        #[serde(default)]
        wd: f32,
        #[serde(default = "default_true")]
        true_wd: bool,
    },
    Lamb {
        #[serde(default = "default_mom")]
        mom: f32,
        #[serde(default = "default_sqr_mom")]
        sqr_mom: f32,
        #[serde(default = "default_adam_eps")]
        eps: f32,
        #[serde(default)]
        wd: f32,
        #[serde(default = "default_true")]
        true_wd: bool,
    },
}

impl Default for OptimizerKind {
    fn default() -> Self {
        OptimizerKind::sgd()
    }
}

impl OptimizerKind {
    /// Plain SGD, no momentum, no weight decay
    pub fn sgd() -> Self {
        OptimizerKind::Sgd {
            mom: 0.0,
            wd: 0.0,
            true_wd: true,
        }
    }

    pub fn adam() -> Self {
        OptimizerKind::Adam {
            mom: default_mom(),
            sqr_mom: default_sqr_mom(),
            eps: default_adam_eps(),
            wd: 0.0,
            true_wd: true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OptimizerKind::Sgd { .. } => "sgd",
            OptimizerKind::RmsProp { .. } => "rms_prop",
            OptimizerKind::Adam { .. } => "adam",
            OptimizerKind::Larc { .. } => "larc",
            OptimizerKind::Lamb { .. } => "lamb",
        }
    }

    /// Instantiate over `param_groups` with learning rate `lr`
    pub fn build(&self, param_groups: Vec<Vec<usize>>, lr: HyperValue) -> Result<Optimizer> {
        let mut steppers = decay_steppers(self.wd(), self.true_wd());
        let mut stats: Vec<Box<dyn Stat>> = Vec::new();
        let mut hypers = vec![("lr", lr), ("wd", HyperValue::Scalar(self.wd()))];

        match *self {
            OptimizerKind::Sgd { mom, .. } => {
                if mom == 0.0 {
                    steppers.push(Box::new(SgdStep));
                } else {
                    stats.push(Box::new(AverageGrad::new(false)));
                    steppers.push(Box::new(MomentumStep));
                    hypers.push(("mom", mom.into()));
                }
            }
            OptimizerKind::RmsProp { sqr_mom, mom, .. } => {
                if mom != 0.0 {
                    stats.push(Box::new(AverageGrad::new(false)));
                }
                stats.push(Box::new(AverageSqrGrad::default()));
                steppers.push(Box::new(RmsPropStep));
                hypers.push(("mom", mom.into()));
                hypers.push(("sqr_mom", sqr_mom.into()));
            }
            OptimizerKind::Adam {
                mom, sqr_mom, eps, ..
            } => {
                stats.extend(adam_stats());
                steppers.push(Box::new(AdamStep));
                hypers.extend([
                    ("mom", mom.into()),
                    ("sqr_mom", sqr_mom.into()),
                    ("eps", eps.into()),
                ]);
            }
            OptimizerKind::Larc {
                mom,
                clip,
                trust_coeff,
                eps,
                ..
            } => {
                if mom != 0.0 {
                    stats.push(Box::new(AverageGrad::new(false)));
                }
                stats.push(Box::new(LarcLayerLr::new(clip)));
                steppers.push(Box::new(LarcStep));
                hypers.extend([
                    ("mom", mom.into()),
                    ("trust_coeff", trust_coeff.into()),
                    ("eps", eps.into()),
                ]);
            }
            OptimizerKind::Lamb {
                mom, sqr_mom, eps, ..
            } => {
                stats.extend(adam_stats());
                steppers.push(Box::new(LambStep));
                hypers.extend([
                    ("mom", mom.into()),
                    ("sqr_mom", sqr_mom.into()),
                    ("eps", eps.into()),
                ]);
            }
        }

        log::debug!(
            "creating {} optimizer over {} parameter groups",
            self.name(),
            param_groups.len()
        );
        Optimizer::new(param_groups, steppers, stats, hypers)
    }

    fn wd(&self) -> f32 {
        match *self {
            OptimizerKind::Sgd { wd, .. }
            | OptimizerKind::RmsProp { wd, .. }
            | OptimizerKind::Adam { wd, .. }
            | OptimizerKind::Larc { wd, .. }
            | OptimizerKind::Lamb { wd, .. } => wd,
        }
    }

    fn true_wd(&self) -> bool {
        match *self {
            OptimizerKind::Sgd { true_wd, .. }
            | OptimizerKind::RmsProp { true_wd, .. }
            | OptimizerKind::Adam { true_wd, .. }
            | OptimizerKind::Larc { true_wd, .. }
            | OptimizerKind::Lamb { true_wd, .. } => true_wd,
        }
    }
}

fn decay_steppers(wd: f32, true_wd: bool) -> Vec<Box<dyn Stepper>> {
    if wd == 0.0 {
        Vec::new()
    } else if true_wd {
        vec![Box::new(WeightDecay)]
    } else {
        vec![Box::new(L2Reg)]
    }
}

fn adam_stats() -> Vec<Box<dyn Stat>> {
    vec![
        Box::new(AverageGrad::new(true)),
        Box::new(AverageSqrGrad::default()),
        Box::new(StepStat),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tensor;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sgd_without_momentum_keeps_no_state() {
        let mut opt = OptimizerKind::sgd().build(vec![vec![0]], 0.1f32.into()).unwrap();
        let mut ps = vec![Tensor::from_vec(vec![1.0], true)];
        ps[0].set_grad(ndarray::arr1(&[1.0]));
        opt.step(&mut ps).unwrap();

        assert_abs_diff_eq!(ps[0].data()[0], 0.9, epsilon = 1e-6);
        assert!(opt.state(0).unwrap().is_empty());
        assert!(opt.hypers()[0].get("mom").is_none());
    }

    #[test]
    fn test_sgd_with_momentum_records_grad_avg() {
        let kind = OptimizerKind::Sgd {
            mom: 0.9,
            wd: 0.0,
            true_wd: true,
        };
        let mut opt = kind.build(vec![vec![0]], 0.1f32.into()).unwrap();
        let mut ps = vec![Tensor::from_vec(vec![1.0], true)];
        ps[0].set_grad(ndarray::arr1(&[1.0]));
        opt.step(&mut ps).unwrap();

        assert!(opt.state(0).unwrap().contains("grad_avg"));
        assert_eq!(opt.hypers()[0]["mom"], 0.9);
    }

    #[test]
    fn test_true_wd_decays_params() {
        let kind = OptimizerKind::Sgd {
            mom: 0.0,
            wd: 0.1,
            true_wd: true,
        };
        let mut opt = kind.build(vec![vec![0]], 1.0f32.into()).unwrap();
        let mut ps = vec![Tensor::from_vec(vec![2.0], true)];
        ps[0].set_grad(ndarray::arr1(&[0.0]));
        opt.step(&mut ps).unwrap();
        // 2 * (1 - 0.1)
        assert_abs_diff_eq!(ps[0].data()[0], 1.8, epsilon = 1e-6);
    }

    #[test]
    fn test_l2_reg_changes_gradient() {
        let kind = OptimizerKind::Sgd {
            mom: 0.0,
            wd: 0.1,
            true_wd: false,
        };
        let mut opt = kind.build(vec![vec![0]], 1.0f32.into()).unwrap();
        let mut ps = vec![Tensor::from_vec(vec![2.0], true)];
        ps[0].set_grad(ndarray::arr1(&[0.0]));
        opt.step(&mut ps).unwrap();
        // grad becomes 0.2
        assert_abs_diff_eq!(ps[0].data()[0], 1.8, epsilon = 1e-6);
        assert_abs_diff_eq!(ps[0].grad().unwrap()[0], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_adam_tracks_step_count() {
        let mut opt = OptimizerKind::adam().build(vec![vec![0]], 1e-3f32.into()).unwrap();
        let mut ps = vec![Tensor::from_vec(vec![1.0, -1.0], true)];
        for _ in 0..3 {
            ps[0].set_grad(ndarray::arr1(&[0.5, -0.5]));
            opt.step(&mut ps).unwrap();
        }
        let state = opt.state(0).unwrap();
        assert_eq!(state.count("step"), Some(3));
        assert!(state.contains("grad_avg"));
        assert!(state.contains("sqr_avg"));
    }

    #[test]
    fn test_larc_records_local_lr() {
        let kind = OptimizerKind::Larc {
            mom: 0.0,
            clip: true,
            trust_coeff: 0.02,
            eps: 1e-8,
            wd: 0.0,
            true_wd: true,
        };
        let mut opt = kind.build(vec![vec![0]], 0.1f32.into()).unwrap();
        let mut ps = vec![Tensor::from_vec(vec![3.0, 4.0], true)];
        ps[0].set_grad(ndarray::arr1(&[0.6, 0.8]));
        opt.step(&mut ps).unwrap();

        let state = opt.state(0).unwrap();
        // 0.1 * 0.02 * 5 / 1
        assert_abs_diff_eq!(state.scalar("local_lr").unwrap(), 0.01, epsilon = 1e-6);
        assert!(!state.contains("grad_avg"));
    }

    #[test]
    fn test_kind_from_yaml() {
        let kind: OptimizerKind = serde_yaml::from_str("type: adam\nwd: 0.01\n").unwrap();
        assert_eq!(
            kind,
            OptimizerKind::Adam {
                mom: 0.9,
                sqr_mom: 0.99,
                eps: 1e-5,
                wd: 0.01,
                true_wd: true,
            }
        );

        let kind: OptimizerKind = serde_yaml::from_str("type: sgd").unwrap();
        assert_eq!(kind, OptimizerKind::sgd());
    }
}
