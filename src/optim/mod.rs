//! Optimizer engine
//!
//! An [`Optimizer`] holds parameter groups, per-group hyperparameters and
//! per-parameter state. Its update rule is assembled from [`Stat`]s and
//! [`Stepper`]s; [`OptimizerKind`] provides the usual recipes.

mod hyper;
mod kind;
mod optimizer;
mod pipeline;
mod state;
mod stats;
mod steppers;

pub use hyper::{even_mults, HyperValue, Hypers};
pub use kind::OptimizerKind;
pub use optimizer::{Optimizer, OptimizerState};
pub use pipeline::{GroupHypers, Stat, StepArgs, Stepper};
pub use state::{ParamState, StateValue, KEEP_ON_CLEAR};
pub use stats::{AverageGrad, AverageSqrGrad, LarcLayerLr, StepStat};
pub use steppers::{
    AdamStep, L2Reg, LambStep, LarcStep, MomentumStep, RmsPropStep, SgdStep, WeightDecay,
};
