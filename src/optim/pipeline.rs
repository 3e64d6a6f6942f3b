//! Stat and stepper traits
//!
//! An optimizer is an ordered list of [`Stat`]s (what running values to keep
//! per parameter) followed by an ordered list of [`Stepper`]s (how to move the
//! parameter). Order is significant: a stepper that reads `grad_avg` only
//! works if the stat that writes it runs first.

use super::hyper::Hypers;
use super::state::ParamState;
use crate::{Error, Result, Tensor};
use ndarray::Array1;

/// Read-only view of one parameter group's hyperparameters
#[derive(Clone, Copy, Debug)]
pub struct GroupHypers<'a> {
    group: usize,
    values: &'a Hypers,
}

impl<'a> GroupHypers<'a> {
    pub fn new(group: usize, values: &'a Hypers) -> Self {
        Self { group, values }
    }

    /// Index of the parameter group these values belong to
    pub fn group(&self) -> usize {
        self.group
    }

    /// Required hyperparameter
    pub fn get(&self, key: &str) -> Result<f32> {
        self.values.get(key).copied().ok_or_else(|| Error::MissingHyper {
            key: key.to_string(),
            group: self.group,
        })
    }

    pub fn get_or(&self, key: &str, default: f32) -> f32 {
        self.values.get(key).copied().unwrap_or(default)
    }
}

/// What a stepper sees: the parameter's state merged with its group's
/// hyperparameters. Hyperparameters shadow state entries of the same name.
#[derive(Clone, Copy, Debug)]
pub struct StepArgs<'a> {
    pub state: &'a ParamState,
    pub hypers: GroupHypers<'a>,
}

impl<'a> StepArgs<'a> {
    pub fn new(state: &'a ParamState, hypers: GroupHypers<'a>) -> Self {
        Self { state, hypers }
    }

    /// Scalar named value: hyperparameter first, then scalar state
    pub fn scalar(&self, key: &str) -> Result<f32> {
        match self.hypers.get(key) {
            Ok(v) => Ok(v),
            Err(e) => self.state.scalar(key).ok_or(e),
        }
    }

    pub fn array(&self, key: &str) -> Option<&'a Array1<f32>> {
        self.state.array(key)
    }

    /// Array state a stat must have recorded before this stepper runs
    pub fn require_array(&self, key: &str) -> Result<&'a Array1<f32>> {
        self.state.array(key).ok_or_else(|| missing_state(key))
    }

    pub fn count(&self, key: &str) -> Option<u64> {
        self.state.count(key)
    }

    pub fn require_count(&self, key: &str) -> Result<u64> {
        self.state.count(key).ok_or_else(|| missing_state(key))
    }

    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.state.flag(key, default)
    }
}

/// Maintains per-parameter running statistics
pub trait Stat {
    /// Short identifier, used in diagnostics
    fn name(&self) -> &'static str;

    /// Hyperparameters this stat needs, with their default values
    fn defaults(&self) -> Vec<(&'static str, f32)> {
        Vec::new()
    }

    /// Hyperparameters that must be present in every group
    fn required(&self) -> &'static [&'static str] {
        &[]
    }

    /// Fold one update into `state`. Must not modify the parameter.
    fn update(&self, state: ParamState, param: &Tensor, hypers: &GroupHypers<'_>)
        -> Result<ParamState>;
}

/// Moves a parameter using its gradient, state and hyperparameters
pub trait Stepper {
    fn name(&self) -> &'static str;

    fn defaults(&self) -> Vec<(&'static str, f32)> {
        Vec::new()
    }

    fn required(&self) -> &'static [&'static str] {
        &[]
    }

    /// Update `param` in place (its data, and possibly its gradient)
    fn step(&self, param: &mut Tensor, args: &StepArgs<'_>) -> Result<()>;
}

fn missing_state(key: &str) -> Error {
    Error::InvalidParameter(format!(
        "optimizer state `{key}` is missing (no stat records it before this step)"
    ))
}

/// Gradient of a parameter that is being stepped
pub(crate) fn grad_of(param: &Tensor) -> Result<Array1<f32>> {
    param
        .grad()
        .ok_or_else(|| Error::InvalidParameter("parameter has no gradient".to_string()))
}
