//! Per-parameter optimizer state

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys that survive [`crate::optim::Optimizer::clear_state`]
pub const KEEP_ON_CLEAR: [&str; 2] = ["force_train", "do_wd"];

/// A single named running value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateValue {
    Flag(bool),
    Count(u64),
    Scalar(f32),
    Array(Array1<f32>),
}

/// Named running values for one parameter (moving averages, step count,
/// training flags). Created empty the first time the parameter is updated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamState {
    values: BTreeMap<String, StateValue>,
}

impl ParamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: StateValue) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<StateValue> {
        self.values.remove(key)
    }

    pub fn array(&self, key: &str) -> Option<&Array1<f32>> {
        match self.values.get(key) {
            Some(StateValue::Array(a)) => Some(a),
            _ => None,
        }
    }

    pub fn scalar(&self, key: &str) -> Option<f32> {
        match self.values.get(key) {
            Some(StateValue::Scalar(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn count(&self, key: &str) -> Option<u64> {
        match self.values.get(key) {
            Some(StateValue::Count(c)) => Some(*c),
            _ => None,
        }
    }

    /// Boolean flag, `default` when absent
    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(StateValue::Flag(b)) => *b,
            _ => default,
        }
    }

    pub fn set_flag(&mut self, key: impl Into<String>, value: bool) {
        self.insert(key, StateValue::Flag(value));
    }

    /// Drop everything except the keys in `keep`
    pub fn retain_keys(&mut self, keep: &[&str]) {
        self.values.retain(|k, _| keep.contains(&k.as_str()));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
