//! Hyperparameter values and per-group broadcasting

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Range, RangeTo};

/// One parameter group's hyperparameters, keyed by name (`lr`, `wd`, `mom`, ...)
pub type Hypers = BTreeMap<String, f32>;

/// A hyperparameter value as supplied by the caller, before it is spread
/// across parameter groups
///
/// # Example
///
/// ```
/// use aprendiz::optim::HyperValue;
///
/// // Same value everywhere
/// assert_eq!(HyperValue::from(0.1f32).resolve("lr", 3).unwrap(), vec![0.1, 0.1, 0.1]);
///
/// // Only an upper bound: every group but the last gets a tenth of it
/// let lrs = HyperValue::from(..1e-2f32).resolve("lr", 3).unwrap();
/// assert_eq!(lrs, vec![1e-2 / 10.0, 1e-2 / 10.0, 1e-2]);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HyperValue {
    /// Broadcast identically to every group
    Scalar(f32),
    /// One value per group (or a single value to broadcast)
    List(Vec<f32>),
    /// Spread between `start` and `stop` across groups
    Range {
        #[serde(default)]
        start: Option<f32>,
        stop: f32,
    },
}

impl HyperValue {
    /// Spread over groups: geometric between `start` and `stop`
    pub fn range(start: f32, stop: f32) -> Self {
        HyperValue::Range {
            start: Some(start),
            stop,
        }
    }

    /// Upper bound only: `stop / 10` for every group but the last
    pub fn up_to(stop: f32) -> Self {
        HyperValue::Range { start: None, stop }
    }

    /// Expand into exactly one value per parameter group
    pub fn resolve(&self, name: &str, n_groups: usize) -> Result<Vec<f32>> {
        let values = match self {
            HyperValue::Scalar(v) => vec![*v],
            HyperValue::List(vs) => vs.clone(),
            HyperValue::Range { start, stop } => match start {
                Some(start) if *start != 0.0 => even_mults(*start, *stop, n_groups),
                _ => {
                    let mut vs = vec![stop / 10.0; n_groups.saturating_sub(1)];
                    vs.push(*stop);
                    vs
                }
            },
        };

        match values.len() {
            1 => Ok(vec![values[0]; n_groups]),
            len if len == n_groups => Ok(values),
            got => Err(Error::HyperCount {
                name: name.to_string(),
                got,
                groups: n_groups,
            }),
        }
    }
}

impl From<f32> for HyperValue {
    fn from(v: f32) -> Self {
        HyperValue::Scalar(v)
    }
}

impl From<Vec<f32>> for HyperValue {
    fn from(vs: Vec<f32>) -> Self {
        HyperValue::List(vs)
    }
}

impl From<&[f32]> for HyperValue {
    fn from(vs: &[f32]) -> Self {
        HyperValue::List(vs.to_vec())
    }
}

impl From<Range<f32>> for HyperValue {
    fn from(r: Range<f32>) -> Self {
        HyperValue::range(r.start, r.end)
    }
}

impl From<RangeTo<f32>> for HyperValue {
    fn from(r: RangeTo<f32>) -> Self {
        HyperValue::up_to(r.end)
    }
}

/// `n` values growing geometrically from `start` to `stop`
pub fn even_mults(start: f32, stop: f32, n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![stop];
    }
    let step = (stop / start).powf(1.0 / (n - 1) as f32);
    (0..n)
        .map(|i| {
            if i == n - 1 {
                stop
            } else {
                start * step.powi(i as i32)
            }
        })
        .collect()
}
