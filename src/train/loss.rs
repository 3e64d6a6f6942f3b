//! Loss functions for training

use crate::autograd::{propagate, BackwardOp, GradCell};
use crate::{Error, Result, Tensor};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// How per-sample losses are combined
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    /// One loss per sample
    None,
    #[default]
    Mean,
    Sum,
}

/// Trait for loss functions
pub trait LossFn {
    /// Compute the loss of `predictions` against `targets`, wiring the
    /// gradient back into `predictions`
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor>;

    /// Current reduction, if this loss supports switching it
    fn reduction(&self) -> Option<Reduction> {
        None
    }

    /// Switch the reduction; returns false when unsupported
    fn set_reduction(&mut self, _reduction: Reduction) -> bool {
        false
    }

    /// Name of the loss function
    fn name(&self) -> &str;
}

/// Mean Squared Error Loss
///
/// L = reduce((predictions - targets)²)
///
/// # Example
///
/// ```
/// use aprendiz::train::{LossFn, MSELoss};
/// use aprendiz::Tensor;
///
/// let loss_fn = MSELoss::default();
/// let pred = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
/// let target = Tensor::from_vec(vec![1.5, 2.5, 3.5], false);
///
/// let loss = loss_fn.forward(&pred, &target).unwrap();
/// assert!(loss.data()[0] > 0.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MSELoss {
    reduction: Reduction,
}

impl MSELoss {
    pub fn new(reduction: Reduction) -> Self {
        Self { reduction }
    }
}

impl LossFn for MSELoss {
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor> {
        if predictions.len() != targets.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![targets.len()],
                got: vec![predictions.len()],
            });
        }

        let diff = predictions.data() - targets.data();
        let squared = &diff * &diff;
        let data = match self.reduction {
            Reduction::None => squared,
            Reduction::Mean => Array1::from(vec![squared.mean().unwrap_or(0.0)]),
            Reduction::Sum => Array1::from(vec![squared.sum()]),
        };

        let mut loss = Tensor::new(data, predictions.requires_grad());

        if predictions.requires_grad() {
            // d(diff²)/d(pred) = 2 * diff, scaled by the reduction
            let scale = match self.reduction {
                Reduction::Mean if !diff.is_empty() => 2.0 / diff.len() as f32,
                _ => 2.0,
            };
            loss.set_backward_op(Rc::new(MSEBackward {
                pred: predictions.clone(),
                local_grad: diff * scale,
                reduced: self.reduction != Reduction::None,
                result_grad: loss.grad_cell(),
            }));
        }

        Ok(loss)
    }

    fn reduction(&self) -> Option<Reduction> {
        Some(self.reduction)
    }

    fn set_reduction(&mut self, reduction: Reduction) -> bool {
        self.reduction = reduction;
        true
    }

    fn name(&self) -> &str {
        "MSE"
    }
}

struct MSEBackward {
    pred: Tensor,
    local_grad: Array1<f32>,
    reduced: bool,
    result_grad: GradCell,
}

impl BackwardOp for MSEBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let pred_grad = if self.reduced {
                &self.local_grad * grad[0]
            } else {
                &self.local_grad * grad
            };
            self.pred.accumulate_grad(pred_grad);
        }
        propagate(&self.pred);
    }
}
