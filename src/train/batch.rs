//! A batch of training data

use crate::Tensor;

/// Inputs and targets of one batch
#[derive(Clone, Debug)]
pub struct Batch {
    pub inputs: Tensor,
    pub targets: Tensor,
}

impl Batch {
    pub fn new(inputs: Tensor, targets: Tensor) -> Self {
        Self { inputs, targets }
    }

    /// Build a batch from plain vectors; neither side tracks gradients
    pub fn from_vecs(inputs: Vec<f32>, targets: Vec<f32>) -> Self {
        Self::new(
            Tensor::from_vec(inputs, false),
            Tensor::from_vec(targets, false),
        )
    }

    /// Number of samples, counted on the targets
    pub fn size(&self) -> usize {
        self.targets.len()
    }
}
