//! Tape-based autograd engine
//!
//! Provides the differentiable tensor the training engine hands to models,
//! losses and optimizers. Only the handful of operations that models in this
//! crate need are implemented.

mod backward;
mod ops;
mod tensor;


pub use backward::BackwardOp;
pub use ops::*;
pub(crate) use ops::propagate;
pub use tensor::{GradCell, Tensor};

/// Perform backward pass on a tensor
pub fn backward(tensor: &mut Tensor, grad_output: Option<ndarray::Array1<f32>>) {
    if let Some(grad) = grad_output {
        tensor.set_grad(grad);
    } else {
        // Seed with ones for a scalar (or unreduced) loss
        let ones = ndarray::Array1::ones(tensor.data().len());
        tensor.set_grad(ones);
    }

    if let Some(op) = tensor.backward_op() {
        op.backward();
    }
}
