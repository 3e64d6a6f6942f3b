//! Autograd operations with backward passes

use super::{BackwardOp, GradCell, Tensor};
use ndarray::Array1;
use std::rc::Rc;

pub(crate) fn propagate(input: &Tensor) {
    if let Some(op) = input.backward_op() {
        op.backward();
    }
}

/// Add two tensors
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    let data = a.data() + b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for AddBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.clone());
            }
        }
        propagate(&self.a);
        propagate(&self.b);
    }
}

/// Multiply two tensors element-wise
pub fn mul(a: &Tensor, b: &Tensor) -> Tensor {
    let data = a.data() * b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MulBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MulBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for MulBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * b
                self.a.accumulate_grad(grad * self.b.data());
            }
            if self.b.requires_grad() {
                // ∂L/∂b = ∂L/∂out * a
                self.b.accumulate_grad(grad * self.a.data());
            }
        }
        propagate(&self.a);
        propagate(&self.b);
    }
}

/// Sum all elements
pub fn sum(a: &Tensor) -> Tensor {
    let data = Array1::from(vec![a.data().sum()]);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SumBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SumBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for SumBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a
                    .accumulate_grad(Array1::from_elem(self.a.len(), grad[0]));
            }
        }
        propagate(&self.a);
    }
}

/// Scalar affine map `w * x + b`, where `w` and `b` hold a single element
/// each and `x` is any length.
pub fn affine(x: &Tensor, w: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(w.len(), 1, "affine weight must be a single element");
    assert_eq!(b.len(), 1, "affine bias must be a single element");

    let data = x.data() * w.data()[0] + b.data()[0];
    let requires_grad = x.requires_grad() || w.requires_grad() || b.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AffineBackward {
            x: x.clone(),
            w: w.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AffineBackward {
    x: Tensor,
    w: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for AffineBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.x.requires_grad() {
                self.x.accumulate_grad(grad * self.w.data()[0]);
            }
            if self.w.requires_grad() {
                let dw = (grad * self.x.data()).sum();
                self.w.accumulate_grad(Array1::from(vec![dw]));
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(Array1::from(vec![grad.sum()]));
            }
        }
        propagate(&self.x);
        propagate(&self.w);
        propagate(&self.b);
    }
}
