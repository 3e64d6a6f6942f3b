//! Trainable models

use super::Device;
use crate::autograd::affine;
use crate::{Result, Tensor};

/// A model the learner can train
///
/// Parameters are addressed by their index in [`Model::parameters`]. The
/// learner builds its optimizer from [`Model::param_groups`], which must
/// partition those indices.
pub trait Model {
    /// Compute predictions; gradients reach the parameters through the
    /// returned tensor's backward graph
    fn forward(&mut self, inputs: &Tensor) -> Result<Tensor>;

    fn parameters(&self) -> &[Tensor];

    fn parameters_mut(&mut self) -> &mut [Tensor];

    /// Names used in checkpoints
    fn param_names(&self) -> Vec<String> {
        (0..self.parameters().len())
            .map(|i| format!("param_{i}"))
            .collect()
    }

    /// Split the parameters into groups, earliest layers first
    fn param_groups(&self) -> Vec<Vec<usize>> {
        vec![(0..self.parameters().len()).collect()]
    }

    /// Parameters of normalisation layers
    fn norm_params(&self) -> Vec<usize> {
        Vec::new()
    }

    /// Bias parameters
    fn bias_params(&self) -> Vec<usize> {
        Vec::new()
    }

    /// Switch between training and evaluation behaviour
    fn set_training(&mut self, _training: bool) {}

    fn to_device(&mut self, _device: Device) {}
}

/// A chain of scalar affine layers `y = w * x + b`, one parameter group per
/// layer
#[derive(Clone, Debug)]
pub struct AffineModel {
    params: Vec<Tensor>,
    training: bool,
    device: Device,
}

impl AffineModel {
    /// Single layer
    pub fn new(weight: f32, bias: f32) -> Self {
        Self::stack(&[(weight, bias)])
    }

    /// One layer per `(weight, bias)` pair, applied in order
    pub fn stack(layers: &[(f32, f32)]) -> Self {
        let params = layers
            .iter()
            .flat_map(|&(w, b)| [Tensor::from_vec(vec![w], true), Tensor::from_vec(vec![b], true)])
            .collect();
        Self {
            params,
            training: false,
            device: Device::Cpu,
        }
    }

    pub fn n_layers(&self) -> usize {
        self.params.len() / 2
    }

    pub fn weight(&self, layer: usize) -> f32 {
        self.params[2 * layer].data()[0]
    }

    pub fn bias(&self, layer: usize) -> f32 {
        self.params[2 * layer + 1].data()[0]
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

impl Model for AffineModel {
    fn forward(&mut self, inputs: &Tensor) -> Result<Tensor> {
        let mut out = inputs.clone();
        for layer in self.params.chunks(2) {
            out = affine(&out, &layer[0], &layer[1]);
        }
        Ok(out)
    }

    fn parameters(&self) -> &[Tensor] {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut [Tensor] {
        &mut self.params
    }

    fn param_names(&self) -> Vec<String> {
        (0..self.n_layers())
            .flat_map(|l| [format!("layers.{l}.weight"), format!("layers.{l}.bias")])
            .collect()
    }

    fn param_groups(&self) -> Vec<Vec<usize>> {
        (0..self.n_layers()).map(|l| vec![2 * l, 2 * l + 1]).collect()
    }

    fn bias_params(&self) -> Vec<usize> {
        (0..self.n_layers()).map(|l| 2 * l + 1).collect()
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn to_device(&mut self, device: Device) {
        self.device = device;
    }
}
