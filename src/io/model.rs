//! Model parameter state for serialization

use crate::{Error, Result, Tensor};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Information about a model parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Parameter name (e.g., "layer1.weight", "bias")
    pub name: String,

    /// Parameter shape
    pub shape: Vec<usize>,

    /// Data type
    pub dtype: String,

    /// Whether this parameter requires gradients
    pub requires_grad: bool,
}

impl ParameterInfo {
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Serializable model parameters: one [`ParameterInfo`] per parameter and
/// all values flattened in the same order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    /// Parameter information
    pub parameters: Vec<ParameterInfo>,

    /// Flattened parameter data
    pub data: Vec<f32>,
}

impl ModelState {
    /// Capture `tensors`, named by `names`
    pub fn from_tensors(names: &[String], tensors: &[Tensor]) -> Result<Self> {
        if names.len() != tensors.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![tensors.len()],
                got: vec![names.len()],
            });
        }

        let mut data = Vec::with_capacity(tensors.iter().map(Tensor::len).sum());
        let parameters = names
            .iter()
            .zip(tensors)
            .map(|(name, tensor)| {
                data.extend(tensor.data().iter().copied());
                ParameterInfo {
                    name: name.clone(),
                    shape: vec![tensor.len()],
                    dtype: "f32".to_string(),
                    requires_grad: tensor.requires_grad(),
                }
            })
            .collect();

        Ok(Self { parameters, data })
    }

    /// Split the flat data back into one array per parameter
    pub fn arrays(&self) -> Result<Vec<(&ParameterInfo, Array1<f32>)>> {
        let total: usize = self.parameters.iter().map(ParameterInfo::numel).sum();
        if total != self.data.len() {
            return Err(Error::Serialization(format!(
                "model state declares {total} values but holds {}",
                self.data.len()
            )));
        }

        let mut offset = 0;
        Ok(self
            .parameters
            .iter()
            .map(|info| {
                let size = info.numel();
                let values = Array1::from(self.data[offset..offset + size].to_vec());
                offset += size;
                (info, values)
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
