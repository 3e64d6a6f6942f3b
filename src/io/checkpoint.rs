//! Training checkpoints

use super::model::ModelState;
use crate::optim::OptimizerState;
use serde::{Deserialize, Serialize};

/// Model parameters plus, optionally, the optimizer that was training them
///
/// Without an optimizer a checkpoint is written as a bare [`ModelState`],
/// so model-only files stay readable by anything that reads model states.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub model: ModelState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimizer: Option<OptimizerState>,
}

impl Checkpoint {
    pub fn new(model: ModelState, optimizer: Option<OptimizerState>) -> Self {
        Self { model, optimizer }
    }

    pub fn has_optimizer(&self) -> bool {
        self.optimizer.is_some()
    }
}
