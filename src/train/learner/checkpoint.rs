//! Saving and restoring the model and optimizer

use super::Learner;
use crate::io::{read_checkpoint, save_checkpoint, Checkpoint, ModelState, SaveConfig};
use crate::optim::OptimizerState;
use crate::{Error, Result};
use ndarray::Array1;
use std::path::PathBuf;

impl Learner {
    /// Path of checkpoint `name` under the configured checkpoint directory
    pub fn checkpoint_path(&self, name: &str) -> PathBuf {
        self.config
            .checkpoint_dir()
            .join(format!("{name}.{}", self.config.format.extension()))
    }

    /// Write the model parameters, plus the optimizer state if `with_opt`
    /// and an optimizer exists, and return the file written
    pub fn save(&self, name: &str, with_opt: bool) -> Result<PathBuf> {
        let model = &self.state.model;
        let model_state = ModelState::from_tensors(&model.param_names(), model.parameters())?;
        let optimizer = self
            .state
            .opt
            .as_ref()
            .filter(|_| with_opt)
            .map(|opt| opt.state_dict());

        let path = self.checkpoint_path(name);
        let checkpoint = Checkpoint::new(model_state, optimizer);
        save_checkpoint(&checkpoint, &path, &SaveConfig::new(self.config.format))?;
        log::info!("saved checkpoint to {}", path.display());
        Ok(path)
    }

    /// Restore checkpoint `name`
    ///
    /// With `strict`, the checkpoint must hold exactly the model's
    /// parameters, in order and with the same shapes. Otherwise parameters
    /// are matched by name and the unmatched ones are left alone.
    ///
    /// `with_opt` decides what happens to a saved optimizer state: `None`
    /// restores it if present and only warns if that fails, `Some(true)`
    /// makes a failed restore an error, `Some(false)` ignores it. The model
    /// is left untouched when an error is returned.
    pub fn load(&mut self, name: &str, with_opt: Option<bool>, strict: bool) -> Result<()> {
        let path = self.checkpoint_path(name);
        let (saved_model, saved_opt) = read_checkpoint(&path)?;
        let updates = self.match_parameters(&saved_model, strict)?;

        match (saved_opt, with_opt) {
            (_, Some(false)) => {}
            (Some(decoded), _) => match decoded.and_then(|sd| self.restore_opt(sd)) {
                Err(e) if with_opt == Some(true) => return Err(e),
                Err(e) => log::warn!("Could not load the optimizer state: {e}"),
                Ok(()) => {}
            },
            (None, Some(true)) => {
                log::warn!("{} doesn't contain an optimizer state", path.display());
            }
            (None, None) => {}
        }

        let params = self.state.model.parameters_mut();
        for (idx, values) in updates {
            if let Some(param) = params.get_mut(idx) {
                *param.data_mut() = values;
            }
        }
        log::info!("loaded checkpoint from {}", path.display());
        Ok(())
    }

    fn restore_opt(&mut self, sd: OptimizerState) -> Result<()> {
        if self.state.opt.is_none() {
            self.create_opt()?;
        }
        match self.state.opt.as_mut() {
            Some(opt) => opt.load_state_dict(sd),
            None => Ok(()),
        }
    }

    /// Pair every saved array with the index of the model parameter it
    /// belongs to
    fn match_parameters(
        &self,
        saved: &ModelState,
        strict: bool,
    ) -> Result<Vec<(usize, Array1<f32>)>> {
        let model = &self.state.model;
        let names = model.param_names();
        let params = model.parameters();
        let arrays = saved.arrays()?;

        if strict && arrays.len() != params.len() {
            return Err(Error::StateDictMismatch(format!(
                "checkpoint holds {} parameters but the model has {}",
                arrays.len(),
                params.len()
            )));
        }

        let mut updates = Vec::with_capacity(arrays.len());
        for (pos, (info, values)) in arrays.into_iter().enumerate() {
            let idx = if strict {
                (names.get(pos) == Some(&info.name)).then_some(pos)
            } else {
                names.iter().position(|n| *n == info.name)
            };
            let Some(idx) = idx else {
                if strict {
                    return Err(Error::StateDictMismatch(format!(
                        "unexpected parameter `{}` at position {pos}",
                        info.name
                    )));
                }
                log::debug!("skipping unknown parameter `{}`", info.name);
                continue;
            };
            let expected = params.get(idx).map_or(0, |p| p.len());
            if values.len() != expected {
                return Err(Error::ShapeMismatch {
                    expected: vec![expected],
                    got: info.shape.clone(),
                });
            }
            updates.push((idx, values));
        }
        Ok(updates)
    }
}
