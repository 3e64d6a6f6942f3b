//! Checkpoint I/O
//!
//! Saves and loads model parameters, optionally together with optimizer
//! state, as JSON or YAML.

mod checkpoint;
mod format;
mod load;
mod model;
mod save;


pub use checkpoint::Checkpoint;
pub use format::{ModelFormat, SaveConfig};
pub use load::{load_checkpoint, read_checkpoint};
pub use model::{ModelState, ParameterInfo};
pub use save::save_checkpoint;
