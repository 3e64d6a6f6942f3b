//! Callbacks: observers of the training loop
//!
//! Every [`Callback`] attached to a learner receives each [`crate::train::Event`]
//! in the order kept by the [`CallbackManager`]. [`TrainEvalCallback`] and
//! [`Recorder`] are always attached.

mod gather_preds;
mod manager;
mod recorder;
mod train_eval;
mod traits;
mod verbose;

pub use gather_preds::{GatherPredsCallback, Predictions};
pub use manager::CallbackManager;
pub use recorder::Recorder;
pub use train_eval::TrainEvalCallback;
pub use traits::{route, AsAny, Callback};
pub use verbose::VerboseCallback;
