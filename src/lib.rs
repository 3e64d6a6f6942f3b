//! # Aprendiz: an event-driven training loop
//!
//! Aprendiz trains parameterized models with a callback-driven loop and a
//! composable optimizer.
//!
//! ## Architecture
//!
//! - **autograd**: Minimal reverse-mode differentiation over 1-D tensors
//! - **optim**: Optimizer engine built from stats and steppers (SGD, RMSProp, Adam, LARC, LAMB)
//! - **train**: Learner, events, callbacks, cancellation, recorder and metrics
//! - **io**: Checkpoint saving and loading (JSON, YAML formats)

pub mod autograd;
pub mod io;
pub mod optim;
pub mod train;

pub mod error;

// Re-export commonly used types
pub use autograd::{backward, Tensor};
pub use error::{Error, Result};
