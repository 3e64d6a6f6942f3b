//! Error types for Aprendiz

use crate::train::CancelSignal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Trying to set {got} values for {name} but there are {groups} parameter groups")]
    HyperCount {
        name: String,
        got: usize,
        groups: usize,
    },

    #[error("Missing hyperparameter `{key}` in parameter group {group}")]
    MissingHyper { key: String, group: usize },

    #[error("State dict mismatch: {0}")]
    StateDictMismatch(String),

    #[error("A callback named `{0}` is already registered")]
    DuplicateCallback(String),

    #[error("Callback ordering cannot be satisfied: {0}")]
    CallbackOrder(String),

    #[error("{0} was raised outside of any scope that handles it")]
    Cancelled(CancelSignal),

    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, Error>;
