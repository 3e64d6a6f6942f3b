//! Cancellation signals and the control flow threaded through the loop

use crate::Error;
use std::fmt;

/// Request to abandon the rest of a loop scope
///
/// Each signal is handled by exactly one scope: the batch, the training or
/// validation phase, the epoch, or the whole fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CancelSignal {
    Batch,
    Train,
    Valid,
    Epoch,
    Fit,
}

impl fmt::Display for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CancelSignal::Batch => "CancelBatch",
            CancelSignal::Train => "CancelTrain",
            CancelSignal::Valid => "CancelValid",
            CancelSignal::Epoch => "CancelEpoch",
            CancelSignal::Fit => "CancelFit",
        };
        f.write_str(name)
    }
}

/// What a callback asks the loop to do after handling an event
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CallbackAction {
    #[default]
    Continue,
    CancelBatch,
    CancelTrain,
    CancelValid,
    CancelEpoch,
    CancelFit,
}

impl CallbackAction {
    pub fn signal(self) -> Option<CancelSignal> {
        match self {
            CallbackAction::Continue => None,
            CallbackAction::CancelBatch => Some(CancelSignal::Batch),
            CallbackAction::CancelTrain => Some(CancelSignal::Train),
            CallbackAction::CancelValid => Some(CancelSignal::Valid),
            CallbackAction::CancelEpoch => Some(CancelSignal::Epoch),
            CallbackAction::CancelFit => Some(CancelSignal::Fit),
        }
    }
}

impl From<CancelSignal> for CallbackAction {
    fn from(signal: CancelSignal) -> Self {
        match signal {
            CancelSignal::Batch => CallbackAction::CancelBatch,
            CancelSignal::Train => CallbackAction::CancelTrain,
            CancelSignal::Valid => CallbackAction::CancelValid,
            CancelSignal::Epoch => CallbackAction::CancelEpoch,
            CancelSignal::Fit => CallbackAction::CancelFit,
        }
    }
}

/// Why a loop step stopped early
#[derive(Debug)]
pub(crate) enum Interrupt {
    Cancel(CancelSignal),
    Fatal(Error),
}

impl Interrupt {
    /// Surface to the caller. A cancel that reaches this point was not
    /// handled by any scope.
    pub(crate) fn into_error(self) -> Error {
        match self {
            Interrupt::Cancel(signal) => Error::Cancelled(signal),
            Interrupt::Fatal(e) => e,
        }
    }
}

impl From<Error> for Interrupt {
    fn from(e: Error) -> Self {
        Interrupt::Fatal(e)
    }
}

pub(crate) type Flow = std::result::Result<(), Interrupt>;
