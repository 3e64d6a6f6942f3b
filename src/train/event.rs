//! Training events

use std::fmt;

/// A named point of the training loop at which callbacks run
///
/// Variants are declared in the order they first occur during a fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Event {
    BeginFit,
    BeginEpoch,
    BeginTrain,
    BeginBatch,
    AfterPred,
    AfterLoss,
    AfterBackward,
    AfterStep,
    AfterCancelBatch,
    AfterBatch,
    AfterCancelTrain,
    AfterTrain,
    BeginValidate,
    AfterCancelValidate,
    AfterValidate,
    AfterCancelEpoch,
    AfterEpoch,
    AfterCancelFit,
    AfterFit,
}

impl Event {
    pub const ALL: [Event; 19] = [
        Event::BeginFit,
        Event::BeginEpoch,
        Event::BeginTrain,
        Event::BeginBatch,
        Event::AfterPred,
        Event::AfterLoss,
        Event::AfterBackward,
        Event::AfterStep,
        Event::AfterCancelBatch,
        Event::AfterBatch,
        Event::AfterCancelTrain,
        Event::AfterTrain,
        Event::BeginValidate,
        Event::AfterCancelValidate,
        Event::AfterValidate,
        Event::AfterCancelEpoch,
        Event::AfterEpoch,
        Event::AfterCancelFit,
        Event::AfterFit,
    ];

    /// Events opening an inference-only pass
    pub const BEFORE_INFERENCE: [Event; 3] =
        [Event::BeginFit, Event::BeginEpoch, Event::BeginValidate];

    /// Events closing an inference-only pass
    pub const AFTER_INFERENCE: [Event; 3] =
        [Event::AfterValidate, Event::AfterEpoch, Event::AfterFit];

    pub fn name(&self) -> &'static str {
        match self {
            Event::BeginFit => "begin_fit",
            Event::BeginEpoch => "begin_epoch",
            Event::BeginTrain => "begin_train",
            Event::BeginBatch => "begin_batch",
            Event::AfterPred => "after_pred",
            Event::AfterLoss => "after_loss",
            Event::AfterBackward => "after_backward",
            Event::AfterStep => "after_step",
            Event::AfterCancelBatch => "after_cancel_batch",
            Event::AfterBatch => "after_batch",
            Event::AfterCancelTrain => "after_cancel_train",
            Event::AfterTrain => "after_train",
            Event::BeginValidate => "begin_validate",
            Event::AfterCancelValidate => "after_cancel_validate",
            Event::AfterValidate => "after_validate",
            Event::AfterCancelEpoch => "after_cancel_epoch",
            Event::AfterEpoch => "after_epoch",
            Event::AfterCancelFit => "after_cancel_fit",
            Event::AfterFit => "after_fit",
        }
    }

    /// Look an event up by its name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.name() == name)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
