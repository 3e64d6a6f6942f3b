//! The callback trait

use crate::train::names::class2attr;
use crate::train::{CallbackAction, Event, TrainState};
use crate::Result;
use std::any::Any;

/// Access to a callback as [`Any`], for typed lookup
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Observer of training events
///
/// Implement the handlers for the events you care about; the rest default to
/// doing nothing. A handler may change the shared [`TrainState`], return a
/// cancel action to abandon the enclosing scope, or fail, which aborts the
/// whole call after the cleanup events already entered have fired.
///
/// # Example
///
/// ```
/// use aprendiz::train::{Callback, CallbackAction, TrainState};
/// use aprendiz::Result;
///
/// /// Stops fitting once the smoothed loss drops below a threshold
/// struct StopBelow(f32);
///
/// impl Callback for StopBelow {
///     fn after_batch(&mut self, state: &mut TrainState) -> Result<CallbackAction> {
///         match state.smooth_loss {
///             Some(loss) if state.training && loss < self.0 => Ok(CallbackAction::CancelFit),
///             _ => Ok(CallbackAction::Continue),
///         }
///     }
/// }
///
/// assert_eq!(StopBelow(0.1).name(), "stop_below");
/// ```
pub trait Callback: AsAny {
    /// Registration name: the type name, snake-cased, without a `Callback`
    /// suffix. At most one callback per name can be attached.
    fn name(&self) -> String {
        class2attr(std::any::type_name::<Self>(), "Callback")
    }

    /// Names of callbacks this one must run after
    fn run_after(&self) -> &[&str] {
        &[]
    }

    /// Names of callbacks this one must run before
    fn run_before(&self) -> &[&str] {
        &[]
    }

    /// Entry point used by the learner; routes to the matching handler
    fn call(&mut self, event: Event, state: &mut TrainState) -> Result<CallbackAction> {
        route(self, event, state)
    }

    fn begin_fit(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn begin_epoch(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn begin_train(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn begin_batch(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_pred(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_loss(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_backward(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_step(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_cancel_batch(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_batch(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_cancel_train(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_train(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn begin_validate(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_cancel_validate(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_validate(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_cancel_epoch(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_epoch(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_cancel_fit(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }

    fn after_fit(&mut self, _state: &mut TrainState) -> Result<CallbackAction> {
        Ok(CallbackAction::Continue)
    }
}

/// Invoke the handler of `cb` that matches `event`
pub fn route<C: Callback + ?Sized>(
    cb: &mut C,
    event: Event,
    state: &mut TrainState,
) -> Result<CallbackAction> {
    match event {
        Event::BeginFit => cb.begin_fit(state),
        Event::BeginEpoch => cb.begin_epoch(state),
        Event::BeginTrain => cb.begin_train(state),
        Event::BeginBatch => cb.begin_batch(state),
        Event::AfterPred => cb.after_pred(state),
        Event::AfterLoss => cb.after_loss(state),
        Event::AfterBackward => cb.after_backward(state),
        Event::AfterStep => cb.after_step(state),
        Event::AfterCancelBatch => cb.after_cancel_batch(state),
        Event::AfterBatch => cb.after_batch(state),
        Event::AfterCancelTrain => cb.after_cancel_train(state),
        Event::AfterTrain => cb.after_train(state),
        Event::BeginValidate => cb.begin_validate(state),
        Event::AfterCancelValidate => cb.after_cancel_validate(state),
        Event::AfterValidate => cb.after_validate(state),
        Event::AfterCancelEpoch => cb.after_cancel_epoch(state),
        Event::AfterEpoch => cb.after_epoch(state),
        Event::AfterCancelFit => cb.after_cancel_fit(state),
        Event::AfterFit => cb.after_fit(state),
    }
}
