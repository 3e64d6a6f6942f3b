//! Event tracing

use super::{route, Callback};
use crate::train::{CallbackAction, Event, TrainState};
use crate::Result;

/// Logs the name of every event dispatched
#[derive(Clone, Debug, Default)]
pub struct VerboseCallback;

impl Callback for VerboseCallback {
    fn call(&mut self, event: Event, state: &mut TrainState) -> Result<CallbackAction> {
        log::info!("{event}");
        route(self, event, state)
    }
}
