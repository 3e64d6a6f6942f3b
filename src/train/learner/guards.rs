//! Scoped changes to a learner, undone when the guard is dropped

use super::Learner;
use crate::train::{Callback, NoopLogger, Reduction, RowLogger};
use crate::Result;
use std::ops::{Deref, DerefMut};

/// Callbacks attached for the lifetime of the guard
pub struct AddedCallbacks<'a> {
    learn: &'a mut Learner,
    names: Vec<String>,
}

impl<'a> AddedCallbacks<'a> {
    /// Attach `cbs` in order. If one of them cannot be attached, the ones
    /// already attached are removed again before the error is returned.
    pub fn new(learn: &'a mut Learner, cbs: Vec<Box<dyn Callback>>) -> Result<Self> {
        let mut guard = Self {
            learn,
            names: Vec::with_capacity(cbs.len()),
        };
        for cb in cbs {
            let name = cb.name().to_string();
            guard.learn.cbs.add(cb)?;
            guard.names.push(name);
        }
        Ok(guard)
    }
}

impl Deref for AddedCallbacks<'_> {
    type Target = Learner;

    fn deref(&self) -> &Learner {
        self.learn
    }
}

impl DerefMut for AddedCallbacks<'_> {
    fn deref_mut(&mut self) -> &mut Learner {
        self.learn
    }
}

impl Drop for AddedCallbacks<'_> {
    fn drop(&mut self) {
        for name in self.names.drain(..) {
            self.learn.cbs.remove(&name);
        }
    }
}

/// Row logging replaced by a [`NoopLogger`] for the lifetime of the guard
pub struct NoLogging<'a> {
    learn: &'a mut Learner,
    prev: Option<Box<dyn RowLogger>>,
}

impl<'a> NoLogging<'a> {
    pub fn new(learn: &'a mut Learner) -> Self {
        let prev = std::mem::replace(&mut learn.state.logger, Box::new(NoopLogger));
        Self {
            learn,
            prev: Some(prev),
        }
    }
}

impl Deref for NoLogging<'_> {
    type Target = Learner;

    fn deref(&self) -> &Learner {
        self.learn
    }
}

impl DerefMut for NoLogging<'_> {
    fn deref_mut(&mut self) -> &mut Learner {
        self.learn
    }
}

impl Drop for NoLogging<'_> {
    fn drop(&mut self) {
        if let Some(prev) = self.prev.take() {
            self.learn.state.logger = prev;
        }
    }
}

/// Loss switched to per-sample values for the lifetime of the guard
///
/// Loss functions without a reduction setting are left alone.
pub struct LossNotReduced<'a> {
    learn: &'a mut Learner,
    prev: Option<Reduction>,
}

impl<'a> LossNotReduced<'a> {
    pub fn new(learn: &'a mut Learner) -> Self {
        let loss_func = &mut learn.state.loss_func;
        let prev = loss_func
            .reduction()
            .filter(|_| loss_func.set_reduction(Reduction::None));
        if prev.is_none() {
            log::warn!("{} does not support an unreduced loss", loss_func.name());
        }
        Self { learn, prev }
    }

    /// Whether the loss is actually unreduced while the guard lives
    pub fn is_active(&self) -> bool {
        self.prev.is_some()
    }
}

impl Deref for LossNotReduced<'_> {
    type Target = Learner;

    fn deref(&self) -> &Learner {
        self.learn
    }
}

impl DerefMut for LossNotReduced<'_> {
    fn deref_mut(&mut self) -> &mut Learner {
        self.learn
    }
}

impl Drop for LossNotReduced<'_> {
    fn drop(&mut self) {
        if let Some(prev) = self.prev {
            self.learn.state.loss_func.set_reduction(prev);
        }
    }
}
