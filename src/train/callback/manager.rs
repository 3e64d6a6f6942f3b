//! Ordered set of attached callbacks

use super::Callback;
use crate::train::cancel::{Flow, Interrupt};
use crate::train::{Event, TrainState};
use crate::{Error, Result};

struct Entry {
    name: String,
    seq: u64,
    cb: Box<dyn Callback>,
}

/// Holds the attached callbacks in dispatch order
///
/// The order is a stable topological sort of the `run_after`/`run_before`
/// constraints; callbacks the constraints do not order run in the order
/// they were added.
#[derive(Default)]
pub struct CallbackManager {
    entries: Vec<Entry>,
    next_seq: u64,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a callback
    ///
    /// Fails if a callback with the same name is attached, or if the
    /// ordering constraints can no longer be satisfied. In both cases the
    /// manager is left unchanged.
    pub fn add(&mut self, cb: Box<dyn Callback>) -> Result<()> {
        let name = cb.name();
        if self.contains(&name) {
            return Err(Error::DuplicateCallback(name));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Entry { name, seq, cb });

        if let Err(e) = self.sort() {
            self.entries.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Detach and return the callback called `name`
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Callback>> {
        let pos = self.entries.iter().position(|e| e.name == name)?;
        Some(self.entries.remove(pos).cb)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Names in dispatch order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The attached callback of type `T`, if any
    pub fn get<T: Callback + 'static>(&self) -> Option<&T> {
        self.entries
            .iter()
            .find_map(|e| (*e.cb).as_any().downcast_ref::<T>())
    }

    pub fn get_mut<T: Callback + 'static>(&mut self) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find_map(|e| (*e.cb).as_any_mut().downcast_mut::<T>())
    }

    /// Run `event` through every callback in order, stopping at the first
    /// one that cancels or fails
    pub(crate) fn dispatch(&mut self, event: Event, state: &mut TrainState) -> Flow {
        for entry in &mut self.entries {
            let action = entry.cb.call(event, state).map_err(Interrupt::Fatal)?;
            if let Some(signal) = action.signal() {
                log::debug!("{} raised {signal} during {event}", entry.name);
                return Err(Interrupt::Cancel(signal));
            }
        }
        Ok(())
    }

    fn must_precede(a: &Entry, b: &Entry) -> bool {
        b.cb.run_after().contains(&a.name.as_str()) || a.cb.run_before().contains(&b.name.as_str())
    }

    fn sort(&mut self) -> Result<()> {
        let n = self.entries.len();
        let mut successors = vec![Vec::new(); n];
        let mut in_degree = vec![0usize; n];
        for i in 0..n {
            for j in 0..n {
                if i != j && Self::must_precede(&self.entries[i], &self.entries[j]) {
                    successors[i].push(j);
                    in_degree[j] += 1;
                }
            }
        }

        let mut placed = vec![false; n];
        let mut order = Vec::with_capacity(n);
        while order.len() < n {
            let next = (0..n)
                .filter(|&k| !placed[k] && in_degree[k] == 0)
                .min_by_key(|&k| self.entries[k].seq);
            let Some(k) = next else {
                let stuck: Vec<&str> = (0..n)
                    .filter(|&k| !placed[k])
                    .map(|k| self.entries[k].name.as_str())
                    .collect();
                return Err(Error::CallbackOrder(format!(
                    "cyclic run_after/run_before constraints between {}",
                    stuck.join(", ")
                )));
            };
            placed[k] = true;
            order.push(k);
            for &j in &successors[k] {
                in_degree[j] -= 1;
            }
        }

        let mut slots: Vec<Option<Entry>> = self.entries.drain(..).map(Some).collect();
        self.entries = order.into_iter().filter_map(|k| slots[k].take()).collect();
        Ok(())
    }
}

impl std::fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
