//! Current-state cell.

use parking_lot::RwLock;
use std::sync::Arc;

use super::GetState;
use crate::core::State;

/// Holds the latest reduced state. Only the store loop writes to it.
pub(crate) struct StateCell<S> {
    current: RwLock<S>,
}

impl<S: State> StateCell<S> {
    pub(crate) fn new(initial: S) -> Arc<Self> {
        Arc::new(Self {
            current: RwLock::new(initial),
        })
    }

    pub(crate) fn get(&self) -> S {
        self.current.read().clone()
    }

    pub(crate) fn set(&self, state: S) {
        *self.current.write() = state;
    }

    /// Reader handed to side effects.
    pub(crate) fn reader(self: &Arc<Self>) -> GetState<S> {
        let cell = Arc::clone(self);
        Arc::new(move || cell.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_observe_writes() {
        let cell = StateCell::new(1u32);
        let read = cell.reader();

        cell.set(2);

        assert_eq!(read(), 2);
        assert_eq!(cell.get(), 2);
    }
}
