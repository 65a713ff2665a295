//! Where a machine gets its initial state and records emitted states.

use crate::core::State;
use parking_lot::Mutex;
use std::sync::Arc;

/// Collaborator supplying the state a launch starts from and observing every
/// state a machine emits.
pub trait StateHolder<S>: Send + Sync {
    /// State the next launch starts from.
    fn get_state(&self) -> S;

    /// Called with every emitted state, the initial one included.
    fn save_state(&self, state: &S);
}

/// Supplier of a fresh initial state.
pub type InitialState<S> = Arc<dyn Fn() -> S + Send + Sync>;

/// Remembers the last emitted state; the next launch resumes from it.
///
/// # Example
///
/// ```rust
/// use flowstate::machine::{InMemoryStateHolder, StateHolder};
///
/// let holder = InMemoryStateHolder::new(|| 0u32);
/// assert_eq!(holder.get_state(), 0);
///
/// holder.save_state(&7);
/// assert_eq!(holder.get_state(), 7);
/// ```
pub struct InMemoryStateHolder<S> {
    initial: InitialState<S>,
    last: Mutex<Option<S>>,
}

impl<S: State> InMemoryStateHolder<S> {
    pub fn new<F>(initial: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        Self::from_supplier(Arc::new(initial))
    }

    pub(crate) fn from_supplier(initial: InitialState<S>) -> Self {
        Self {
            initial,
            last: Mutex::new(None),
        }
    }
}

impl<S: State> StateHolder<S> for InMemoryStateHolder<S> {
    fn get_state(&self) -> S {
        match self.last.lock().as_ref() {
            Some(state) => state.clone(),
            None => (self.initial)(),
        }
    }

    fn save_state(&self, state: &S) {
        *self.last.lock() = Some(state.clone());
    }
}

/// Always starts from the supplier; emitted states are not kept.
pub struct LossyStateHolder<S> {
    initial: InitialState<S>,
}

impl<S: State> LossyStateHolder<S> {
    pub fn new<F>(initial: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        Self::from_supplier(Arc::new(initial))
    }

    pub(crate) fn from_supplier(initial: InitialState<S>) -> Self {
        Self { initial }
    }
}

impl<S: State> StateHolder<S> for LossyStateHolder<S> {
    fn get_state(&self) -> S {
        (self.initial)()
    }

    fn save_state(&self, _state: &S) {}
}
