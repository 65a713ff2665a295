//! State changes produced by reducers and handlers.

use super::state::State;
use std::fmt;
use std::sync::Arc;

/// Function deriving the next state from the current one.
pub type Mutation<S> = Arc<dyn Fn(S) -> S + Send + Sync>;

/// Outcome of a reducer call or a side-effect handler.
///
/// A handler describes *how* the state should change; the store applies the
/// change against whatever state is current when the change is reduced. That
/// keeps handlers that ran concurrently from overwriting each other.
///
/// - `Mutate` derives the next state from the current one
/// - `Override` replaces the current state wholesale
/// - `NoChange` leaves the state alone and emits nothing
///
/// # Example
///
/// ```rust
/// use flowstate::core::ChangedState;
///
/// let increment = ChangedState::mutate(|count: u32| count + 1);
/// assert_eq!(increment.reduce(&41), 42);
///
/// let reset = ChangedState::Override(0u32);
/// assert_eq!(reset.reduce(&41), 0);
///
/// let keep = ChangedState::<u32>::NoChange;
/// assert_eq!(keep.reduce(&41), 41);
/// assert!(keep.is_no_change());
/// ```
pub enum ChangedState<S> {
    Mutate(Mutation<S>),
    Override(S),
    NoChange,
}

impl<S: State> ChangedState<S> {
    /// Build a `Mutate` change from a function of the current state.
    pub fn mutate<F>(f: F) -> Self
    where
        F: Fn(S) -> S + Send + Sync + 'static,
    {
        ChangedState::Mutate(Arc::new(f))
    }

    /// Apply this change to `state`.
    ///
    /// Returns `state` unchanged for `NoChange`.
    pub fn reduce(&self, state: &S) -> S {
        match self {
            ChangedState::Mutate(f) => f(state.clone()),
            ChangedState::Override(next) => next.clone(),
            ChangedState::NoChange => state.clone(),
        }
    }

    pub fn is_no_change(&self) -> bool {
        matches!(self, ChangedState::NoChange)
    }

    /// The state to emit, or `None` if nothing should be emitted.
    ///
    /// A mutation that returns an equal state still counts as an emission.
    pub(crate) fn apply(&self, state: &S) -> Option<S> {
        if self.is_no_change() {
            None
        } else {
            Some(self.reduce(state))
        }
    }
}

impl<S: Clone> Clone for ChangedState<S> {
    fn clone(&self) -> Self {
        match self {
            ChangedState::Mutate(f) => ChangedState::Mutate(Arc::clone(f)),
            ChangedState::Override(next) => ChangedState::Override(next.clone()),
            ChangedState::NoChange => ChangedState::NoChange,
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for ChangedState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangedState::Mutate(_) => f.write_str("Mutate(..)"),
            ChangedState::Override(next) => f.debug_tuple("Override").field(next).finish(),
            ChangedState::NoChange => f.write_str("NoChange"),
        }
    }
}
