//! Guard predicates over machine state.
//!
//! Guards decide whether a scope is active for a given state. They are pure
//! and cheap to clone, so one guard can be shared by a dispatcher, every
//! handler it launches and every state change those handlers produce.

use super::state::State;
use std::fmt;
use std::sync::Arc;

/// Pure predicate that decides whether a state belongs to a scope.
///
/// # Example
///
/// ```rust
/// use flowstate::core::Guard;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum TaskState {
///     Pending,
///     Running,
///     Complete,
/// }
///
/// let active = Guard::new(|s: &TaskState| !matches!(s, TaskState::Complete));
///
/// assert!(active.check(&TaskState::Pending));
/// assert!(active.check(&TaskState::Running));
/// assert!(!active.check(&TaskState::Complete));
/// ```
pub struct Guard<S> {
    predicate: Arc<dyn Fn(&S) -> bool + Send + Sync>,
}

impl<S: State> Guard<S> {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic and thread-safe (Send + Sync).
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Guard that accepts every state.
    pub fn always() -> Self {
        Guard::new(|_| true)
    }

    /// Check if the guard accepts this state.
    pub fn check(&self, state: &S) -> bool {
        (self.predicate)(state)
    }

    /// Guard that accepts a state only when both guards do.
    ///
    /// # Example
    ///
    /// ```rust
    /// use flowstate::core::Guard;
    ///
    /// let positive = Guard::new(|n: &i32| *n > 0);
    /// let small_positive = positive.and(&Guard::new(|n: &i32| *n < 10));
    ///
    /// assert!(small_positive.check(&5));
    /// assert!(!small_positive.check(&-1));
    /// assert!(!small_positive.check(&42));
    /// ```
    pub fn and(&self, other: &Guard<S>) -> Guard<S> {
        let first = Arc::clone(&self.predicate);
        let second = Arc::clone(&other.predicate);
        Guard {
            predicate: Arc::new(move |state| first(state) && second(state)),
        }
    }
}

impl<S> Clone for Guard<S> {
    fn clone(&self) -> Self {
        Guard {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<S> fmt::Debug for Guard<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug)]
    enum TestState {
        Initial,
        Processing,
        Complete,
        Failed,
    }

    #[test]
    fn guard_allows_matching_states() {
        let guard = Guard::new(|s: &TestState| matches!(s, TestState::Initial));

        assert!(guard.check(&TestState::Initial));
        assert!(!guard.check(&TestState::Processing));
    }

    #[test]
    fn always_accepts_everything() {
        let guard = Guard::<TestState>::always();

        assert!(guard.check(&TestState::Initial));
        assert!(guard.check(&TestState::Failed));
    }

    #[test]
    fn and_requires_both_predicates() {
        let running = Guard::new(|s: &TestState| {
            matches!(s, TestState::Processing | TestState::Complete)
        });
        let not_done = Guard::new(|s: &TestState| !matches!(s, TestState::Complete));
        let guard = running.and(&not_done);

        assert!(guard.check(&TestState::Processing));
        assert!(!guard.check(&TestState::Complete));
        assert!(!guard.check(&TestState::Initial));
    }

    #[test]
    fn clones_share_the_predicate() {
        let guard = Guard::new(|s: &TestState| matches!(s, TestState::Failed));
        let clone = guard.clone();

        assert_eq!(
            guard.check(&TestState::Failed),
            clone.check(&TestState::Failed)
        );
        assert_eq!(
            guard.check(&TestState::Initial),
            clone.check(&TestState::Initial)
        );
    }

    #[test]
    fn guard_is_deterministic() {
        let state = TestState::Processing;
        let guard = Guard::new(|s: &TestState| !matches!(s, TestState::Complete));

        assert_eq!(guard.check(&state), guard.check(&state));
    }
}
