//! Events flowing through a declarative state machine's store.

use super::change::ChangedState;
use super::guard::Guard;
use super::state::State;
use crate::error::BoxError;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Everything the store of a declarative machine reduces.
///
/// External actions and internal self-mutations travel the same path, so
/// every side effect observes both in one total order.
#[derive(Clone)]
pub enum Event<S, A> {
    /// Marker emitted once when the machine starts; lets scopes matching the
    /// initial state open before any action arrives.
    Initialized,

    /// Action dispatched from outside the machine.
    Dispatched(A),

    /// State change requested by a handler of a scope.
    ChangeState(StateChange<S>),
}

impl<S, A: fmt::Debug> fmt::Debug for Event<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Initialized => f.write_str("Initialized"),
            Event::Dispatched(action) => f.debug_tuple("Dispatched").field(action).finish(),
            Event::ChangeState(change) => f
                .debug_struct("ChangeState")
                .field("scope", &change.scope)
                .finish_non_exhaustive(),
        }
    }
}

/// A handler's state change, tied to the scope that produced it.
///
/// The change is only applied while the scope's guard still accepts the
/// current state and the scope has not been cancelled. A handler that
/// finishes just after its scope was left therefore cannot clobber the
/// state of the scope that replaced it.
#[derive(Clone)]
pub struct StateChange<S> {
    change: ChangedState<S>,
    guard: Guard<S>,
    token: CancellationToken,
    scope: String,
}

impl<S: State> StateChange<S> {
    pub(crate) fn new(
        change: ChangedState<S>,
        guard: Guard<S>,
        token: CancellationToken,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            change,
            guard,
            token,
            scope: scope.into(),
        }
    }

    /// Whether the change may be applied to `state`.
    pub fn applies_to(&self, state: &S) -> bool {
        !self.token.is_cancelled() && self.guard.check(state)
    }

    /// Name of the scope that produced the change.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub(crate) fn resolve(&self, state: &S) -> ChangedState<S> {
        if self.applies_to(state) {
            self.change.clone()
        } else {
            ChangedState::NoChange
        }
    }
}

/// Reducer of a declarative machine.
///
/// Only [`Event::ChangeState`] can change the state; dispatched actions and
/// the start marker are reduced to `NoChange` and only reach side effects.
pub(crate) fn reduce_event<S: State, A>(
    state: &S,
    event: &Event<S, A>,
) -> Result<ChangedState<S>, BoxError> {
    Ok(match event {
        Event::ChangeState(change) => change.resolve(state),
        Event::Initialized | Event::Dispatched(_) => ChangedState::NoChange,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug)]
    enum TestState {
        Loading,
        Ready(u32),
    }

    fn loading_change(token: &CancellationToken) -> StateChange<TestState> {
        StateChange::new(
            ChangedState::Override(TestState::Ready(1)),
            Guard::new(|s: &TestState| matches!(s, TestState::Loading)),
            token.clone(),
            "loading",
        )
    }

    #[test]
    fn change_applies_while_guard_holds() {
        let token = CancellationToken::new();
        let event: Event<TestState, ()> = Event::ChangeState(loading_change(&token));

        let change = reduce_event(&TestState::Loading, &event).unwrap();

        assert_eq!(change.reduce(&TestState::Loading), TestState::Ready(1));
    }

    #[test]
    fn change_is_dropped_once_guard_fails() {
        let token = CancellationToken::new();
        let event: Event<TestState, ()> = Event::ChangeState(loading_change(&token));

        let change = reduce_event(&TestState::Ready(7), &event).unwrap();

        assert!(change.is_no_change());
    }

    #[test]
    fn change_is_dropped_once_scope_is_cancelled() {
        let token = CancellationToken::new();
        let change = loading_change(&token);
        token.cancel();

        assert!(!change.applies_to(&TestState::Loading));
        assert_eq!(change.scope(), "loading");
    }

    #[test]
    fn actions_and_marker_never_change_state() {
        let dispatched: Event<TestState, &str> = Event::Dispatched("refresh");
        let initialized: Event<TestState, &str> = Event::Initialized;

        assert!(reduce_event(&TestState::Loading, &dispatched)
            .unwrap()
            .is_no_change());
        assert!(reduce_event(&TestState::Loading, &initialized)
            .unwrap()
            .is_no_change());
    }

    #[test]
    fn clones_share_the_scope_token() {
        let token = CancellationToken::new();
        let event: Event<TestState, ()> = Event::ChangeState(loading_change(&token));
        let copy = event.clone();
        token.cancel();

        match copy {
            Event::ChangeState(change) => assert!(!change.applies_to(&TestState::Loading)),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
