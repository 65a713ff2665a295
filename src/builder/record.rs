//! Registered handlers, ready to become store side effects.

use crate::core::{Action, Event, ExecutionPolicy, Guard, State};
use crate::effects::ScopeBody;
use crate::flow::{stay_while, while_in_state, StayGuard};
use crate::logger::TaggedLogger;
use crate::store::SideEffect;
use std::sync::Arc;

/// Whether two states have the same identity.
pub(crate) type SameIdentity<S> = Arc<dyn Fn(&S, &S) -> bool + Send + Sync>;

/// Kind of a registered handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    OnEnter,
    OnAction(ExecutionPolicy),
    CollectWhileInState(ExecutionPolicy),
    OnEnterStartStateMachine,
    OnActionStartStateMachine,
}

impl HandlerKind {
    /// Policy of handlers triggered by a stream of values.
    pub fn policy(&self) -> Option<ExecutionPolicy> {
        match self {
            HandlerKind::OnAction(policy) | HandlerKind::CollectWhileInState(policy) => {
                Some(*policy)
            }
            HandlerKind::OnEnter
            | HandlerKind::OnEnterStartStateMachine
            | HandlerKind::OnActionStartStateMachine => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HandlerKind::OnEnter => "on_enter",
            HandlerKind::OnAction(_) => "on_action",
            HandlerKind::CollectWhileInState(_) => "collect_while_in_state",
            HandlerKind::OnEnterStartStateMachine => "on_enter_start_state_machine",
            HandlerKind::OnActionStartStateMachine => "on_action_start_state_machine",
        }
    }
}

/// One handler: the scope it lives in and what it does there.
pub(crate) struct SideEffectRecord<S, A> {
    pub(crate) name: String,
    pub(crate) kind: HandlerKind,
    pub(crate) guard: Guard<S>,
    pub(crate) identity: Option<SameIdentity<S>>,
    pub(crate) body: Arc<dyn ScopeBody<S, A>>,
}

impl<S: State, A: Action> SideEffectRecord<S, A> {
    /// Guard a stay entered with some state must keep satisfying.
    fn stay_guard(&self) -> StayGuard<S> {
        let guard = self.guard.clone();
        match &self.identity {
            None => stay_while(guard),
            Some(same) => {
                let same = Arc::clone(same);
                Arc::new(move |entered: &S| {
                    let entered = entered.clone();
                    let same = Arc::clone(&same);
                    guard.and(&Guard::new(move |state: &S| same(&entered, state)))
                })
            }
        }
    }

    /// Side effect running this handler inside its scope.
    pub(crate) fn side_effect(&self, logger: &TaggedLogger) -> SideEffect<S, Event<S, A>> {
        let entry = self.guard.clone();
        let stay = self.stay_guard();
        let body = Arc::clone(&self.body);
        let logger = logger.wrap(&self.name);

        Box::new(move |events, get_state| {
            let scope_logger = logger.clone();
            while_in_state(events, get_state, entry, stay, logger, move |input| {
                body.run(input, scope_logger.clone())
            })
        })
    }
}
