//! Declarative description of a state machine's side effects.

use crate::builder::error::BuildError;
use crate::builder::in_state::{InStateBuilder, ScopeInfo};
use crate::builder::record::{HandlerKind, SideEffectRecord};
use crate::core::{Action, Event, ExecutionPolicy, Guard, State};
use crate::logger::TaggedLogger;
use crate::store::SideEffect;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Side effects of a state machine, grouped by the states they run in.
///
/// Blocks are evaluated independently: a state matching several `in_state`
/// predicates runs the handlers of all of them.
///
/// # Example
///
/// ```rust
/// use flowstate::builder::StateMachineSpec;
/// use flowstate::core::{ChangedState, ExecutionPolicy};
/// use flowstate::error::BoxError;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Screen {
///     Loading,
///     Ready(Vec<String>),
///     Failed,
/// }
///
/// #[derive(Clone, Debug)]
/// enum Input {
///     Retry,
/// }
///
/// let spec = StateMachineSpec::<Screen, Input>::new()
///     .in_state(
///         |screen| matches!(screen, Screen::Loading),
///         |scope| {
///             scope.on_enter(|_| async {
///                 Ok::<_, BoxError>(ChangedState::Override(Screen::Ready(vec!["a".into()])))
///             })
///         },
///     )
///     .in_state(
///         |screen| matches!(screen, Screen::Failed),
///         |scope| {
///             scope.on(
///                 |input: &Input| matches!(input, Input::Retry).then_some(()),
///                 ExecutionPolicy::CancelPrevious,
///                 |_, _| async { Ok::<_, BoxError>(ChangedState::Override(Screen::Loading)) },
///             )
///         },
///     );
///
/// assert!(spec.validate().is_success());
/// assert_eq!(spec.handler_kinds().len(), 2);
/// ```
pub struct StateMachineSpec<S, A> {
    records: Vec<SideEffectRecord<S, A>>,
    scopes: Vec<ScopeInfo>,
    blocks: usize,
}

impl<S: State, A: Action> StateMachineSpec<S, A> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            scopes: Vec::new(),
            blocks: 0,
        }
    }

    /// Register handlers that run while the state satisfies `predicate`.
    pub fn in_state<P, B>(self, predicate: P, block: B) -> Self
    where
        P: Fn(&S) -> bool + Send + Sync + 'static,
        B: FnOnce(InStateBuilder<S, A>) -> InStateBuilder<S, A>,
    {
        self.in_state_where(Guard::new(predicate), block)
    }

    /// Register handlers that run in every state.
    pub fn in_any_state<B>(self, block: B) -> Self
    where
        B: FnOnce(InStateBuilder<S, A>) -> InStateBuilder<S, A>,
    {
        self.in_state_where(Guard::always(), block)
    }

    /// Like [`in_state`](Self::in_state) with a prebuilt guard.
    pub fn in_state_where<B>(mut self, guard: Guard<S>, block: B) -> Self
    where
        B: FnOnce(InStateBuilder<S, A>) -> InStateBuilder<S, A>,
    {
        let name = format!("in_state[{}]", self.blocks);
        self.blocks += 1;
        let (records, nested) = block(InStateBuilder::new(name.clone(), guard)).into_parts();

        self.scopes.push(ScopeInfo {
            name,
            handlers: records.len(),
        });
        self.scopes.extend(nested);
        self.records.extend(records);
        self
    }

    /// Kinds of all registered handlers, in registration order.
    pub fn handler_kinds(&self) -> Vec<HandlerKind> {
        self.records.iter().map(|record| record.kind).collect()
    }

    /// Check for blocks that can never do anything.
    ///
    /// Accumulates every problem instead of stopping at the first.
    pub fn validate(&self) -> Validation<(), NonEmptyVec<BuildError>> {
        let mut checks: Vec<Validation<(), NonEmptyVec<BuildError>>> = Vec::new();

        if self.scopes.is_empty() {
            checks.push(Validation::fail(BuildError::EmptySpec));
        }

        for scope in self.scopes.iter().filter(|scope| scope.handlers == 0) {
            checks.push(Validation::fail(BuildError::EmptyScope {
                scope: scope.name.clone(),
            }));
        }

        for record in &self.records {
            if let Some(ExecutionPolicy::Throttled(window)) = record.kind.policy() {
                if window.is_zero() {
                    checks.push(Validation::fail(BuildError::ZeroThrottleWindow {
                        handler: record.name.clone(),
                    }));
                }
            }
        }

        checks.push(Validation::success(()));
        Validation::all_vec(checks).map(|_| ())
    }

    /// One store side effect per registered handler.
    pub(crate) fn side_effects(&self, logger: &TaggedLogger) -> Vec<SideEffect<S, Event<S, A>>> {
        self.records
            .iter()
            .map(|record| record.side_effect(logger))
            .collect()
    }
}

impl<S: State, A: Action> Default for StateMachineSpec<S, A> {
    fn default() -> Self {
        Self::new()
    }
}
