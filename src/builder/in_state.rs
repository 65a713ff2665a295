//! Handlers of one state scope.

use crate::builder::record::{HandlerKind, SameIdentity, SideEffectRecord};
use crate::core::{Action, ChangedState, ExecutionPolicy, Guard, State};
use crate::effects::{
    boxed_handler, CollectWhileInState, HandlerResult, OnAction, OnEnter, ScopeBody,
    StartOnAction, StartOnEnter,
};
use crate::error::BoxError;
use crate::machine::StateMachine;
use futures::{FutureExt, Stream, StreamExt};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

/// Name and handler count of a registered scope.
#[derive(Clone, Debug)]
pub(crate) struct ScopeInfo {
    pub(crate) name: String,
    pub(crate) handlers: usize,
}

/// Fluent builder for the handlers of one `in_state` block.
///
/// Every handler only runs while the machine's state satisfies the block's
/// predicate. Leaving the scope cancels whatever its handlers are doing, and
/// re-entering starts them afresh.
pub struct InStateBuilder<S, A> {
    name: String,
    guard: Guard<S>,
    identity: Option<SameIdentity<S>>,
    records: Vec<SideEffectRecord<S, A>>,
    scopes: Vec<ScopeInfo>,
    nested: usize,
}

impl<S: State, A: Action> InStateBuilder<S, A> {
    pub(crate) fn new(name: String, guard: Guard<S>) -> Self {
        Self {
            name,
            guard,
            identity: None,
            records: Vec::new(),
            scopes: Vec::new(),
            nested: 0,
        }
    }

    /// Run `handler` once each time the machine enters this scope.
    ///
    /// The handler receives the state at entry. Its result is dropped if the
    /// machine left the scope in the meantime.
    pub fn on_enter<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<S>> + Send + 'static,
    {
        let body = OnEnter::new(Arc::new(move |state| handler(state).boxed()));
        self.register(HandlerKind::OnEnter, body)
    }

    /// Like [`on_enter`](Self::on_enter) for handlers that never change the
    /// state.
    pub fn on_enter_effect<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_enter(move |state| {
            let work = handler(state);
            async move { work.await.map(|_| ChangedState::NoChange) }
        })
    }

    /// Run `handler` for every dispatched action `extract` accepts.
    ///
    /// `policy` decides what happens when an action arrives while a previous
    /// invocation is still running.
    pub fn on<T, X, F, Fut>(self, extract: X, policy: ExecutionPolicy, handler: F) -> Self
    where
        T: Send + 'static,
        X: Fn(&A) -> Option<T> + Send + Sync + 'static,
        F: Fn(T, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<S>> + Send + 'static,
    {
        let body = OnAction::new(Arc::new(extract), policy, boxed_handler(handler));
        self.register(HandlerKind::OnAction(policy), body)
    }

    /// Like [`on`](Self::on) for handlers that never change the state.
    pub fn on_action_effect<T, X, F, Fut>(
        self,
        extract: X,
        policy: ExecutionPolicy,
        handler: F,
    ) -> Self
    where
        T: Send + 'static,
        X: Fn(&A) -> Option<T> + Send + Sync + 'static,
        F: Fn(T, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on(extract, policy, move |value, state| {
            let work = handler(value, state);
            async move { work.await.map(|_| ChangedState::NoChange) }
        })
    }

    /// Collect the stream built by `source` for as long as the machine stays
    /// in this scope, running `handler` for each value.
    pub fn collect_while_in_state<T, B, St, F, Fut>(
        self,
        source: B,
        policy: ExecutionPolicy,
        handler: F,
    ) -> Self
    where
        T: Send + 'static,
        B: Fn(&S) -> St + Send + Sync + 'static,
        St: Stream<Item = T> + Send + 'static,
        F: Fn(T, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<S>> + Send + 'static,
    {
        let body = CollectWhileInState::new(
            Arc::new(move |state: &S| source(state).boxed()),
            policy,
            boxed_handler(handler),
        );
        self.register(HandlerKind::CollectWhileInState(policy), body)
    }

    /// Like [`collect_while_in_state`](Self::collect_while_in_state) for
    /// handlers that never change the state.
    pub fn collect_while_in_state_effect<T, B, St, F, Fut>(
        self,
        source: B,
        policy: ExecutionPolicy,
        handler: F,
    ) -> Self
    where
        T: Send + 'static,
        B: Fn(&S) -> St + Send + Sync + 'static,
        St: Stream<Item = T> + Send + 'static,
        F: Fn(T, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.collect_while_in_state(source, policy, move |value, state| {
            let work = handler(value, state);
            async move { work.await.map(|_| ChangedState::NoChange) }
        })
    }

    /// Start a child machine each time the machine enters this scope.
    ///
    /// Actions accepted by `map_action` are forwarded to the child, and every
    /// child state is folded into the parent through `map_state`. The child is
    /// cancelled when the parent leaves the scope.
    pub fn on_enter_start_state_machine<SubS, SubA, Fa, Ma, Ms>(
        self,
        factory: Fa,
        map_action: Ma,
        map_state: Ms,
    ) -> Self
    where
        SubS: State,
        SubA: Action,
        Fa: Fn(&S) -> StateMachine<SubS, SubA> + Send + Sync + 'static,
        Ma: Fn(&A) -> Option<SubA> + Send + Sync + 'static,
        Ms: Fn(&S, SubS) -> ChangedState<S> + Send + Sync + 'static,
    {
        let body = StartOnEnter::new(Arc::new(factory), Arc::new(map_action), Arc::new(map_state));
        self.register(HandlerKind::OnEnterStartStateMachine, body)
    }

    /// Start a child machine for every action `trigger` accepts.
    ///
    /// Children are keyed by the trigger's value: a second trigger with an
    /// equal key cancels the first child, while distinct keys run side by
    /// side. Other actions accepted by `map_action` are forwarded to every
    /// running child.
    pub fn on_action_start_state_machine<K, SubS, SubA, Tr, Fa, Ma, Ms>(
        self,
        trigger: Tr,
        factory: Fa,
        map_action: Ma,
        map_state: Ms,
    ) -> Self
    where
        K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
        SubS: State,
        SubA: Action,
        Tr: Fn(&A) -> Option<K> + Send + Sync + 'static,
        Fa: Fn(K, &S) -> StateMachine<SubS, SubA> + Send + Sync + 'static,
        Ma: Fn(&A) -> Option<SubA> + Send + Sync + 'static,
        Ms: Fn(&S, SubS) -> ChangedState<S> + Send + Sync + 'static,
    {
        let body = StartOnAction::new(
            Arc::new(trigger),
            Arc::new(factory),
            Arc::new(map_action),
            Arc::new(map_state),
        );
        self.register(HandlerKind::OnActionStartStateMachine, body)
    }

    /// Nested scope that additionally requires `predicate`.
    pub fn condition<P, B>(mut self, predicate: P, block: B) -> Self
    where
        P: Fn(&S) -> bool + Send + Sync + 'static,
        B: FnOnce(InStateBuilder<S, A>) -> InStateBuilder<S, A>,
    {
        let mut nested = self.nested_builder("condition");
        nested.guard = self.guard.and(&Guard::new(predicate));
        self.absorb(block(nested))
    }

    /// Nested scope whose stay ends as soon as `identity` of the state
    /// changes, even if the state still satisfies the outer predicate.
    ///
    /// # Example
    ///
    /// ```rust
    /// use flowstate::builder::StateMachineSpec;
    /// use flowstate::core::ChangedState;
    /// use flowstate::error::BoxError;
    ///
    /// #[derive(Clone, Debug)]
    /// struct Viewer {
    ///     item: u32,
    ///     loaded: bool,
    /// }
    ///
    /// // Loads again whenever the viewer switches to another item.
    /// let spec = StateMachineSpec::<Viewer, ()>::new().in_any_state(|scope| {
    ///     scope.until_identity_changes(
    ///         |viewer| viewer.item,
    ///         |scope| {
    ///             scope.on_enter(|viewer: Viewer| async move {
    ///                 Ok::<_, BoxError>(ChangedState::Override(Viewer { loaded: true, ..viewer }))
    ///             })
    ///         },
    ///     )
    /// });
    /// assert_eq!(spec.handler_kinds().len(), 1);
    /// ```
    pub fn until_identity_changes<K, I, B>(mut self, identity: I, block: B) -> Self
    where
        K: PartialEq + 'static,
        I: Fn(&S) -> K + Send + Sync + 'static,
        B: FnOnce(InStateBuilder<S, A>) -> InStateBuilder<S, A>,
    {
        let same: SameIdentity<S> = Arc::new(move |left, right| identity(left) == identity(right));
        let mut nested = self.nested_builder("until_identity_changes");
        nested.identity = Some(match self.identity.clone() {
            Some(outer) => Arc::new(move |left, right| outer(left, right) && same(left, right)),
            None => same,
        });
        self.absorb(block(nested))
    }

    pub(crate) fn into_parts(self) -> (Vec<SideEffectRecord<S, A>>, Vec<ScopeInfo>) {
        (self.records, self.scopes)
    }

    fn register<B>(mut self, kind: HandlerKind, body: B) -> Self
    where
        B: ScopeBody<S, A> + 'static,
    {
        let name = format!("{} -> {}[{}]", self.name, kind.label(), self.records.len());
        self.records.push(SideEffectRecord {
            name,
            kind,
            guard: self.guard.clone(),
            identity: self.identity.clone(),
            body: Arc::new(body),
        });
        self
    }

    fn nested_builder(&mut self, label: &str) -> InStateBuilder<S, A> {
        let name = format!("{} -> {}[{}]", self.name, label, self.nested);
        self.nested += 1;
        let mut nested = InStateBuilder::new(name, self.guard.clone());
        nested.identity = self.identity.clone();
        nested
    }

    fn absorb(mut self, nested: InStateBuilder<S, A>) -> Self {
        self.scopes.push(ScopeInfo {
            name: nested.name,
            handlers: nested.records.len(),
        });
        self.scopes.extend(nested.scopes);
        self.records.extend(nested.records);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[derive(Clone, Debug, PartialEq)]
    enum Phase {
        Idle,
        Busy(u32),
    }

    #[derive(Clone, Debug)]
    enum Command {
        Start(u32),
        Stop,
    }

    fn builder() -> InStateBuilder<Phase, Command> {
        InStateBuilder::new("in_state[0]".to_string(), Guard::always())
    }

    fn started(command: &Command) -> Option<u32> {
        match command {
            Command::Start(id) => Some(*id),
            Command::Stop => None,
        }
    }

    #[test]
    fn extractors_pick_their_variant() {
        assert_eq!(started(&Command::Start(4)), Some(4));
        assert_eq!(started(&Command::Stop), None);
    }

    #[test]
    fn handlers_are_named_after_their_scope() {
        let (records, scopes) = builder()
            .on_enter_effect(|_| async { Ok::<_, BoxError>(()) })
            .on(
                |command: &Command| matches!(command, Command::Stop).then_some(()),
                ExecutionPolicy::Ordered,
                |_, _| async { Ok::<_, BoxError>(ChangedState::Override(Phase::Idle)) },
            )
            .into_parts();

        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["in_state[0] -> on_enter[0]", "in_state[0] -> on_action[1]"]
        );
        assert!(scopes.is_empty());
    }

    #[test]
    fn conditions_narrow_the_guard() {
        let (records, scopes) = builder()
            .condition(
                |phase| matches!(phase, Phase::Busy(_)),
                |scope| {
                    scope.collect_while_in_state_effect(
                        |_| stream::iter(vec![1, 2]),
                        ExecutionPolicy::Unordered,
                        |_, _| async { Ok::<_, BoxError>(()) },
                    )
                },
            )
            .condition(|_| true, |scope| scope)
            .into_parts();

        assert_eq!(records.len(), 1);
        assert!(records[0].guard.check(&Phase::Busy(1)));
        assert!(!records[0].guard.check(&Phase::Idle));
        assert_eq!(
            records[0].kind,
            HandlerKind::CollectWhileInState(ExecutionPolicy::Unordered)
        );

        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[0].name, "in_state[0] -> condition[0]");
        assert_eq!(scopes[0].handlers, 1);
        assert_eq!(scopes[1].name, "in_state[0] -> condition[1]");
        assert_eq!(scopes[1].handlers, 0);
    }

    #[test]
    fn identity_scopes_compose() {
        let (records, _) = builder()
            .until_identity_changes(
                |phase| matches!(phase, Phase::Busy(_)),
                |scope| {
                    scope.until_identity_changes(
                        |phase| match phase {
                            Phase::Busy(id) => *id,
                            Phase::Idle => 0,
                        },
                        |scope| scope.on_enter_effect(|_| async { Ok::<_, BoxError>(()) }),
                    )
                },
            )
            .into_parts();

        let same = records[0].identity.as_ref().unwrap();
        assert!(same(&Phase::Busy(1), &Phase::Busy(1)));
        assert!(!same(&Phase::Busy(1), &Phase::Busy(2)));
        assert!(!same(&Phase::Busy(0), &Phase::Idle));
        assert_eq!(
            records[0].name,
            "in_state[0] -> until_identity_changes[0] -> until_identity_changes[0] -> on_enter[0]"
        );
    }

    #[test]
    fn throttled_policy_is_reported() {
        let (records, _) = builder()
            .on_action_effect(
                started,
                ExecutionPolicy::Throttled(std::time::Duration::from_millis(10)),
                |_, _| async { Ok::<_, BoxError>(()) },
            )
            .into_parts();

        assert_eq!(
            records[0].kind.policy(),
            Some(ExecutionPolicy::Throttled(std::time::Duration::from_millis(10)))
        );
    }
}
