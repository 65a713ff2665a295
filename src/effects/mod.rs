//! Side effects of declarative state machines.
//!
//! Every handler registered on an [`InStateBuilder`](crate::builder::InStateBuilder)
//! becomes one scope body. The store runs each body inside
//! [`while_in_state`](crate::flow), so a body only lives while the machine's
//! state stays inside its scope.
//!
//! # Key Concepts
//!
//! - **Scoped invocations**: every handler run re-checks the scope's guard
//!   against the current state first and tags its result with the scope, so
//!   a late result cannot change the state of another scope
//! - **Faults**: handler errors and panics end the machine with a
//!   [`FlowError`]
//! - **Child machines**: nested machines started per trigger or per stay,
//!   tracked in a registry keyed by trigger value

mod child;
mod collect;
mod on_action;
mod on_enter;
mod registry;

pub(crate) use child::{StartOnAction, StartOnEnter};
pub(crate) use collect::CollectWhileInState;
pub(crate) use on_action::OnAction;
pub(crate) use on_enter::OnEnter;

use crate::core::{ChangedState, Event, Guard, State, StateChange};
use crate::error::{BoxError, FlowError};
use crate::flow::ScopeInput;
use crate::logger::TaggedLogger;
use crate::store::GetState;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::BoxStream;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What every handler returns.
pub type HandlerResult<S> = Result<ChangedState<S>, BoxError>;

/// Boxed handler future.
pub(crate) type HandlerFuture<S> = BoxFuture<'static, HandlerResult<S>>;

/// Output of one run of a scope body.
pub(crate) type ScopeOutput<S, A> = BoxStream<'static, Result<Event<S, A>, FlowError>>;

/// Behaviour of one registered handler during one stay in its scope.
pub(crate) trait ScopeBody<S, A>: Send + Sync {
    fn run(&self, input: ScopeInput<S, Event<S, A>>, logger: TaggedLogger) -> ScopeOutput<S, A>;
}

/// Invocation context shared by all handler runs of one stay.
pub(crate) struct Scoped<S> {
    guard: Guard<S>,
    token: CancellationToken,
    get_state: GetState<S>,
    name: Arc<str>,
}

impl<S: State> Scoped<S> {
    pub(crate) fn new<T>(input: &ScopeInput<S, T>, logger: &TaggedLogger) -> Arc<Self> {
        Arc::new(Self {
            guard: input.guard.clone(),
            token: input.token.clone(),
            get_state: Arc::clone(&input.get_state),
            name: Arc::from(logger.tag()),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Current state, if the scope still accepts it.
    pub(crate) fn current(&self) -> Option<S> {
        let state = (self.get_state)();
        self.guard.check(&state).then_some(state)
    }

    /// Tag `change` with this scope.
    pub(crate) fn change<A>(&self, change: ChangedState<S>) -> Event<S, A> {
        Event::ChangeState(StateChange::new(
            change,
            self.guard.clone(),
            self.token.clone(),
            &*self.name,
        ))
    }

    /// Await a handler, converting errors and panics into faults.
    ///
    /// Returns `None` for `NoChange`.
    pub(crate) async fn run<A, F>(&self, work: F) -> Option<Result<Event<S, A>, FlowError>>
    where
        F: Future<Output = HandlerResult<S>> + Send,
    {
        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(change)) if change.is_no_change() => None,
            Ok(Ok(change)) => Some(Ok(self.change(change))),
            Ok(Err(error)) => Some(Err(FlowError::side_effect(&*self.name, error))),
            Err(panic) => Some(Err(FlowError::panicked(&*self.name, panic))),
        }
    }
}

/// Box a handler returning a future into a stored handler.
pub(crate) fn boxed_handler<S, T, F, Fut>(
    handler: F,
) -> Arc<dyn Fn(T, S) -> HandlerFuture<S> + Send + Sync>
where
    S: State,
    T: Send + 'static,
    F: Fn(T, S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<S>> + Send + 'static,
{
    Arc::new(move |value, state| handler(value, state).boxed())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for driving scope bodies without a full machine.

    use super::*;
    use crate::logger::{LogLevel, TracingLogger};
    use parking_lot::RwLock;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    pub(crate) struct Harness<S, A> {
        pub(crate) state: Arc<RwLock<S>>,
        pub(crate) events: mpsc::UnboundedSender<Event<S, A>>,
        pub(crate) token: CancellationToken,
    }

    impl<S, A> Harness<S, A> {
        pub(crate) fn dispatch(&self, action: A) {
            self.events.send(Event::Dispatched(action)).unwrap();
        }
    }

    /// Run `body` for a scope that accepts states matching `guard`, with the
    /// current state starting at `initial`.
    pub(crate) fn start<S: State, A: Send + 'static>(
        body: &dyn ScopeBody<S, A>,
        initial: S,
        guard: Guard<S>,
    ) -> (Harness<S, A>, ScopeOutput<S, A>) {
        let state = Arc::new(RwLock::new(initial.clone()));
        let reader = state.clone();
        let (events, receiver) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let input = ScopeInput {
            events: futures::StreamExt::boxed(UnboundedReceiverStream::new(receiver)),
            entry_state: initial,
            guard,
            token: token.clone(),
            get_state: Arc::new(move || reader.read().clone()),
        };
        let logger = TaggedLogger::new(Arc::new(TracingLogger), "scope", LogLevel::Verbose);
        let output = body.run(input, logger);
        (
            Harness {
                state,
                events,
                token,
            },
            output,
        )
    }

    /// Apply an emitted event to `state` the way the store would.
    pub(crate) fn apply<S: State, A>(state: &S, event: &Event<S, A>) -> S {
        crate::core::reduce_event(state, event)
            .map(|change| change.reduce(state))
            .unwrap_or_else(|_| state.clone())
    }
}
