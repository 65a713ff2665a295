//! Handler triggered by dispatched actions.

use super::{HandlerFuture, ScopeBody, ScopeOutput, Scoped};
use crate::core::{Action, Event, ExecutionPolicy, State};
use crate::error::FlowError;
use crate::flow::{map_with_policy, Invocation, ScopeInput};
use crate::logger::TaggedLogger;
use futures::future::{ready, FutureExt};
use futures::stream::StreamExt;
use std::sync::Arc;

pub(crate) struct OnAction<S, A, T> {
    extract: Arc<dyn Fn(&A) -> Option<T> + Send + Sync>,
    policy: ExecutionPolicy,
    handler: Arc<dyn Fn(T, S) -> HandlerFuture<S> + Send + Sync>,
}

impl<S, A, T> OnAction<S, A, T> {
    pub(crate) fn new(
        extract: Arc<dyn Fn(&A) -> Option<T> + Send + Sync>,
        policy: ExecutionPolicy,
        handler: Arc<dyn Fn(T, S) -> HandlerFuture<S> + Send + Sync>,
    ) -> Self {
        Self {
            extract,
            policy,
            handler,
        }
    }
}

impl<S, A, T> ScopeBody<S, A> for OnAction<S, A, T>
where
    S: State,
    A: Action,
    T: Send + 'static,
{
    fn run(&self, input: ScopeInput<S, Event<S, A>>, logger: TaggedLogger) -> ScopeOutput<S, A> {
        let scoped = Scoped::new(&input, &logger);
        let extract = Arc::clone(&self.extract);
        let triggers = input
            .events
            .filter_map(move |event| {
                ready(match event {
                    Event::Dispatched(action) => extract(&action),
                    Event::Initialized | Event::ChangeState(_) => None,
                })
            })
            .boxed();

        let handler = Arc::clone(&self.handler);
        let invoke: Invocation<T, Option<Result<Event<S, A>, FlowError>>> =
            Arc::new(move |trigger| {
                let scoped = Arc::clone(&scoped);
                let handler = Arc::clone(&handler);
                let logger = logger.clone();
                async move {
                    let state = scoped.current()?;
                    logger.verbose(|| format!("Handling action in {state:?}"));
                    scoped.run(handler(trigger, state)).await
                }
                .boxed()
            });

        map_with_policy(triggers, self.policy, invoke)
            .filter_map(ready)
            .boxed()
    }
}
