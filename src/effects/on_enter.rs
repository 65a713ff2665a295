//! Handler run once per stay.

use super::{HandlerFuture, ScopeBody, ScopeOutput, Scoped};
use crate::core::{Action, Event, State};
use crate::flow::ScopeInput;
use crate::logger::TaggedLogger;
use futures::future::ready;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

pub(crate) struct OnEnter<S> {
    handler: Arc<dyn Fn(S) -> HandlerFuture<S> + Send + Sync>,
}

impl<S> OnEnter<S> {
    pub(crate) fn new(handler: Arc<dyn Fn(S) -> HandlerFuture<S> + Send + Sync>) -> Self {
        Self { handler }
    }
}

impl<S: State, A: Action> ScopeBody<S, A> for OnEnter<S> {
    fn run(&self, input: ScopeInput<S, Event<S, A>>, logger: TaggedLogger) -> ScopeOutput<S, A> {
        let scoped = Scoped::new(&input, &logger);
        let handler = Arc::clone(&self.handler);

        stream::once(async move {
            let state = scoped.current()?;
            logger.debug(|| format!("Running on_enter for {state:?}"));
            scoped.run(handler(state)).await
        })
        .filter_map(ready)
        .boxed()
    }
}
