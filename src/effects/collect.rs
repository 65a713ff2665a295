//! Handler fed by a stream built on scope entry.

use super::{HandlerFuture, ScopeBody, ScopeOutput, Scoped};
use crate::core::{Action, Event, ExecutionPolicy, State};
use crate::error::FlowError;
use crate::flow::{map_with_policy, Invocation, ScopeInput};
use crate::logger::TaggedLogger;
use futures::future::{ready, FutureExt};
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;

/// Builds the stream collected during one stay from the state at entry.
pub(crate) type StreamSource<S, T> = Arc<dyn Fn(&S) -> BoxStream<'static, T> + Send + Sync>;

pub(crate) struct CollectWhileInState<S, T> {
    source: StreamSource<S, T>,
    policy: ExecutionPolicy,
    handler: Arc<dyn Fn(T, S) -> HandlerFuture<S> + Send + Sync>,
}

impl<S, T> CollectWhileInState<S, T> {
    pub(crate) fn new(
        source: StreamSource<S, T>,
        policy: ExecutionPolicy,
        handler: Arc<dyn Fn(T, S) -> HandlerFuture<S> + Send + Sync>,
    ) -> Self {
        Self {
            source,
            policy,
            handler,
        }
    }
}

impl<S, A, T> ScopeBody<S, A> for CollectWhileInState<S, T>
where
    S: State,
    A: Action,
    T: Send + 'static,
{
    fn run(&self, input: ScopeInput<S, Event<S, A>>, logger: TaggedLogger) -> ScopeOutput<S, A> {
        let scoped = Scoped::new(&input, &logger);
        logger.debug(|| format!("Collecting while in {:?}", input.entry_state));
        let items = (self.source)(&input.entry_state);

        let handler = Arc::clone(&self.handler);
        let invoke: Invocation<T, Option<Result<Event<S, A>, FlowError>>> = Arc::new(move |item| {
            let scoped = Arc::clone(&scoped);
            let handler = Arc::clone(&handler);
            async move {
                let state = scoped.current()?;
                scoped.run(handler(item, state)).await
            }
            .boxed()
        });

        map_with_policy(items, self.policy, invoke)
            .filter_map(ready)
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChangedState, Guard};
    use crate::effects::testing;
    use crate::error::BoxError;
    use futures::stream;
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    struct Feed {
        topic: &'static str,
        messages: Vec<String>,
    }

    fn body() -> CollectWhileInState<Feed, u32> {
        CollectWhileInState::new(
            Arc::new(|feed: &Feed| {
                let topic = feed.topic;
                stream::iter(1..=3u32)
                    .then(move |n| async move {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        assert_eq!(topic, "rust");
                        n
                    })
                    .boxed()
            }),
            ExecutionPolicy::Ordered,
            Arc::new(|n: u32, _feed: Feed| {
                async move {
                    Ok::<_, BoxError>(ChangedState::mutate(move |mut feed: Feed| {
                        feed.messages.push(format!("#{n}"));
                        feed
                    }))
                }
                .boxed()
            }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn feeds_every_item_to_the_handler() {
        let feed = Feed {
            topic: "rust",
            messages: Vec::new(),
        };
        let (_harness, output) =
            testing::start::<Feed, ()>(&body(), feed.clone(), Guard::always());

        let events: Vec<_> = output.collect().await;
        let result = events
            .iter()
            .map(|event| event.as_ref().unwrap())
            .fold(feed, |state, event| testing::apply(&state, event));

        assert_eq!(result.messages, vec!["#1", "#2", "#3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_handling_once_scope_is_left() {
        let feed = Feed {
            topic: "rust",
            messages: Vec::new(),
        };
        let guard = Guard::new(|f: &Feed| f.messages.len() < 10);
        let (harness, mut output) = testing::start::<Feed, ()>(&body(), feed, guard);

        assert!(output.next().await.is_some());
        harness.state.write().messages = vec![String::new(); 10];

        let rest: Vec<_> = output.collect().await;
        assert!(rest.is_empty());
    }
}
