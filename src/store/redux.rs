//! The store loop.

use super::{GetState, SideEffect, StateCell, StateStream};
use crate::core::{Action, ChangedState, State};
use crate::error::{BoxError, FlowError};
use crate::flow::SharedLog;
use crate::logger::{LogLevel, TaggedLogger, TracingLogger};
use futures::stream::{self, BoxStream, SelectAll, Stream, StreamExt};
use std::sync::Arc;

enum Input<A> {
    Upstream(A),
    UpstreamDone,
    Effect(Result<A, FlowError>),
}

struct Running<S, A, R> {
    cell: Arc<StateCell<S>>,
    inputs: SelectAll<BoxStream<'static, Input<A>>>,
    broadcast: SharedLog<A>,
    reducer: R,
    logger: TaggedLogger,
}

enum Phase<S, A, R> {
    Pending(Box<dyn FnOnce() -> Running<S, A, R> + Send>),
    Running(Running<S, A, R>),
    Done,
}

/// Reduce `actions` and the actions of `side_effects` into a stream of
/// states.
///
/// Nothing happens until the returned stream is polled. On first poll the
/// initial state is computed and emitted, and every side effect is invoked
/// once with a stream of every action reduced from then on and a reader of
/// the current state.
///
/// For each action, in the order it is received:
/// 1. the reducer computes a [`ChangedState`] from the current state,
/// 2. unless it is `NoChange`, the new state becomes current and is emitted,
/// 3. the action is broadcast to every side effect.
///
/// The stream ends once `actions` and every side-effect stream have ended.
/// A reducer error or a side-effect error is emitted as the last item.
/// Dropping the stream cancels every side effect.
///
/// # Example
///
/// ```rust
/// use flowstate::core::ChangedState;
/// use flowstate::store::redux_store;
/// use futures::{stream, StreamExt};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let states: Vec<String> = redux_store(
///     stream::iter(vec![1u32, 2]),
///     String::new,
///     Vec::new(),
///     |state: &String, action: &u32| Ok(ChangedState::Override(format!("{state}{action}"))),
/// )
/// .map(|state| state.unwrap())
/// .collect()
/// .await;
///
/// assert_eq!(states, vec!["", "1", "12"]);
/// # }
/// ```
pub fn redux_store<S, A, I, F, R>(
    actions: I,
    initial_state: F,
    side_effects: Vec<SideEffect<S, A>>,
    reducer: R,
) -> StateStream<S>
where
    S: State,
    A: Action,
    I: Stream<Item = A> + Send + 'static,
    F: FnOnce() -> S + Send + 'static,
    R: FnMut(&S, &A) -> Result<ChangedState<S>, BoxError> + Send + 'static,
{
    let logger = TaggedLogger::new(Arc::new(TracingLogger), "redux_store", LogLevel::Debug);
    redux_store_with_logger(actions, initial_state, side_effects, reducer, logger)
}

pub(crate) fn redux_store_with_logger<S, A, I, F, R>(
    actions: I,
    initial_state: F,
    side_effects: Vec<SideEffect<S, A>>,
    reducer: R,
    logger: TaggedLogger,
) -> StateStream<S>
where
    S: State,
    A: Action,
    I: Stream<Item = A> + Send + 'static,
    F: FnOnce() -> S + Send + 'static,
    R: FnMut(&S, &A) -> Result<ChangedState<S>, BoxError> + Send + 'static,
{
    let start = move || {
        let initial = initial_state();
        logger.debug(|| format!("Started with {initial:?}"));
        let cell = StateCell::new(initial);
        let get_state: GetState<S> = cell.reader();
        let broadcast = SharedLog::new();

        let mut inputs: SelectAll<BoxStream<'static, Input<A>>> = SelectAll::new();
        inputs.push(
            actions
                .map(Input::Upstream)
                .chain(stream::once(async { Input::UpstreamDone }))
                .boxed(),
        );
        // Subscribe every reader before anything is broadcast.
        for side_effect in side_effects {
            let observed = broadcast.subscribe().into_stream();
            let output = side_effect(observed, Arc::clone(&get_state));
            inputs.push(output.map(Input::Effect).boxed());
        }

        Running {
            cell,
            inputs,
            broadcast,
            reducer,
            logger,
        }
    };

    stream::unfold(Phase::Pending(Box::new(start)), |phase| async move {
        match phase {
            Phase::Pending(start) => {
                let running = start();
                let initial = running.cell.get();
                Some((Ok(initial), Phase::Running(running)))
            }
            Phase::Running(mut running) => match running.next_state().await {
                Some(Ok(state)) => Some((Ok(state), Phase::Running(running))),
                Some(Err(error)) => Some((Err(error), Phase::Done)),
                None => None,
            },
            Phase::Done => None,
        }
    })
    .boxed()
}

impl<S, A, R> Running<S, A, R>
where
    S: State,
    A: Action,
    R: FnMut(&S, &A) -> Result<ChangedState<S>, BoxError> + Send + 'static,
{
    /// Process inputs until one produces a state to emit.
    async fn next_state(&mut self) -> Option<Result<S, FlowError>> {
        while let Some(input) = self.inputs.next().await {
            let action = match input {
                Input::Upstream(action) | Input::Effect(Ok(action)) => action,
                Input::UpstreamDone => {
                    self.logger.debug(|| "Upstream completed".to_string());
                    self.broadcast.close();
                    continue;
                }
                Input::Effect(Err(error)) => {
                    self.logger
                        .error(|| "Side effect failed".to_string(), &error);
                    self.broadcast.close();
                    return Some(Err(error));
                }
            };

            self.logger.verbose(|| format!("Received {action:?}"));
            let current = self.cell.get();
            let change = match (self.reducer)(&current, &action) {
                Ok(change) => change,
                Err(error) => {
                    let error = FlowError::reducer(error);
                    self.logger
                        .error(|| format!("Reducer failed on {action:?}"), &error);
                    self.broadcast.close();
                    return Some(Err(error));
                }
            };

            let emitted = change.apply(&current);
            if let Some(next) = &emitted {
                self.logger.debug(|| format!("New state {next:?}"));
                self.cell.set(next.clone());
            }
            self.broadcast.push(action);

            if let Some(next) = emitted {
                return Some(Ok(next));
            }
        }
        None
    }
}
