//! State-scoped dispatch.
//!
//! [`while_in_state`] runs a transformation only while the machine's state
//! satisfies a predicate. Each continuous stay in the scope gets a fresh run
//! of the transformation with its own cancellation token; leaving the scope
//! cancels that run.

use super::producer::channel_stream;
use crate::core::{Guard, State};
use crate::error::FlowError;
use crate::logger::TaggedLogger;
use crate::store::GetState;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

/// Builds the guard a scope entered with a given state must keep satisfying.
pub(crate) type StayGuard<S> = Arc<dyn Fn(&S) -> Guard<S> + Send + Sync>;

/// One continuous stay inside a scope, as seen by the transformation.
pub(crate) struct ScopeInput<S, T> {
    /// Upstream items received while the scope is active, starting with the
    /// item that opened it.
    pub(crate) events: BoxStream<'static, T>,
    /// State at the moment the scope opened.
    pub(crate) entry_state: S,
    /// Guard the state must keep satisfying for the scope to stay open.
    pub(crate) guard: Guard<S>,
    /// Cancelled when the scope is left.
    pub(crate) token: CancellationToken,
    pub(crate) get_state: GetState<S>,
}

struct ActiveScope<S, T> {
    events: mpsc::UnboundedSender<T>,
    guard: Guard<S>,
    token: CancellationToken,
}

/// Route `upstream` into per-stay runs of `transform`.
///
/// For every upstream item, in order, the current state is read and:
/// 1. an active scope whose guard no longer holds is closed (its run is
///    cancelled without emitting anything),
/// 2. a new scope opens if none is active and `entry` holds,
/// 3. the item is forwarded to the active scope, if any.
///
/// Errors emitted by a run are passed through unchanged.
pub(crate) fn while_in_state<S, T, O, F>(
    upstream: BoxStream<'static, T>,
    get_state: GetState<S>,
    entry: Guard<S>,
    stay: StayGuard<S>,
    logger: TaggedLogger,
    transform: F,
) -> BoxStream<'static, Result<O, FlowError>>
where
    S: State,
    T: Send + 'static,
    O: Send + 'static,
    F: Fn(ScopeInput<S, T>) -> BoxStream<'static, Result<O, FlowError>> + Send + Sync + 'static,
{
    channel_stream(move |producer| async move {
        let mut upstream = upstream;
        let mut active: Option<ActiveScope<S, T>> = None;

        while let Some(item) = upstream.next().await {
            let state = get_state();

            if let Some(scope) = active.take() {
                if scope.guard.check(&state) {
                    active = Some(scope);
                } else {
                    logger.debug(|| format!("Left scope in {state:?}, cancelling its handlers"));
                    scope.token.cancel();
                }
            }

            if active.is_none() && entry.check(&state) {
                logger.debug(|| format!("Entered scope in {state:?}"));
                let (events, receiver) = mpsc::unbounded_channel();
                let guard = stay(&state);
                let token = producer.child_token();

                let mut output = transform(ScopeInput {
                    events: UnboundedReceiverStream::new(receiver).boxed(),
                    entry_state: state,
                    guard: guard.clone(),
                    token: token.clone(),
                    get_state: Arc::clone(&get_state),
                });
                let sink = producer.clone();
                producer.launch(token.clone(), async move {
                    while let Some(result) = output.next().await {
                        if !sink.send(result) {
                            break;
                        }
                    }
                });

                active = Some(ActiveScope {
                    events,
                    guard,
                    token,
                });
            }

            if let Some(scope) = &active {
                // A run that stopped listening simply misses the item.
                let _ = scope.events.send(item);
            }
        }
    })
}

/// Stay guard that keeps the entry guard for the whole stay.
pub(crate) fn stay_while<S: State>(guard: Guard<S>) -> StayGuard<S> {
    Arc::new(move |_| guard.clone())
}
