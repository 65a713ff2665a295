//! Running machine handle.

use super::holder::StateHolder;
use crate::core::{Action, State};
use crate::error::FlowError;
use crate::flow::{LogReader, SharedLog};
use crate::logger::TaggedLogger;
use crate::store::StateStream;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

/// Handle on a launched state machine.
///
/// Clones control the same machine. The machine keeps running while a
/// handle or a stream returned by [`StateMachine::state`] is alive; once all
/// of them are dropped it is cancelled along with every side effect and
/// child machine.
pub struct StateMachine<S, A> {
    id: Uuid,
    actions: mpsc::UnboundedSender<A>,
    states: SharedLog<Result<S, FlowError>>,
    token: CancellationToken,
    alive: Arc<DropGuard>,
}

impl<S: State, A: Action> StateMachine<S, A> {
    /// Drive `store` on a new task.
    pub(crate) fn spawn(
        store: StateStream<S>,
        actions: mpsc::UnboundedSender<A>,
        holder: Arc<dyn StateHolder<S>>,
        logger: TaggedLogger,
    ) -> Self {
        let id = Uuid::new_v4();
        let states = SharedLog::with_retained(1);
        let token = CancellationToken::new();
        logger.info(|| format!("Launched machine {id}"));

        let log = states.clone();
        let cancelled = token.clone();
        tokio::spawn(async move {
            let drive = async {
                let mut store = store;
                while let Some(item) = store.next().await {
                    let fault = match &item {
                        Ok(state) => {
                            holder.save_state(state);
                            false
                        }
                        Err(error) => {
                            logger.error(|| "Terminated with a fault".to_string(), error);
                            true
                        }
                    };
                    log.push(item);
                    if fault {
                        break;
                    }
                }
            };

            tokio::select! {
                biased;
                _ = cancelled.cancelled() => logger.debug(|| "Cancelled".to_string()),
                _ = drive => logger.debug(|| "Completed".to_string()),
            }
            log.close();
        });

        Self {
            id,
            actions,
            states,
            alive: Arc::new(token.clone().drop_guard()),
            token,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Enqueue an action. Never blocks; actions are processed in dispatch
    /// order.
    pub fn dispatch(&self, action: A) -> Result<(), FlowError> {
        if self.token.is_cancelled() {
            return Err(FlowError::Closed);
        }
        self.actions.send(action).map_err(|_| FlowError::Closed)
    }

    /// The latest state followed by every later one.
    ///
    /// Ends when the machine stops; a fault is delivered as the last item.
    pub fn state(&self) -> StateStream<S> {
        let reader = self.states.subscribe_latest();
        let alive = Arc::clone(&self.alive);
        stream::unfold(
            (reader, alive),
            |(mut reader, alive): (LogReader<_>, _)| async move {
                let item = reader.next().await?;
                Some((item, (reader, alive)))
            },
        )
        .boxed()
    }

    /// Latest emitted state, if the machine has emitted one.
    pub fn current_state(&self) -> Option<S> {
        self.states.latest().and_then(Result::ok)
    }

    pub fn is_running(&self) -> bool {
        !self.states.is_closed() && !self.token.is_cancelled()
    }

    /// Stop the machine now, even while handles are still alive.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token that stops this machine when cancelled.
    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl<S, A> Clone for StateMachine<S, A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            actions: self.actions.clone(),
            states: self.states.clone(),
            token: self.token.clone(),
            alive: Arc::clone(&self.alive),
        }
    }
}

impl<S, A> fmt::Debug for StateMachine<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("id", &self.id)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
