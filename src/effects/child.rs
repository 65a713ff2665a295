//! Nested state machines started from a scope.

use super::registry::{ChildEntry, ChildRegistry};
use super::{ScopeBody, ScopeOutput, Scoped};
use crate::core::{Action, ChangedState, Event, State};
use crate::error::FlowError;
use crate::flow::{channel_stream, Producer, ScopeInput};
use crate::logger::TaggedLogger;
use crate::machine::StateMachine;
use crate::sync::Waiter;
use futures::stream::StreamExt;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Maps an outer action to the action forwarded to a child.
pub(crate) type ActionMapper<A, SubA> = Arc<dyn Fn(&A) -> Option<SubA> + Send + Sync>;

/// Folds a child's state into the outer state.
pub(crate) type StateMapper<S, SubS> = Arc<dyn Fn(&S, SubS) -> ChangedState<S> + Send + Sync>;

type Output<S, A> = Result<Event<S, A>, FlowError>;

/// Start a collector and a forwarder for `machine`.
///
/// The collector folds every child state into the outer state while the
/// scope still accepts it, and reports a child fault as a fault of the outer
/// machine. The forwarder delivers queued actions in order, but only after
/// the collector is subscribed. `on_finish` runs when the child's state
/// stream ends on its own.
///
/// The child machine is cancelled once the collector stops, even while other
/// handles on it are alive.
fn supervise<S, A, SubS, SubA>(
    producer: &Producer<Output<S, A>>,
    scoped: &Arc<Scoped<S>>,
    machine: StateMachine<SubS, SubA>,
    map_state: StateMapper<S, SubS>,
    logger: &TaggedLogger,
    on_finish: impl FnOnce() + Send + 'static,
) -> ChildEntry<SubA>
where
    S: State,
    A: Action,
    SubS: State,
    SubA: Action,
{
    let token = producer.child_token();
    let subscribed = Waiter::new();
    let (actions, mut queued) = mpsc::unbounded_channel::<SubA>();
    // Subscribe before anything can be forwarded.
    let mut states = machine.state();

    let sink = producer.clone();
    let collector_scope = Arc::clone(scoped);
    let gate = subscribed.clone();
    let collector_logger = logger.clone();
    let id = machine.id();
    let entry_stop = machine.cancellation_token();
    let stop_child = entry_stop.clone().drop_guard();
    producer.launch(token.clone(), async move {
        let _stop_child = stop_child;
        gate.resume();
        while let Some(item) = states.next().await {
            match item {
                Ok(child_state) => {
                    let Some(parent) = collector_scope.current() else {
                        continue;
                    };
                    let change = map_state(&parent, child_state);
                    if change.is_no_change() {
                        continue;
                    }
                    if !sink.send(Ok(collector_scope.change(change))) {
                        return;
                    }
                }
                Err(error) => {
                    collector_logger.error(|| format!("Child {id} failed"), &error);
                    let _ = sink.send(Err(FlowError::child(collector_scope.name(), error)));
                    return;
                }
            }
        }
        collector_logger.debug(|| format!("Child {id} completed"));
        on_finish();
    });

    let forwarder_logger = logger.clone();
    producer.launch(token.clone(), async move {
        subscribed.wait().await;
        while let Some(action) = queued.recv().await {
            forwarder_logger.verbose(|| format!("Forwarding {action:?} to child {id}"));
            if machine.dispatch(action).is_err() {
                return;
            }
        }
    });

    ChildEntry::new(id, token, entry_stop, actions)
}

/// One child per trigger value; a repeated trigger value replaces its child.
pub(crate) struct StartOnAction<S, A, K, SubS, SubA> {
    trigger: Arc<dyn Fn(&A) -> Option<K> + Send + Sync>,
    factory: Arc<dyn Fn(K, &S) -> StateMachine<SubS, SubA> + Send + Sync>,
    map_action: ActionMapper<A, SubA>,
    map_state: StateMapper<S, SubS>,
}

impl<S, A, K, SubS, SubA> StartOnAction<S, A, K, SubS, SubA> {
    pub(crate) fn new(
        trigger: Arc<dyn Fn(&A) -> Option<K> + Send + Sync>,
        factory: Arc<dyn Fn(K, &S) -> StateMachine<SubS, SubA> + Send + Sync>,
        map_action: ActionMapper<A, SubA>,
        map_state: StateMapper<S, SubS>,
    ) -> Self {
        Self {
            trigger,
            factory,
            map_action,
            map_state,
        }
    }
}

impl<S, A, K, SubS, SubA> ScopeBody<S, A> for StartOnAction<S, A, K, SubS, SubA>
where
    S: State,
    A: Action,
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    SubS: State,
    SubA: Action,
{
    fn run(&self, input: ScopeInput<S, Event<S, A>>, logger: TaggedLogger) -> ScopeOutput<S, A> {
        let scoped = Scoped::new(&input, &logger);
        let trigger = Arc::clone(&self.trigger);
        let factory = Arc::clone(&self.factory);
        let map_action = Arc::clone(&self.map_action);
        let map_state = Arc::clone(&self.map_state);
        let mut events = input.events;

        channel_stream(move |producer| async move {
            let registry: ChildRegistry<K, SubA> = ChildRegistry::new();

            while let Some(event) = events.next().await {
                let Event::Dispatched(action) = event else {
                    continue;
                };

                if let Some(key) = trigger(&action) {
                    let Some(parent) = scoped.current() else {
                        continue;
                    };
                    let machine = factory(key.clone(), &parent);
                    let id = machine.id();
                    let finished = {
                        let registry = registry.clone();
                        let key = key.clone();
                        move || {
                            registry.remove(&key, id);
                        }
                    };
                    let entry = supervise(
                        &producer,
                        &scoped,
                        machine,
                        Arc::clone(&map_state),
                        &logger,
                        finished,
                    );
                    let replaced = registry.cancel_previous_and_add_new(key.clone(), entry);
                    if let Some(previous) = replaced {
                        logger.debug(|| format!("Cancelled child {previous}"));
                    }
                    logger.debug(|| {
                        format!("Started child {id} for {key:?}, {} running", registry.len())
                    });
                } else if let Some(sub_action) = map_action(&action) {
                    let delivered = registry.forward(&sub_action);
                    logger.verbose(|| format!("Queued {sub_action:?} for {delivered} children"));
                }
            }

            // Upstream completed: nothing can reach the children any more.
            if !registry.is_empty() {
                logger.debug(|| format!("Stopping {} children", registry.len()));
                registry.clear();
            }
        })
    }
}

/// One child per stay in the scope.
pub(crate) struct StartOnEnter<S, A, SubS, SubA> {
    factory: Arc<dyn Fn(&S) -> StateMachine<SubS, SubA> + Send + Sync>,
    map_action: ActionMapper<A, SubA>,
    map_state: StateMapper<S, SubS>,
}

impl<S, A, SubS, SubA> StartOnEnter<S, A, SubS, SubA> {
    pub(crate) fn new(
        factory: Arc<dyn Fn(&S) -> StateMachine<SubS, SubA> + Send + Sync>,
        map_action: ActionMapper<A, SubA>,
        map_state: StateMapper<S, SubS>,
    ) -> Self {
        Self {
            factory,
            map_action,
            map_state,
        }
    }
}

impl<S, A, SubS, SubA> ScopeBody<S, A> for StartOnEnter<S, A, SubS, SubA>
where
    S: State,
    A: Action,
    SubS: State,
    SubA: Action,
{
    fn run(&self, input: ScopeInput<S, Event<S, A>>, logger: TaggedLogger) -> ScopeOutput<S, A> {
        let scoped = Scoped::new(&input, &logger);
        let factory = Arc::clone(&self.factory);
        let map_action = Arc::clone(&self.map_action);
        let map_state = Arc::clone(&self.map_state);
        let mut events = input.events;

        channel_stream(move |producer| async move {
            let Some(parent) = scoped.current() else {
                return;
            };
            let machine = factory(&parent);
            logger.debug(|| format!("Started child {}", machine.id()));
            let child = supervise(&producer, &scoped, machine, map_state, &logger, || {});

            while let Some(event) = events.next().await {
                if let Event::Dispatched(action) = event {
                    if let Some(sub_action) = map_action(&action) {
                        child.send(sub_action);
                    }
                }
            }
        })
    }
}
