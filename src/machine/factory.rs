//! Launching declarative machines.

use super::config::MachineConfig;
use super::handle::StateMachine;
use super::holder::{InMemoryStateHolder, InitialState, LossyStateHolder, StateHolder};
use crate::builder::StateMachineSpec;
use crate::core::{reduce_event, Action, Event, State};
use crate::error::FlowError;
use crate::logger::{Logger, TaggedLogger, TracingLogger};
use crate::store::redux_store_with_logger;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use stillwater::validation::Validation;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Validated spec plus everything needed to launch machines from it.
///
/// # Example
///
/// ```rust
/// use flowstate::builder::StateMachineSpec;
/// use flowstate::core::{ChangedState, ExecutionPolicy};
/// use flowstate::error::BoxError;
/// use flowstate::machine::StateMachineFactory;
/// use futures::StreamExt;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Action {
///     Increment,
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let spec = StateMachineSpec::<u32, Action>::new().in_any_state(|b| {
///     b.on(
///         |action: &Action| matches!(action, Action::Increment).then_some(()),
///         ExecutionPolicy::Ordered,
///         |_, _count| async { Ok::<_, BoxError>(ChangedState::mutate(|count: u32| count + 1)) },
///     )
/// });
///
/// let machine = StateMachineFactory::new(|| 0u32, spec).unwrap().launch();
/// let mut states = machine.state();
/// assert_eq!(states.next().await.unwrap().unwrap(), 0);
///
/// machine.dispatch(Action::Increment).unwrap();
/// assert_eq!(states.next().await.unwrap().unwrap(), 1);
/// # }
/// ```
pub struct StateMachineFactory<S, A> {
    spec: Arc<StateMachineSpec<S, A>>,
    initial: InitialState<S>,
    memory: Arc<InMemoryStateHolder<S>>,
    custom_holder: Option<Arc<dyn StateHolder<S>>>,
    config: MachineConfig,
    logger: Arc<dyn Logger>,
}

impl<S: State, A: Action> StateMachineFactory<S, A> {
    /// Validate `spec` and build a factory starting from `initial_state`.
    ///
    /// Every spec problem is reported at once in [`FlowError::InvalidSpec`].
    pub fn new<F>(initial_state: F, spec: StateMachineSpec<S, A>) -> Result<Self, FlowError>
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        match spec.validate() {
            Validation::Success(_) => {}
            Validation::Failure(errors) => {
                return Err(FlowError::InvalidSpec(errors.iter().cloned().collect()));
            }
        }

        let initial: InitialState<S> = Arc::new(initial_state);
        Ok(Self {
            spec: Arc::new(spec),
            memory: Arc::new(InMemoryStateHolder::from_supplier(Arc::clone(&initial))),
            initial,
            custom_holder: None,
            config: MachineConfig::default(),
            logger: Arc::new(TracingLogger),
        })
    }

    pub fn with_config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `holder` for the initial state of every launch and to observe
    /// every emitted state.
    pub fn with_state_holder<H>(mut self, holder: H) -> Self
    where
        H: StateHolder<S> + 'static,
    {
        self.custom_holder = Some(Arc::new(holder));
        self
    }

    pub fn with_logger<L>(mut self, logger: L) -> Self
    where
        L: Logger + 'static,
    {
        self.logger = Arc::new(logger);
        self
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Launch a machine starting from the holder's state.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn launch(&self) -> StateMachine<S, A> {
        self.launch_with(self.holder())
    }

    /// Launch a machine starting from `initial`, bypassing the holder.
    pub fn launch_from(&self, initial: S) -> StateMachine<S, A> {
        self.launch_with(Arc::new(LossyStateHolder::new(move || initial.clone())))
    }

    fn holder(&self) -> Arc<dyn StateHolder<S>> {
        if let Some(holder) = &self.custom_holder {
            return Arc::clone(holder);
        }
        if self.config.reuse_last_emitted_state {
            return self.memory.clone();
        }
        Arc::new(LossyStateHolder::from_supplier(Arc::clone(&self.initial)))
    }

    fn launch_with(&self, holder: Arc<dyn StateHolder<S>>) -> StateMachine<S, A> {
        let logger = TaggedLogger::new(
            Arc::clone(&self.logger),
            &self.config.name,
            self.config.min_log_level,
        );
        let (actions, receiver) = mpsc::unbounded_channel();
        let upstream = stream::once(async { Event::Initialized })
            .chain(UnboundedReceiverStream::new(receiver).map(Event::Dispatched));

        let supplier = Arc::clone(&holder);
        let store = redux_store_with_logger(
            upstream,
            move || supplier.get_state(),
            self.spec.side_effects(&logger),
            reduce_event,
            logger.clone(),
        );
        StateMachine::spawn(store, actions, holder, logger)
    }
}

impl<S, A> Clone for StateMachineFactory<S, A> {
    fn clone(&self) -> Self {
        Self {
            spec: Arc::clone(&self.spec),
            initial: Arc::clone(&self.initial),
            memory: Arc::clone(&self.memory),
            custom_holder: self.custom_holder.clone(),
            config: self.config.clone(),
            logger: Arc::clone(&self.logger),
        }
    }
}
