//! Flowstate: concurrent state machines with state-scoped side effects
//!
//! A machine is a single reducer loop: actions go in, immutable states come
//! out. Side effects are declared per state. They start when the machine
//! enters a matching state and are cancelled as soon as it leaves, so a slow
//! request started in one state can never overwrite a later one.
//!
//! # Core Concepts
//!
//! - **Store**: [`store::redux_store`] reduces a stream of actions and feeds
//!   every action to long-running side effects
//! - **Spec**: [`builder::StateMachineSpec`] declares handlers grouped by the
//!   states they run in
//! - **Policies**: [`core::ExecutionPolicy`] decides what happens when a
//!   trigger arrives while its handler is still busy
//! - **Machines**: [`machine::StateMachineFactory`] launches
//!   [`machine::StateMachine`] handles that accept actions and stream states
//!
//! # Example
//!
//! ```rust
//! use flowstate::action_of;
//! use flowstate::builder::StateMachineSpec;
//! use flowstate::core::{ChangedState, ExecutionPolicy};
//! use flowstate::error::BoxError;
//! use flowstate::machine::StateMachineFactory;
//! use futures::StreamExt;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Light {
//!     Off,
//!     On { brightness: u8 },
//! }
//!
//! #[derive(Clone, Debug)]
//! enum Switch {
//!     Toggle,
//!     Dim(u8),
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let spec = StateMachineSpec::<Light, Switch>::new()
//!     .in_state(
//!         |light| *light == Light::Off,
//!         |scope| {
//!             scope.on(
//!                 action_of!(Switch::Toggle),
//!                 ExecutionPolicy::Ordered,
//!                 |_, _| async {
//!                     let on = Light::On { brightness: 100 };
//!                     Ok::<_, BoxError>(ChangedState::Override(on))
//!                 },
//!             )
//!         },
//!     )
//!     .in_state(
//!         |light| matches!(light, Light::On { .. }),
//!         |scope| {
//!             scope
//!                 .on(
//!                     action_of!(Switch::Toggle),
//!                     ExecutionPolicy::Ordered,
//!                     |_, _| async { Ok::<_, BoxError>(ChangedState::Override(Light::Off)) },
//!                 )
//!                 .on(
//!                     action_of!(Switch::Dim(level) => *level),
//!                     ExecutionPolicy::CancelPrevious,
//!                     |level, _| async move {
//!                         let on = Light::On { brightness: level };
//!                         Ok::<_, BoxError>(ChangedState::Override(on))
//!                     },
//!                 )
//!         },
//!     );
//!
//! let machine = StateMachineFactory::new(|| Light::Off, spec)
//!     .unwrap()
//!     .launch();
//! let mut states = machine.state();
//! assert_eq!(states.next().await.unwrap().unwrap(), Light::Off);
//!
//! machine.dispatch(Switch::Toggle).unwrap();
//! assert_eq!(
//!     states.next().await.unwrap().unwrap(),
//!     Light::On { brightness: 100 }
//! );
//!
//! machine.dispatch(Switch::Dim(30)).unwrap();
//! assert_eq!(
//!     states.next().await.unwrap().unwrap(),
//!     Light::On { brightness: 30 }
//! );
//! # }
//! ```

pub mod builder;
pub mod checkpoint;
pub mod core;
pub(crate) mod effects;
pub mod error;
pub(crate) mod flow;
pub mod logger;
pub mod machine;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use builder::{BuildError, InStateBuilder, StateMachineSpec};
pub use core::{Action, ChangedState, ExecutionPolicy, Guard, State};
pub use effects::HandlerResult;
pub use error::{BoxError, FlowError};
pub use flow::ThrottleWindow;
pub use machine::{MachineConfig, StateMachine, StateMachineFactory};
