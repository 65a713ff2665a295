//! Constructing, driving and observing declarative state machines.
//!
//! - [`StateMachineFactory`]: validated spec, initial state and settings
//! - [`StateMachine`]: handle on one launched machine
//! - [`StateHolder`]: where launches get their initial state

mod config;
mod factory;
mod handle;
mod holder;

pub use config::MachineConfig;
pub use factory::StateMachineFactory;
pub use handle::StateMachine;
pub use holder::{InMemoryStateHolder, InitialState, LossyStateHolder, StateHolder};
