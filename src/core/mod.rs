//! Core state machine types.
//!
//! This module contains the pure building blocks shared by the store loop
//! and the declarative builders:
//! - State and action bounds via the `State` and `Action` traits
//! - Guard predicates that define scopes
//! - `ChangedState`, the result of every reducer and handler
//! - `Event`, the internal action model of declarative machines
//! - `ExecutionPolicy`, the concurrency policy of triggered handlers
//!
//! Nothing in this module spawns tasks or performs I/O.

mod change;
mod event;
mod guard;
mod policy;
mod state;

pub use change::{ChangedState, Mutation};
pub(crate) use event::reduce_event;
pub use event::{Event, StateChange};
pub use guard::Guard;
pub use policy::ExecutionPolicy;
pub use state::{Action, State};
