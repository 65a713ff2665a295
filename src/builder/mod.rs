//! Builder API for declaring state machines.
//!
//! A [`StateMachineSpec`] groups handlers into `in_state` blocks. Each block
//! names the states its handlers run in; [`InStateBuilder`] registers the
//! handlers themselves. The spec is validated when a
//! [`StateMachineFactory`](crate::machine::StateMachineFactory) is built
//! from it.

pub mod error;
mod in_state;
pub mod macros;
mod record;
mod spec;

pub use error::BuildError;
pub use in_state::InStateBuilder;
pub use record::HandlerKind;
pub use spec::StateMachineSpec;
