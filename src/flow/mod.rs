//! Stream plumbing shared by the store and the declarative builders.
//!
//! - `channel_stream`: streams fed by cancellable tasks
//! - `SharedLog`: ordered fan-out to independent readers
//! - `map_with_policy`: execution policies over trigger streams
//! - `while_in_state`: state-scoped dispatch

mod log;
mod policy;
mod producer;
mod scope;

pub(crate) use log::{LogReader, SharedLog};
pub use policy::ThrottleWindow;
pub(crate) use policy::{map_with_policy, Invocation};
pub(crate) use producer::{channel_stream, Producer};
pub(crate) use scope::{stay_while, while_in_state, ScopeInput, StayGuard};
