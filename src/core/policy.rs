//! Concurrency policies for handlers triggered by a stream of values.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a handler reacts when a new trigger arrives while it is still busy.
///
/// # Example
///
/// ```rust
/// use flowstate::core::ExecutionPolicy;
/// use std::time::Duration;
///
/// assert_eq!(ExecutionPolicy::default(), ExecutionPolicy::CancelPrevious);
///
/// let throttled = ExecutionPolicy::Throttled(Duration::from_millis(500));
/// assert!(!throttled.runs_concurrently());
/// assert!(ExecutionPolicy::Unordered.runs_concurrently());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionPolicy {
    /// Cancel the in-flight handler and run the new trigger.
    #[default]
    CancelPrevious,

    /// Queue triggers and run them one at a time in arrival order.
    Ordered,

    /// Run every trigger immediately; results arrive in completion order.
    Unordered,

    /// Accept at most one trigger per fixed window and drop triggers that
    /// arrive while the accepted handler is still running.
    Throttled(Duration),
}

impl ExecutionPolicy {
    /// Whether more than one handler invocation may be in flight at once.
    pub fn runs_concurrently(&self) -> bool {
        matches!(self, ExecutionPolicy::Unordered)
    }
}
