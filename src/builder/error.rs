//! Spec construction errors.

use thiserror::Error;

/// Problems found when validating a [`StateMachineSpec`](super::StateMachineSpec).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("No side effects defined. Add at least one in_state block")]
    EmptySpec,

    #[error("Scope '{scope}' registers no handlers. Add a handler or remove the block")]
    EmptyScope { scope: String },

    #[error("Throttled handler '{handler}' needs a non-zero window")]
    ZeroThrottleWindow { handler: String },
}
