//! Runtime errors.

use crate::builder::BuildError;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// Error type handlers and reducers return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared error source, so a fault can be delivered to every observer.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Faults that terminate a store or state machine.
///
/// Cancellation is not an error: work dropped because its scope was left or
/// because a newer trigger replaced it ends silently.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    #[error("Reducer failed: {0}")]
    Reducer(#[source] SharedError),

    #[error("Side effect in {scope} failed: {source}")]
    SideEffect {
        scope: String,
        #[source]
        source: SharedError,
    },

    #[error("Side effect in {scope} panicked: {message}")]
    Panicked { scope: String, message: String },

    #[error("Child state machine in {scope} failed: {source}")]
    ChildStateMachine {
        scope: String,
        #[source]
        source: Box<FlowError>,
    },

    #[error("State machine is no longer running")]
    Closed,

    #[error("Invalid state machine spec: {}", describe(.0))]
    InvalidSpec(Vec<BuildError>),
}

impl FlowError {
    pub(crate) fn reducer(error: BoxError) -> Self {
        FlowError::Reducer(Arc::from(error))
    }

    pub(crate) fn side_effect(scope: impl Into<String>, error: BoxError) -> Self {
        FlowError::SideEffect {
            scope: scope.into(),
            source: Arc::from(error),
        }
    }

    pub(crate) fn panicked(scope: impl Into<String>, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        FlowError::Panicked {
            scope: scope.into(),
            message,
        }
    }

    pub(crate) fn child(scope: impl Into<String>, error: FlowError) -> Self {
        FlowError::ChildStateMachine {
            scope: scope.into(),
            source: Box::new(error),
        }
    }
}

fn describe(errors: &[BuildError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn side_effect_keeps_its_source() {
        let error = FlowError::side_effect("in_state[0]", "network down".into());

        assert_eq!(
            error.to_string(),
            "Side effect in in_state[0] failed: network down"
        );
        assert_eq!(error.source().unwrap().to_string(), "network down");
    }

    #[test]
    fn panic_payloads_become_messages() {
        let from_str = FlowError::panicked("scope", Box::new("boom"));
        let from_string = FlowError::panicked("scope", Box::new(String::from("bang")));
        let opaque = FlowError::panicked("scope", Box::new(17u8));

        let message = |error: FlowError| match error {
            FlowError::Panicked { message, .. } => message,
            other => panic!("unexpected fault {other:?}"),
        };

        assert_eq!(message(from_str), "boom");
        assert_eq!(message(from_string), "bang");
        assert_eq!(message(opaque), "non-string panic payload");
    }

    #[test]
    fn errors_are_cloneable_for_fan_out() {
        let error = FlowError::child("parent", FlowError::reducer("bad input".into()));
        let copy = error.clone();

        assert_eq!(error.to_string(), copy.to_string());
        assert!(copy.source().is_some());
    }

    #[test]
    fn invalid_spec_lists_every_violation() {
        let error = FlowError::InvalidSpec(vec![
            BuildError::EmptySpec,
            BuildError::EmptyScope {
                scope: "in_state[0]".to_string(),
            },
        ]);

        let message = error.to_string();
        assert!(message.contains("No side effects defined"));
        assert!(message.contains("in_state[0]"));
    }
}
