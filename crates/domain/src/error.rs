//! Domain error types.

use thiserror::Error;

use crate::event::EventType;
use crate::saga::SagaState;

/// Errors produced by the pure transition function.
///
/// Every transition error is a protocol violation: the `(state, event)`
/// pair lies outside both the forward and the compensation chain. These
/// are terminal per-message failures, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The event cannot apply to a saga in this state.
    #[error("event {event} cannot apply to saga in state {state}")]
    UnexpectedState { event: EventType, state: SagaState },
}

/// Errors that can occur in the domain layer.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The event type string on the wire is not part of the closed set.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// A transition was attempted outside the state machine's table.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// An event payload could not be serialized or deserialized.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}
