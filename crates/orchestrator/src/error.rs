//! Orchestrator error types.

use outbox::OutboxError;
use thiserror::Error;

/// Errors surfaced by the writer and the dispatcher loop.
///
/// Per-message handler failures are not represented here: the dispatcher
/// records those on the message itself (attempt count, error text) and
/// keeps going. Only store-level failures escape a cycle.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A store operation failed.
    #[error("store error: {0}")]
    Store(#[from] OutboxError),

    /// An event payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
