//! Outbox store error types.

use common::{MessageId, OrderId, SagaId};
use thiserror::Error;

/// Errors that can occur when interacting with the saga store.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// The referenced outbox message does not exist.
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// The referenced saga does not exist.
    #[error("saga not found: {0}")]
    SagaNotFound(SagaId),

    /// The referenced order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// A row with this identity already exists.
    #[error("duplicate saga: {0}")]
    DuplicateSaga(SagaId),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, OutboxError>;
