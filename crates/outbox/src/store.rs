use std::pin::Pin;

use async_trait::async_trait;
use common::{MessageId, OrderId, SagaId};
use domain::{Order, SagaInstance};
use futures_core::Stream;

use crate::{OutboxMessage, Result};

/// One message's full mutation set, committed as a single atomic unit.
///
/// Produced by the dispatcher after the state machine computes a
/// transition: the updated saga row, the updated order row (when the
/// transition mutates the order), and zero-or-one follow-up message.
/// Committing also marks the source message processed and clears its
/// error text, closing the crash window between the business mutation
/// and the delivery mark.
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    /// The message whose processing produced this mutation set.
    pub message_id: MessageId,
    /// The saga row after the transition.
    pub saga: SagaInstance,
    /// The order row after the transition, if the order was mutated.
    pub order: Option<Order>,
    /// Follow-up event to append, if the transition emits one.
    pub follow_up: Option<OutboxMessage>,
}

/// A stream of outbox messages.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<OutboxMessage>> + Send>>;

/// Durable store for orders, saga instances, and the outbox.
///
/// All three collections live inside one transactional boundary: every
/// method that mutates more than one row commits those rows atomically.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Atomically inserts an order, its saga record, and the initiating
    /// outbox message.
    ///
    /// Either all three rows exist afterwards or none do; no order can
    /// exist without a corresponding saga and announcing event.
    async fn create_saga(
        &self,
        order: Order,
        saga: SagaInstance,
        message: OutboxMessage,
    ) -> Result<()>;

    /// Loads an order by ID.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads a saga record by ID.
    async fn get_saga(&self, id: SagaId) -> Result<Option<SagaInstance>>;

    /// Claims up to `limit` pending messages, oldest `occurred_at` first.
    ///
    /// Claiming is a conditional update: a message claimed by one caller
    /// is invisible to concurrent callers until its claim is released by
    /// [`commit_transition`](Self::commit_transition),
    /// [`mark_processed`](Self::mark_processed), or
    /// [`record_failure`](Self::record_failure). Two workers polling
    /// concurrently therefore never double-claim a message.
    async fn claim_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>>;

    /// Atomically commits one message's mutation set.
    ///
    /// Updates the saga row, the order row (if present), appends the
    /// follow-up message (if present), marks the source message processed,
    /// clears its error text, and releases its claim — all in one commit.
    async fn commit_transition(&self, commit: TransitionCommit) -> Result<()>;

    /// Marks a message processed with no other mutation (duplicate
    /// delivery no-op, or terminal per-message failure when `error` is
    /// set). Releases the claim.
    async fn mark_processed(&self, message_id: MessageId, error: Option<&str>) -> Result<()>;

    /// Records a retryable failure: increments the attempt count, stores
    /// the error text, and releases the claim. `processed_at` stays null
    /// so the message is eligible for the next cycle.
    async fn record_failure(&self, message_id: MessageId, error: &str) -> Result<()>;

    /// Returns all events referencing a saga, ordered by `occurred_at`
    /// ascending. Read-only; serves the timeline projection.
    async fn events_for_saga(&self, saga_id: SagaId) -> Result<Vec<OutboxMessage>>;

    /// Streams every outbox message in `occurred_at` order, processed or
    /// not. Serves audit consumers that replay the full log.
    async fn stream_all_messages(&self) -> Result<MessageStream>;
}
