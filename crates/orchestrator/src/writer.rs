//! Saga writer: the atomic entry point for new business transactions.

use common::{CorrelationId, Money, OrderId, SagaId};
use domain::{EventType, Order, SagaInstance};
use outbox::{OutboxMessage, SagaStore};

use crate::error::Result;

/// Executes the client-facing business mutation and enqueues the
/// initiating event as one atomic unit.
///
/// Either the order row, the saga row, and the `OrderCreated` outbox
/// message all exist after a call, or none do. Input validity (non-empty
/// name, sensible amount) is the caller's responsibility.
pub struct SagaWriter<S: SagaStore> {
    store: S,
}

impl<S: SagaStore> SagaWriter<S> {
    /// Creates a new writer over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates an order and starts its saga.
    ///
    /// Returns the new order and saga IDs. On a storage failure no
    /// partial state is visible and no IDs are returned.
    #[tracing::instrument(skip(self, correlation_id), fields(correlation_id = %correlation_id))]
    pub async fn create_saga(
        &self,
        customer_name: &str,
        amount: Money,
        correlation_id: CorrelationId,
    ) -> Result<(OrderId, SagaId)> {
        let order = Order::new(customer_name, amount);
        let saga = SagaInstance::new(order.id);
        let message = OutboxMessage::new(EventType::OrderCreated, order.id, saga.id, correlation_id)?;

        let ids = (order.id, saga.id);
        self.store.create_saga(order, saga, message).await?;

        metrics::counter!("sagas_started_total").increment(1);
        tracing::info!(order_id = %ids.0, saga_id = %ids.1, %amount, "saga started");

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{OrderStatus, RunStatus, SagaState};
    use outbox::InMemorySagaStore;

    #[tokio::test]
    async fn create_saga_writes_all_three_rows() {
        let store = InMemorySagaStore::new();
        let writer = SagaWriter::new(store.clone());

        let (order_id, saga_id) = writer
            .create_saga("alice", Money::from_dollars(50), CorrelationId::new("req-1"))
            .await
            .unwrap();

        let order = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.customer_name, "alice");

        let saga = store.get_saga(saga_id).await.unwrap().unwrap();
        assert_eq!(saga.order_id, order_id);
        assert_eq!(saga.state, SagaState::Started);
        assert_eq!(saga.step, 0);
        assert_eq!(saga.status, RunStatus::Running);

        let events = store.events_for_saga(saga_id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "OrderCreated");
        assert!(events[0].is_pending());
        assert_eq!(events[0].correlation_id.as_str(), "req-1");
    }

    #[tokio::test]
    async fn initiating_event_payload_references_both_rows() {
        let store = InMemorySagaStore::new();
        let writer = SagaWriter::new(store.clone());

        let (order_id, saga_id) = writer
            .create_saga("bob", Money::from_dollars(10), CorrelationId::generate())
            .await
            .unwrap();

        let events = store.events_for_saga(saga_id).await.unwrap();
        let payload = events[0].decode_payload().unwrap();
        assert_eq!(payload.order_id, order_id);
        assert_eq!(payload.saga_id, saga_id);
    }
}
