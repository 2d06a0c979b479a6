use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{MessageId, OrderId, SagaId};
use domain::{Order, SagaInstance};
use tokio::sync::RwLock;

use crate::{
    OutboxError, OutboxMessage, Result,
    store::{MessageStream, SagaStore, TransitionCommit},
};

/// All three collections behind one lock, so every multi-row commit is
/// atomic and readers never observe a partial write.
#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    sagas: HashMap<SagaId, SagaInstance>,
    messages: Vec<OutboxMessage>,
    /// Message IDs currently leased to a dispatcher.
    claims: HashSet<MessageId>,
}

/// In-memory saga store implementation.
///
/// Provides the same transactional guarantees the relational store
/// contract requires: one write lock spans orders, sagas, and the outbox,
/// so each [`SagaStore`] mutation commits all of its rows or none.
/// Used by tests and the default binary.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemorySagaStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of outbox messages.
    pub async fn message_count(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    /// Returns the number of messages still awaiting delivery.
    pub async fn pending_count(&self) -> usize {
        self.inner
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.is_pending())
            .count()
    }

    /// Loads a message by ID.
    pub async fn get_message(&self, id: MessageId) -> Option<OutboxMessage> {
        self.inner
            .read()
            .await
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    /// Overwrites a message's `occurred_at`, for tests exercising
    /// delivery order.
    pub async fn backdate_message(
        &self,
        id: MessageId,
        occurred_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let msg = find_message(&mut inner, id)?;
        msg.occurred_at = occurred_at;
        Ok(())
    }
}

fn find_message(inner: &mut Inner, id: MessageId) -> Result<&mut OutboxMessage> {
    inner
        .messages
        .iter_mut()
        .find(|m| m.id == id)
        .ok_or(OutboxError::MessageNotFound(id))
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn create_saga(
        &self,
        order: Order,
        saga: SagaInstance,
        message: OutboxMessage,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.sagas.contains_key(&saga.id) {
            return Err(OutboxError::DuplicateSaga(saga.id));
        }

        inner.orders.insert(order.id, order);
        inner.sagas.insert(saga.id, saga);
        inner.messages.push(message);
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn get_saga(&self, id: SagaId) -> Result<Option<SagaInstance>> {
        Ok(self.inner.read().await.sagas.get(&id).cloned())
    }

    async fn claim_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let mut inner = self.inner.write().await;

        let mut candidates: Vec<usize> = inner
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_pending() && !inner.claims.contains(&m.id))
            .map(|(i, _)| i)
            .collect();

        // Global FIFO by emission time; stable sort keeps insertion order
        // for equal timestamps.
        candidates.sort_by_key(|&i| inner.messages[i].occurred_at);
        candidates.truncate(limit);

        let claimed: Vec<OutboxMessage> = candidates
            .into_iter()
            .map(|i| inner.messages[i].clone())
            .collect();
        for msg in &claimed {
            inner.claims.insert(msg.id);
        }

        Ok(claimed)
    }

    async fn commit_transition(&self, commit: TransitionCommit) -> Result<()> {
        let mut inner = self.inner.write().await;

        // Validate references before mutating anything, so a bad commit
        // leaves the store untouched.
        if !inner.messages.iter().any(|m| m.id == commit.message_id) {
            return Err(OutboxError::MessageNotFound(commit.message_id));
        }
        if !inner.sagas.contains_key(&commit.saga.id) {
            return Err(OutboxError::SagaNotFound(commit.saga.id));
        }
        if let Some(ref order) = commit.order
            && !inner.orders.contains_key(&order.id)
        {
            return Err(OutboxError::OrderNotFound(order.id));
        }

        inner.sagas.insert(commit.saga.id, commit.saga);
        if let Some(order) = commit.order {
            inner.orders.insert(order.id, order);
        }
        if let Some(follow_up) = commit.follow_up {
            inner.messages.push(follow_up);
        }

        let message_id = commit.message_id;
        let msg = find_message(&mut inner, message_id)?;
        msg.processed_at = Some(Utc::now());
        msg.last_error = None;
        inner.claims.remove(&message_id);

        Ok(())
    }

    async fn mark_processed(&self, message_id: MessageId, error: Option<&str>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let msg = find_message(&mut inner, message_id)?;
        msg.processed_at = Some(Utc::now());
        match error {
            Some(text) => {
                msg.attempt_count += 1;
                msg.last_error = Some(text.to_string());
            }
            None => msg.last_error = None,
        }
        inner.claims.remove(&message_id);
        Ok(())
    }

    async fn record_failure(&self, message_id: MessageId, error: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let msg = find_message(&mut inner, message_id)?;
        msg.attempt_count += 1;
        msg.last_error = Some(error.to_string());
        inner.claims.remove(&message_id);
        Ok(())
    }

    async fn events_for_saga(&self, saga_id: SagaId) -> Result<Vec<OutboxMessage>> {
        let inner = self.inner.read().await;
        let mut events: Vec<OutboxMessage> = inner
            .messages
            .iter()
            .filter(|m| m.saga_id == saga_id)
            .cloned()
            .collect();
        events.sort_by_key(|m| m.occurred_at);
        Ok(events)
    }

    async fn stream_all_messages(&self) -> Result<MessageStream> {
        use futures_util::stream;

        let inner = self.inner.read().await;
        let mut messages = inner.messages.clone();
        messages.sort_by_key(|m| m.occurred_at);

        let stream = stream::iter(messages.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{CorrelationId, Money};
    use domain::EventType;

    fn seed() -> (Order, SagaInstance, OutboxMessage) {
        let order = Order::new("alice", Money::from_dollars(50));
        let saga = SagaInstance::new(order.id);
        let message = OutboxMessage::new(
            EventType::OrderCreated,
            order.id,
            saga.id,
            CorrelationId::generate(),
        )
        .unwrap();
        (order, saga, message)
    }

    #[tokio::test]
    async fn create_saga_inserts_all_three_rows() {
        let store = InMemorySagaStore::new();
        let (order, saga, message) = seed();
        let (order_id, saga_id) = (order.id, saga.id);

        store.create_saga(order, saga, message).await.unwrap();

        assert!(store.get_order(order_id).await.unwrap().is_some());
        assert!(store.get_saga(saga_id).await.unwrap().is_some());
        assert_eq!(store.message_count().await, 1);
        assert_eq!(store.pending_count().await, 1);
    }

    #[tokio::test]
    async fn create_saga_rejects_duplicate_saga_id() {
        let store = InMemorySagaStore::new();
        let (order, saga, message) = seed();

        store
            .create_saga(order.clone(), saga.clone(), message.clone())
            .await
            .unwrap();
        let result = store.create_saga(order, saga, message).await;

        assert!(matches!(result, Err(OutboxError::DuplicateSaga(_))));
        assert_eq!(store.message_count().await, 1);
    }

    #[tokio::test]
    async fn claim_pending_returns_oldest_first() {
        let store = InMemorySagaStore::new();
        let (order, saga, message) = seed();
        let first_id = message.id;
        store.create_saga(order, saga, message).await.unwrap();

        let (order2, saga2, message2) = seed();
        let second_id = message2.id;
        store.create_saga(order2, saga2, message2).await.unwrap();

        // Backdate the second message so it must come out first.
        store
            .backdate_message(second_id, Utc::now() - Duration::hours(1))
            .await
            .unwrap();

        let claimed = store.claim_pending(10).await.unwrap();
        assert_eq!(claimed.len(), 2);
        assert_eq!(claimed[0].id, second_id);
        assert_eq!(claimed[1].id, first_id);
    }

    #[tokio::test]
    async fn claim_pending_respects_limit() {
        let store = InMemorySagaStore::new();
        for _ in 0..5 {
            let (order, saga, message) = seed();
            store.create_saga(order, saga, message).await.unwrap();
        }

        let claimed = store.claim_pending(3).await.unwrap();
        assert_eq!(claimed.len(), 3);
    }

    #[tokio::test]
    async fn claimed_messages_are_invisible_to_other_claimants() {
        let store = InMemorySagaStore::new();
        let (order, saga, message) = seed();
        store.create_saga(order, saga, message).await.unwrap();

        let first = store.claim_pending(10).await.unwrap();
        assert_eq!(first.len(), 1);

        let second = store.claim_pending(10).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn concurrent_claimants_never_double_claim() {
        let store = InMemorySagaStore::new();
        for _ in 0..20 {
            let (order, saga, message) = seed();
            store.create_saga(order, saga, message).await.unwrap();
        }

        let (a, b) = tokio::join!(store.claim_pending(20), store.claim_pending(20));
        let a = a.unwrap();
        let b = b.unwrap();

        assert_eq!(a.len() + b.len(), 20);
        for msg in &a {
            assert!(!b.iter().any(|other| other.id == msg.id));
        }
    }

    #[tokio::test]
    async fn record_failure_keeps_message_pending_and_releases_claim() {
        let store = InMemorySagaStore::new();
        let (order, saga, message) = seed();
        let message_id = message.id;
        store.create_saga(order, saga, message).await.unwrap();

        store.claim_pending(10).await.unwrap();
        store
            .record_failure(message_id, "saga lookup failed")
            .await
            .unwrap();

        let msg = store.get_message(message_id).await.unwrap();
        assert!(msg.is_pending());
        assert_eq!(msg.attempt_count, 1);
        assert_eq!(msg.last_error.as_deref(), Some("saga lookup failed"));

        // Eligible again on the next cycle.
        let reclaimed = store.claim_pending(10).await.unwrap();
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].id, message_id);
    }

    #[tokio::test]
    async fn mark_processed_with_error_is_terminal() {
        let store = InMemorySagaStore::new();
        let (order, saga, message) = seed();
        let message_id = message.id;
        store.create_saga(order, saga, message).await.unwrap();

        store.claim_pending(10).await.unwrap();
        store
            .mark_processed(message_id, Some("unknown event type: OrderShipped"))
            .await
            .unwrap();

        let msg = store.get_message(message_id).await.unwrap();
        assert!(!msg.is_pending());
        assert_eq!(msg.attempt_count, 1);
        assert!(msg.last_error.is_some());
        assert!(store.claim_pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_transition_applies_all_rows_atomically() {
        let store = InMemorySagaStore::new();
        let (order, saga, message) = seed();
        let message_id = message.id;
        store
            .create_saga(order.clone(), saga.clone(), message)
            .await
            .unwrap();

        let mut updated_saga = saga.clone();
        updated_saga.state = domain::SagaState::InventoryReserved;
        updated_saga.step = 1;

        let follow_up = OutboxMessage::new(
            EventType::InventoryReserved,
            order.id,
            saga.id,
            CorrelationId::generate(),
        )
        .unwrap();

        store
            .commit_transition(TransitionCommit {
                message_id,
                saga: updated_saga,
                order: None,
                follow_up: Some(follow_up),
            })
            .await
            .unwrap();

        let stored_saga = store.get_saga(saga.id).await.unwrap().unwrap();
        assert_eq!(stored_saga.state, domain::SagaState::InventoryReserved);

        let msg = store.get_message(message_id).await.unwrap();
        assert!(!msg.is_pending());
        assert!(msg.last_error.is_none());

        // Follow-up appended and pending.
        assert_eq!(store.message_count().await, 2);
        assert_eq!(store.pending_count().await, 1);
    }

    #[tokio::test]
    async fn commit_transition_for_missing_message_leaves_store_untouched() {
        let store = InMemorySagaStore::new();
        let (order, saga, message) = seed();
        store
            .create_saga(order, saga.clone(), message)
            .await
            .unwrap();

        let mut updated_saga = saga.clone();
        updated_saga.step = 1;

        let result = store
            .commit_transition(TransitionCommit {
                message_id: MessageId::new(),
                saga: updated_saga,
                order: None,
                follow_up: None,
            })
            .await;

        assert!(matches!(result, Err(OutboxError::MessageNotFound(_))));
        let stored = store.get_saga(saga.id).await.unwrap().unwrap();
        assert_eq!(stored.step, 0);
    }

    #[tokio::test]
    async fn events_for_saga_sorted_by_occurred_at() {
        let store = InMemorySagaStore::new();
        let (order, saga, message) = seed();
        let saga_id = saga.id;
        let order_id = order.id;
        let first_id = message.id;
        store.create_saga(order, saga, message).await.unwrap();

        // Insert a second event that occurred earlier than the first.
        let earlier = OutboxMessage {
            occurred_at: Utc::now() - Duration::minutes(5),
            ..OutboxMessage::new(
                EventType::InventoryReserved,
                order_id,
                saga_id,
                CorrelationId::generate(),
            )
            .unwrap()
        };
        let earlier_id = earlier.id;
        store
            .commit_transition(TransitionCommit {
                message_id: first_id,
                saga: store.get_saga(saga_id).await.unwrap().unwrap(),
                order: None,
                follow_up: Some(earlier),
            })
            .await
            .unwrap();

        let events = store.events_for_saga(saga_id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, earlier_id);
        assert_eq!(events[1].id, first_id);
    }

    #[tokio::test]
    async fn events_for_unknown_saga_is_empty() {
        let store = InMemorySagaStore::new();
        let events = store.events_for_saga(SagaId::new()).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn stream_all_messages_in_occurred_at_order() {
        use futures_util::StreamExt;

        let store = InMemorySagaStore::new();
        for _ in 0..3 {
            let (order, saga, message) = seed();
            store.create_saga(order, saga, message).await.unwrap();
        }

        let stream = store.stream_all_messages().await.unwrap();
        let messages: Vec<_> = stream.collect().await;
        assert_eq!(messages.len(), 3);

        let times: Vec<_> = messages
            .iter()
            .map(|m| m.as_ref().unwrap().occurred_at)
            .collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }
}
