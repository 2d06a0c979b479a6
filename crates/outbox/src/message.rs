//! The outbox message envelope.

use chrono::{DateTime, Utc};
use common::{CorrelationId, MessageId, OrderId, SagaId};
use domain::{DomainError, EventPayload, EventType};
use serde::{Deserialize, Serialize};

/// Envelope for one domain event awaiting (or having completed) delivery.
///
/// The saga and order references are structured envelope fields, so
/// correlation queries are indexed lookups rather than substring scans of
/// the serialized payload. Rows are never deleted; processed messages
/// double as the saga's append-only audit timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: MessageId,

    /// Event type discriminator as stored on the wire.
    ///
    /// Kept as a string at the envelope level; [`OutboxMessage::event_type`]
    /// parses it into the closed [`EventType`] set, and a string outside
    /// that set is a terminal per-message failure.
    pub event_type: String,

    pub saga_id: SagaId,
    pub order_id: OrderId,

    /// Serialized event body.
    pub payload: serde_json::Value,

    pub occurred_at: DateTime<Utc>,

    /// Correlation id propagated from the originating request.
    pub correlation_id: CorrelationId,

    /// Null while the message awaits delivery.
    pub processed_at: Option<DateTime<Utc>>,

    pub attempt_count: i32,
    pub last_error: Option<String>,
}

impl OutboxMessage {
    /// Creates a pending message for an event of the given type.
    pub fn new(
        event_type: EventType,
        order_id: OrderId,
        saga_id: SagaId,
        correlation_id: CorrelationId,
    ) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_value(EventPayload::new(order_id, saga_id))?;
        Ok(Self {
            id: MessageId::new(),
            event_type: event_type.as_str().to_string(),
            saga_id,
            order_id,
            payload,
            occurred_at: Utc::now(),
            correlation_id,
            processed_at: None,
            attempt_count: 0,
            last_error: None,
        })
    }

    /// Returns true while the message awaits delivery.
    pub fn is_pending(&self) -> bool {
        self.processed_at.is_none()
    }

    /// Parses the wire string into the closed event-type set.
    pub fn event_type(&self) -> Result<EventType, DomainError> {
        self.event_type.parse()
    }

    /// Decodes the event body.
    pub fn decode_payload(&self) -> Result<EventPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_is_pending() {
        let msg = OutboxMessage::new(
            EventType::OrderCreated,
            OrderId::new(),
            SagaId::new(),
            CorrelationId::generate(),
        )
        .unwrap();

        assert!(msg.is_pending());
        assert_eq!(msg.attempt_count, 0);
        assert!(msg.last_error.is_none());
        assert_eq!(msg.event_type().unwrap(), EventType::OrderCreated);
    }

    #[test]
    fn payload_carries_order_and_saga_references() {
        let order_id = OrderId::new();
        let saga_id = SagaId::new();
        let msg = OutboxMessage::new(
            EventType::InventoryReserved,
            order_id,
            saga_id,
            CorrelationId::new("req-1"),
        )
        .unwrap();

        let payload = msg.decode_payload().unwrap();
        assert_eq!(payload.order_id, order_id);
        assert_eq!(payload.saga_id, saga_id);
    }

    #[test]
    fn unknown_wire_string_fails_to_parse() {
        let mut msg = OutboxMessage::new(
            EventType::OrderCreated,
            OrderId::new(),
            SagaId::new(),
            CorrelationId::generate(),
        )
        .unwrap();
        msg.event_type = "OrderShipped".to_string();

        assert!(msg.event_type().is_err());
    }
}
