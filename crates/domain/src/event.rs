//! The closed set of domain event types and their payload.

use common::{OrderId, SagaId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Every event type the saga can produce or consume.
///
/// Modeled as a closed enum so the state machine is exhaustive over
/// `(state, event)` pairs at compile time. An event-type string outside
/// this set fails to parse and is treated as a terminal per-message
/// failure by the dispatcher, not a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Order row and saga row were created atomically.
    OrderCreated,

    /// Inventory was reserved for the order.
    InventoryReserved,

    /// Payment was authorized.
    PaymentProcessed,

    /// First compensation step: release the reserved inventory.
    CompensateReleaseInventory,

    /// Second compensation step: cancel the order.
    CompensateCancelOrder,
}

impl EventType {
    /// Returns the event type name as stored on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderCreated => "OrderCreated",
            EventType::InventoryReserved => "InventoryReserved",
            EventType::PaymentProcessed => "PaymentProcessed",
            EventType::CompensateReleaseInventory => "CompensateReleaseInventory",
            EventType::CompensateCancelOrder => "CompensateCancelOrder",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OrderCreated" => Ok(EventType::OrderCreated),
            "InventoryReserved" => Ok(EventType::InventoryReserved),
            "PaymentProcessed" => Ok(EventType::PaymentProcessed),
            "CompensateReleaseInventory" => Ok(EventType::CompensateReleaseInventory),
            "CompensateCancelOrder" => Ok(EventType::CompensateCancelOrder),
            other => Err(DomainError::UnknownEventType(other.to_string())),
        }
    }
}

/// Payload carried by every saga event.
///
/// The saga and order references are also stored as structured fields on
/// the outbox envelope; the payload repeats them so a consumer reading
/// only the event body still has full context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub order_id: OrderId,
    pub saga_id: SagaId,
}

impl EventPayload {
    /// Creates a payload linking an order and its saga.
    pub fn new(order_id: OrderId, saga_id: SagaId) -> Self {
        Self { order_id, saga_id }
    }
}
