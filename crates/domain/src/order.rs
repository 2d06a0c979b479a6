//! The order business entity.

use chrono::{DateTime, Utc};
use common::{Money, OrderId};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// Orders start as `Created` and end as either `Completed` (happy path)
/// or `Cancelled` (compensation path). Orders are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order exists but its saga has not finished.
    #[default]
    Created,

    /// Payment succeeded and the saga completed.
    Completed,

    /// Compensation cancelled the order after a failed step.
    Cancelled,
}

impl OrderStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "Created",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A customer order, the business entity the saga coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    pub amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new order in `Created` status.
    pub fn new(customer_name: impl Into<String>, amount: Money) -> Self {
        Self {
            id: OrderId::new(),
            customer_name: customer_name.into(),
            amount,
            status: OrderStatus::Created,
            created_at: Utc::now(),
        }
    }
}
