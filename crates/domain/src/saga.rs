//! Saga progress record and its state/status enums.

use chrono::{DateTime, Utc};
use common::{OrderId, SagaId};
use serde::{Deserialize, Serialize};

/// The position of a saga along its forward or compensation chain.
///
/// State transitions:
/// ```text
/// Started ──► InventoryReserved ──┬──► PaymentProcessed ──► Completed
///                                 └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// Saga created, no event consumed yet.
    #[default]
    Started,

    /// Inventory has been reserved for the order.
    InventoryReserved,

    /// Payment was authorized.
    PaymentProcessed,

    /// All forward steps finished (terminal state).
    Completed,

    /// A step failed and compensating actions are in progress.
    Compensating,

    /// Compensation finished after a failure (terminal state).
    Failed,
}

impl SagaState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Completed | SagaState::Failed)
    }

    /// Returns true if this state lies on the compensation chain.
    ///
    /// A saga on the compensation chain must never move back to a
    /// forward state.
    pub fn is_compensation(&self) -> bool {
        matches!(self, SagaState::Compensating | SagaState::Failed)
    }

    /// Position of a forward-chain state along the forward chain.
    ///
    /// Returns `None` for compensation states. Used by the transition
    /// logic to distinguish a duplicate delivery (saga already past the
    /// event's source state) from a protocol violation.
    pub fn forward_step(&self) -> Option<i32> {
        match self {
            SagaState::Started => Some(0),
            SagaState::InventoryReserved => Some(1),
            SagaState::PaymentProcessed => Some(2),
            SagaState::Completed => Some(3),
            SagaState::Compensating | SagaState::Failed => None,
        }
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Started => "Started",
            SagaState::InventoryReserved => "InventoryReserved",
            SagaState::PaymentProcessed => "PaymentProcessed",
            SagaState::Completed => "Completed",
            SagaState::Compensating => "Compensating",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Overall run status of a saga.
///
/// Kept consistent with [`SagaState`]: `Completed` iff the state is
/// `Completed`, `Failed` once the saga enters the compensation chain
/// (`Compensating` or `Failed`), `Running` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Derives the run status consistent with a saga state.
    pub fn for_state(state: SagaState) -> Self {
        match state {
            SagaState::Completed => RunStatus::Completed,
            SagaState::Failed | SagaState::Compensating => RunStatus::Failed,
            _ => RunStatus::Running,
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable progress record for one saga, one per business transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaInstance {
    pub id: SagaId,
    pub order_id: OrderId,
    pub state: SagaState,
    /// Forward steps count 0→1→2→3; the compensation terminal is -1.
    pub step: i32,
    pub status: RunStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaInstance {
    /// Creates a new saga record at the start of the forward chain.
    pub fn new(order_id: OrderId) -> Self {
        let now = Utc::now();
        Self {
            id: SagaId::new(),
            order_id,
            state: SagaState::Started,
            step: 0,
            status: RunStatus::Running,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_saga_starts_running_at_step_zero() {
        let saga = SagaInstance::new(OrderId::new());
        assert_eq!(saga.state, SagaState::Started);
        assert_eq!(saga.step, 0);
        assert_eq!(saga.status, RunStatus::Running);
        assert!(saga.last_error.is_none());
    }

    #[test]
    fn terminal_states() {
        assert!(!SagaState::Started.is_terminal());
        assert!(!SagaState::InventoryReserved.is_terminal());
        assert!(!SagaState::PaymentProcessed.is_terminal());
        assert!(!SagaState::Compensating.is_terminal());
        assert!(SagaState::Completed.is_terminal());
        assert!(SagaState::Failed.is_terminal());
    }

    #[test]
    fn compensation_states() {
        assert!(SagaState::Compensating.is_compensation());
        assert!(SagaState::Failed.is_compensation());
        assert!(!SagaState::PaymentProcessed.is_compensation());
    }

    #[test]
    fn forward_positions_are_monotonic() {
        let chain = [
            SagaState::Started,
            SagaState::InventoryReserved,
            SagaState::PaymentProcessed,
            SagaState::Completed,
        ];
        for (i, state) in chain.iter().enumerate() {
            assert_eq!(state.forward_step(), Some(i as i32));
        }
        assert_eq!(SagaState::Compensating.forward_step(), None);
        assert_eq!(SagaState::Failed.forward_step(), None);
    }

    #[test]
    fn run_status_consistent_with_state() {
        assert_eq!(RunStatus::for_state(SagaState::Started), RunStatus::Running);
        assert_eq!(
            RunStatus::for_state(SagaState::PaymentProcessed),
            RunStatus::Running
        );
        assert_eq!(
            RunStatus::for_state(SagaState::Completed),
            RunStatus::Completed
        );
        assert_eq!(
            RunStatus::for_state(SagaState::Compensating),
            RunStatus::Failed
        );
        assert_eq!(RunStatus::for_state(SagaState::Failed), RunStatus::Failed);
    }

    #[test]
    fn serialization_roundtrip() {
        let saga = SagaInstance::new(OrderId::new());
        let json = serde_json::to_string(&saga).unwrap();
        let back: SagaInstance = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, saga.id);
        assert_eq!(back.state, saga.state);
    }
}
