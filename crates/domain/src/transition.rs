//! The saga state machine.
//!
//! [`transition`] is a pure function from (saga snapshot, event, order
//! snapshot) to the next state of the world. It never touches storage; the
//! dispatcher commits the returned outcome atomically.
//!
//! The machine has two chains:
//!
//! ```text
//! forward:      Started ──OrderCreated──► InventoryReserved
//!               ──InventoryReserved──► PaymentProcessed
//!               ──PaymentProcessed──► Completed
//!
//! compensation: Compensating ──CompensateReleaseInventory──► Compensating
//!               ──CompensateCancelOrder──► Failed
//! ```
//!
//! Compensation is entered once, when the payment admission check rejects
//! the order, and is never re-entered from a terminal state.

use common::Money;

use crate::error::TransitionError;
use crate::event::EventType;
use crate::order::{Order, OrderStatus};
use crate::saga::{RunStatus, SagaInstance, SagaState};

/// Maximum order amount the simulated payment authorization accepts.
pub const PAYMENT_LIMIT: Money = Money::from_cents(10_000);

/// Step value marking the compensation-terminal outcome.
pub const COMPENSATION_STEP: i32 = -1;

/// Error text recorded when the payment admission check rejects an order.
const PAYMENT_FAILED: &str = "Payment failed (simulated)";

/// Result of applying an event to a saga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The event advanced the saga; the outcome must be committed.
    Applied(TransitionOutcome),

    /// The saga already consumed this event (at-least-once re-delivery).
    /// The message should be marked processed with no other mutation.
    Duplicate,
}

/// The full mutation set produced by one applied transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// New saga state.
    pub saga_state: SagaState,
    /// New run status, kept consistent with the state.
    pub run_status: RunStatus,
    /// New step counter value.
    pub step: i32,
    /// Error text to record on the saga, if any.
    pub saga_error: Option<String>,
    /// New order status, if the order is mutated by this transition.
    pub order_status: Option<OrderStatus>,
    /// Follow-up event to append to the outbox, if any.
    pub follow_up: Option<EventType>,
}

impl TransitionOutcome {
    fn forward(state: SagaState, step: i32, follow_up: Option<EventType>) -> Self {
        Self {
            saga_state: state,
            run_status: RunStatus::for_state(state),
            step,
            saga_error: None,
            order_status: None,
            follow_up,
        }
    }
}

/// Applies one event to a saga, returning the mutation set to commit.
///
/// Total over every `(state, event)` pair: each pair is either an applied
/// transition from the table, a duplicate delivery (no-op), or a
/// [`TransitionError`] for pairs outside both chains. Duplicates are
/// detected by the saga having already advanced past the state the event
/// transitions from, which makes re-processing an already-committed
/// message safe.
pub fn transition(
    saga: &SagaInstance,
    event: EventType,
    order: &Order,
) -> Result<Transition, TransitionError> {
    match event {
        EventType::OrderCreated => match saga.state {
            SagaState::Started => Ok(Transition::Applied(TransitionOutcome::forward(
                SagaState::InventoryReserved,
                1,
                Some(EventType::InventoryReserved),
            ))),
            // OrderCreated is always the first event consumed; any other
            // state means it was already applied.
            _ => Ok(Transition::Duplicate),
        },

        EventType::InventoryReserved => match saga.state {
            SagaState::InventoryReserved => {
                if order.amount <= PAYMENT_LIMIT {
                    Ok(Transition::Applied(TransitionOutcome::forward(
                        SagaState::PaymentProcessed,
                        2,
                        Some(EventType::PaymentProcessed),
                    )))
                } else {
                    // Admission threshold rejected: enter the compensation
                    // chain. Step stays where the forward chain stopped.
                    Ok(Transition::Applied(TransitionOutcome {
                        saga_state: SagaState::Compensating,
                        run_status: RunStatus::Failed,
                        step: saga.step,
                        saga_error: Some(PAYMENT_FAILED.to_string()),
                        order_status: None,
                        follow_up: Some(EventType::CompensateReleaseInventory),
                    }))
                }
            }
            SagaState::PaymentProcessed
            | SagaState::Completed
            | SagaState::Compensating
            | SagaState::Failed => Ok(Transition::Duplicate),
            SagaState::Started => Err(TransitionError::UnexpectedState {
                event,
                state: saga.state,
            }),
        },

        EventType::PaymentProcessed => match saga.state {
            SagaState::PaymentProcessed => Ok(Transition::Applied(TransitionOutcome {
                saga_state: SagaState::Completed,
                run_status: RunStatus::Completed,
                step: 3,
                saga_error: None,
                order_status: Some(OrderStatus::Completed),
                follow_up: None,
            })),
            SagaState::Completed => Ok(Transition::Duplicate),
            // A PaymentProcessed event for a saga on the compensation
            // chain (or one that never reached payment) is a protocol
            // violation: the compensation chain never re-enters forward
            // states.
            _ => Err(TransitionError::UnexpectedState {
                event,
                state: saga.state,
            }),
        },

        EventType::CompensateReleaseInventory => match saga.state {
            // Simulated release: the saga stays Compensating and hands
            // off to the cancel step.
            SagaState::Compensating => Ok(Transition::Applied(TransitionOutcome {
                saga_state: SagaState::Compensating,
                run_status: RunStatus::Failed,
                step: saga.step,
                saga_error: None,
                order_status: None,
                follow_up: Some(EventType::CompensateCancelOrder),
            })),
            SagaState::Failed => Ok(Transition::Duplicate),
            _ => Err(TransitionError::UnexpectedState {
                event,
                state: saga.state,
            }),
        },

        EventType::CompensateCancelOrder => match saga.state {
            SagaState::Compensating => Ok(Transition::Applied(TransitionOutcome {
                saga_state: SagaState::Failed,
                run_status: RunStatus::Failed,
                step: COMPENSATION_STEP,
                saga_error: None,
                order_status: Some(OrderStatus::Cancelled),
                follow_up: None,
            })),
            SagaState::Failed => Ok(Transition::Duplicate),
            _ => Err(TransitionError::UnexpectedState {
                event,
                state: saga.state,
            }),
        },
    }
}
