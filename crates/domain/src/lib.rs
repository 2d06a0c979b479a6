//! Domain layer for the outbox-driven saga orchestrator.
//!
//! Contains the business entities (orders), the saga progress record, the
//! closed set of domain event types, and the pure transition function that
//! maps (saga state, event, order snapshot) to the next state of the world.
//!
//! Nothing in this crate touches storage; the orchestrator applies the
//! outcomes this crate computes.

pub mod error;
pub mod event;
pub mod order;
pub mod saga;
pub mod transition;

pub use error::{DomainError, TransitionError};
pub use event::{EventPayload, EventType};
pub use order::{Order, OrderStatus};
pub use saga::{RunStatus, SagaInstance, SagaState};
pub use transition::{COMPENSATION_STEP, PAYMENT_LIMIT, Transition, TransitionOutcome, transition};
