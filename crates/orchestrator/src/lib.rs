//! Outbox-driven saga orchestration.
//!
//! Two halves, sharing one store:
//!
//! - [`SagaWriter`] performs the client-facing mutation: order row, saga
//!   row, and initiating outbox event in one atomic commit.
//! - [`OutboxDispatcher`] polls the outbox for pending events, feeds each
//!   through the domain state machine, and commits every message's
//!   mutation set atomically — at-least-once delivery with idempotent
//!   handlers.
//!
//! A single dispatcher instance is active at a time; per-message claims
//! in the store keep a second instance from double-applying a transition
//! if one is ever started.

pub mod dispatcher;
pub mod error;
pub mod writer;

pub use dispatcher::{CycleStats, OutboxDispatcher};
pub use error::OrchestratorError;
pub use writer::SagaWriter;
