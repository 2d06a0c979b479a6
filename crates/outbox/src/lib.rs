//! Transactional outbox store.
//!
//! The outbox and the business rows (orders, sagas) are two views of one
//! durable log: a single atomic commit covers a business mutation and the
//! outbox row that announces it. The [`SagaStore`] trait scopes every
//! mutation to one such logical commit; the in-memory implementation backs
//! tests and the default binary with the same guarantees a relational
//! store would provide.

pub mod error;
pub mod memory;
pub mod message;
pub mod store;

pub use error::{OutboxError, Result};
pub use memory::InMemorySagaStore;
pub use message::OutboxMessage;
pub use store::{MessageStream, SagaStore, TransitionCommit};
