pub mod types;

pub use types::{CorrelationId, MessageId, Money, OrderId, SagaId};
