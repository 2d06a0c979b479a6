//! The outbox dispatcher: the orchestrator's polling loop.
//!
//! Each cycle claims a bounded batch of pending messages in `occurred_at`
//! order, runs every message through the domain state machine, and commits
//! each message's mutation set as its own atomic unit. A handler failure
//! on one message never blocks the rest of the batch; the failed message
//! stays pending and retries on a later cycle.

use std::time::Duration;

use domain::{Transition, transition};
use outbox::{OutboxMessage, SagaStore, TransitionCommit};
use tokio::sync::watch;
use tracing::Instrument;

use crate::error::Result;

const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Outcome counts for one dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Messages claimed this cycle.
    pub claimed: usize,
    /// Transitions applied and committed.
    pub committed: usize,
    /// Re-delivered messages resolved as no-ops.
    pub duplicates: usize,
    /// Retryable failures; the messages stay pending.
    pub retried: usize,
    /// Terminal failures; the messages will never retry.
    pub dead: usize,
}

/// How one message's processing was resolved.
enum Disposition {
    Committed,
    Duplicate,
    Retry(String),
    Dead(String),
}

/// A per-message handler failure, tagged by whether a later cycle can
/// succeed where this one failed.
enum ProcessError {
    /// Transient: lookup or decode failed; retry on a later cycle.
    Retryable(String),
    /// Protocol violation: retrying can never make progress.
    Terminal(String),
}

/// Polls the outbox and drives sagas forward.
///
/// A single dispatcher runs at a time; within a cycle messages are
/// processed sequentially so the state machine observes its own prior
/// writes (a follow-up appended early in the batch is not claimed until
/// the next cycle, but a saga row updated early in the batch is visible
/// to later messages of the same batch).
pub struct OutboxDispatcher<S: SagaStore> {
    store: S,
    batch_size: usize,
    interval: Duration,
}

impl<S: SagaStore> OutboxDispatcher<S> {
    /// Creates a dispatcher with the default batch size (10) and poll
    /// interval (2s).
    pub fn new(store: S) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
            interval: DEFAULT_INTERVAL,
        }
    }

    /// Overrides the per-cycle batch bound.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Overrides the poll interval. A tunable, not a correctness
    /// parameter.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs the polling loop until the shutdown signal fires.
    ///
    /// The next cycle does not start until the previous one completes or
    /// the interval elapses, whichever is later. An in-flight cycle
    /// always finishes committing before the loop exits. Cycle-level
    /// errors are logged and the loop continues; availability wins over
    /// fail-fast.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            batch_size = self.batch_size,
            interval_ms = self.interval.as_millis() as u64,
            "outbox dispatcher started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(stats) if stats.claimed > 0 => {
                            tracing::debug!(?stats, "dispatch cycle finished");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "dispatch cycle failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("shutdown signal received, dispatcher stopping");
                    break;
                }
            }
        }
    }

    /// Executes one dispatch cycle.
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleStats> {
        let batch = self.store.claim_pending(self.batch_size).await?;
        let mut stats = CycleStats {
            claimed: batch.len(),
            ..CycleStats::default()
        };

        for message in &batch {
            let span = tracing::info_span!(
                "handle_event",
                event_type = %message.event_type,
                correlation_id = %message.correlation_id,
                saga_id = %message.saga_id,
                order_id = %message.order_id,
            );

            match self.process_message(message).instrument(span).await? {
                Disposition::Committed => {
                    stats.committed += 1;
                    metrics::counter!("outbox_messages_processed_total").increment(1);
                }
                Disposition::Duplicate => {
                    stats.duplicates += 1;
                    tracing::debug!("duplicate delivery resolved as no-op");
                    metrics::counter!("outbox_messages_duplicate_total").increment(1);
                }
                Disposition::Retry(reason) => {
                    stats.retried += 1;
                    tracing::warn!(%reason, attempt = message.attempt_count + 1, "message failed, will retry");
                    metrics::counter!("outbox_messages_retried_total").increment(1);
                }
                Disposition::Dead(reason) => {
                    stats.dead += 1;
                    tracing::error!(%reason, "message failed terminally");
                    metrics::counter!("outbox_messages_dead_total").increment(1);
                }
            }
        }

        Ok(stats)
    }

    /// Processes one claimed message; its mutation set is its own atomic
    /// commit. Only a store failure escapes as `Err`.
    async fn process_message(&self, message: &OutboxMessage) -> Result<Disposition> {
        // An event-type string outside the closed set can never make
        // progress: terminal, not retried.
        let event = match message.event_type() {
            Ok(event) => event,
            Err(err) => {
                let reason = err.to_string();
                self.store.mark_processed(message.id, Some(&reason)).await?;
                return Ok(Disposition::Dead(reason));
            }
        };

        match self.evaluate(message, event).await {
            Ok(Some(commit)) => {
                self.store.commit_transition(commit).await?;
                Ok(Disposition::Committed)
            }
            Ok(None) => {
                self.store.mark_processed(message.id, None).await?;
                Ok(Disposition::Duplicate)
            }
            Err(ProcessError::Retryable(reason)) => {
                self.store.record_failure(message.id, &reason).await?;
                Ok(Disposition::Retry(reason))
            }
            Err(ProcessError::Terminal(reason)) => {
                self.store.mark_processed(message.id, Some(&reason)).await?;
                Ok(Disposition::Dead(reason))
            }
        }
    }

    /// Decodes the message, loads the saga and order, and runs the state
    /// machine. Returns the mutation set to commit, or `None` for a
    /// duplicate delivery.
    async fn evaluate(
        &self,
        message: &OutboxMessage,
        event: domain::EventType,
    ) -> std::result::Result<Option<TransitionCommit>, ProcessError> {
        let payload = message
            .decode_payload()
            .map_err(|e| ProcessError::Retryable(format!("payload decode failed: {e}")))?;

        let saga = self
            .store
            .get_saga(payload.saga_id)
            .await
            .map_err(|e| ProcessError::Retryable(e.to_string()))?
            .ok_or_else(|| ProcessError::Retryable(format!("saga {} not found", payload.saga_id)))?;

        let order = self
            .store
            .get_order(payload.order_id)
            .await
            .map_err(|e| ProcessError::Retryable(e.to_string()))?
            .ok_or_else(|| {
                ProcessError::Retryable(format!("order {} not found", payload.order_id))
            })?;

        let outcome = match transition(&saga, event, &order) {
            Ok(Transition::Applied(outcome)) => outcome,
            Ok(Transition::Duplicate) => return Ok(None),
            Err(e) => return Err(ProcessError::Terminal(e.to_string())),
        };

        let mut updated_saga = saga;
        updated_saga.state = outcome.saga_state;
        updated_saga.status = outcome.run_status;
        updated_saga.step = outcome.step;
        updated_saga.updated_at = chrono::Utc::now();
        if let Some(error) = outcome.saga_error {
            updated_saga.last_error = Some(error);
        }

        let updated_order = outcome.order_status.map(|status| {
            let mut updated = order;
            updated.status = status;
            updated
        });

        let follow_up = match outcome.follow_up {
            Some(event_type) => Some(
                OutboxMessage::new(
                    event_type,
                    payload.order_id,
                    payload.saga_id,
                    message.correlation_id.clone(),
                )
                .map_err(|e| ProcessError::Retryable(format!("follow-up encode failed: {e}")))?,
            ),
            None => None,
        };

        Ok(Some(TransitionCommit {
            message_id: message.id,
            saga: updated_saga,
            order: updated_order,
            follow_up,
        }))
    }
}
