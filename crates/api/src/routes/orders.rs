//! Order creation and saga timeline endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Extension;
use chrono::{DateTime, Utc};
use common::{CorrelationId, Money, SagaId};
use orchestrator::SagaWriter;
use outbox::SagaStore;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: SagaStore> {
    pub writer: SagaWriter<S>,
    pub store: S,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_name: String,
    pub amount_cents: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub saga_id: String,
}

#[derive(Serialize)]
pub struct SagaSnapshot {
    pub saga_id: String,
    pub order_id: String,
    pub state: String,
    pub step: i32,
    pub status: String,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct TimelineEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub last_error: Option<String>,
}

#[derive(Serialize)]
pub struct TimelineResponse {
    pub saga: SagaSnapshot,
    pub events: Vec<TimelineEvent>,
}

// -- Handlers --

/// POST /orders — create an order and start its saga.
#[tracing::instrument(skip(state, req, correlation_id), fields(correlation_id = %correlation_id))]
pub async fn create<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(correlation_id): Extension<CorrelationId>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), ApiError> {
    if req.customer_name.trim().is_empty() {
        return Err(ApiError::BadRequest("customer_name is required".to_string()));
    }
    if req.amount_cents <= 0 {
        return Err(ApiError::BadRequest(
            "amount_cents must be positive".to_string(),
        ));
    }

    let (order_id, saga_id) = state
        .writer
        .create_saga(
            req.customer_name.trim(),
            Money::from_cents(req.amount_cents),
            correlation_id,
        )
        .await?;

    metrics::counter!("orders_created_total").increment(1);

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order_id: order_id.to_string(),
            saga_id: saga_id.to_string(),
        }),
    ))
}

/// GET /sagas/:id/timeline — saga snapshot plus its event audit trail.
#[tracing::instrument(skip(state))]
pub async fn timeline<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<TimelineResponse>, ApiError> {
    let saga_id = parse_saga_id(&id)?;

    let saga = state
        .store
        .get_saga(saga_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Saga {id} not found")))?;

    let events = state
        .store
        .events_for_saga(saga_id)
        .await?
        .into_iter()
        .map(|event| TimelineEvent {
            event_type: event.event_type,
            occurred_at: event.occurred_at,
            processed_at: event.processed_at,
            attempt_count: event.attempt_count,
            last_error: event.last_error,
        })
        .collect();

    Ok(Json(TimelineResponse {
        saga: SagaSnapshot {
            saga_id: saga.id.to_string(),
            order_id: saga.order_id.to_string(),
            state: saga.state.to_string(),
            step: saga.step,
            status: saga.status.to_string(),
            last_error: saga.last_error,
            created_at: saga.created_at,
            updated_at: saga.updated_at,
        },
        events,
    }))
}

fn parse_saga_id(id: &str) -> Result<SagaId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid saga id: {e}")))?;
    Ok(SagaId::from_uuid(uuid))
}
