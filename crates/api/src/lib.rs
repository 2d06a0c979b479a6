//! HTTP API server with observability for the saga system.
//!
//! Provides REST endpoints for creating orders and reading saga
//! timelines, with structured logging (tracing), correlation-id
//! propagation, and Prometheus metrics.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::SagaWriter;
use outbox::SagaStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: SagaStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/sagas/{id}/timeline", get(routes::orders::timeline::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            middleware::propagate_correlation_id,
        ))
}

/// Creates the default application state around a store.
pub fn create_default_state<S: SagaStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        writer: SagaWriter::new(store.clone()),
        store,
    })
}
