//! Correlation-id propagation middleware.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use common::CorrelationId;

/// Header carrying the correlation id across service boundaries.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Reads the correlation id from the incoming request or generates one,
/// makes it available to handlers via request extensions, and echoes it
/// on the response so callers can trace the request end to end.
pub async fn propagate_correlation_id(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(CorrelationId::new)
        .unwrap_or_else(CorrelationId::generate);

    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}
