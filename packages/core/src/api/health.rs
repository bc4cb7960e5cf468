use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use super::OpsState;

/// Liveness plus a database ping. Reports 503 while SQLite is unreachable.
pub async fn health(State(state): State<Arc<OpsState>>) -> impl IntoResponse {
    let (status, body) = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, "ok"),
        Err(err) => {
            tracing::warn!("Health check failed: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    };

    (
        status,
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        body,
    )
}

/// Prometheus text exposition of every registered metric.
pub async fn metrics(State(state): State<Arc<OpsState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )],
            Body::from(body),
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Failed to render metrics: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics error").into_response()
        }
    }
}
