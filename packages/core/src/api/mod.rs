//! Operational HTTP surface: `/health` and `/metrics`.

pub mod health;

use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::SqlitePool;

use crate::metrics::AppMetrics;

pub struct OpsState {
    pub metrics: Arc<AppMetrics>,
    pub pool: SqlitePool,
}

pub fn ops_router(metrics: Arc<AppMetrics>, pool: SqlitePool) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .with_state(Arc::new(OpsState { metrics, pool }))
}
