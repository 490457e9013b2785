//! HTTP surface: Prometheus scrape endpoint and liveness probe.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/metrics` | Prometheus exposition of every registered metric |
//! | GET | `/healthz` | Liveness and registered monitor count |

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chainwatch_monitor::Registry;
use serde_json::json;

pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .with_state(registry)
}

/// Always 200 with the latest committed values, whatever state individual
/// monitors are in. Drain metrics are consumed by this read.
async fn metrics(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    let body = registry.render_prometheus().await;
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

async fn healthz(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "monitors": registry.len(),
    }))
}
