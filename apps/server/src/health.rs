//! Liveness endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::info;

#[derive(Clone)]
struct HealthState {
    started: Instant,
}

/// Serve `GET /health` until the process exits.
pub async fn serve(port: u16) -> Result<(), std::io::Error> {
    let state = HealthState {
        started: Instant::now(),
    };
    let app = Router::new().route("/health", get(health)).with_state(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "liveness endpoint listening");
    axum::serve(listener, app).await
}

async fn health(State(state): State<HealthState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.started.elapsed().as_secs(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_health_reports_ok() {
        let state = HealthState {
            started: Instant::now(),
        };
        let Json(body) = health(State(state)).await;
        assert_eq!(body["status"], "ok");
        assert!(body["uptime_secs"].is_u64());
    }
}
