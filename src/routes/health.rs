use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/live", get(live))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    dialect: &'static str,
    credentials: usize,
    uptime: u64,
    timestamp: String,
}

async fn health(State(state): State<AppState>) -> Response {
    let ok = match state.db().ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "health check database ping failed");
            false
        }
    };

    let response = HealthResponse {
        status: if ok { "ok" } else { "degraded" },
        database: if ok { "connected" } else { "disconnected" },
        dialect: state.db().dialect().as_str(),
        credentials: state.assistant().invoker().pool().len(),
        uptime: state.uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    let status_code = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response)).into_response()
}

// Process liveness only; never touches the database.
async fn live() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "alive" }))
}
