use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub interval_minutes: Option<u32>,
}

/// POST /api/scheduler/start — begin the periodic timer. The JSON body is
/// optional; an empty body starts with the configured interval.
pub async fn start(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let request: StartRequest = if body.is_empty() {
        StartRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": e.to_string(), "kind": "validation" })),
                );
            }
        }
    };

    let started = state.scheduler.start(request.interval_minutes);
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "started": started,
            "status": state.scheduler.status(),
        })),
    )
}

/// POST /api/scheduler/stop — cancel the timer; in-flight runs finish.
pub async fn stop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stopped = state.scheduler.stop();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "stopped": stopped,
            "status": state.scheduler.status(),
        })),
    )
}

/// POST /api/scheduler/run-once — administrative override. Bypasses the
/// rate-limit gate but still counts toward the daily cap.
pub async fn run_once(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.scheduler.run_once().await {
        Ok(stats) => (StatusCode::OK, Json(serde_json::json!({ "stats": stats }))),
        Err(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": msg, "kind": "evaluation" })),
        ),
    }
}

/// GET /api/scheduler/status
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.scheduler.status())
}

/// POST /api/scheduler/tick — the opportunistic smart-trigger path, called
/// from ordinary user traffic (e.g. dashboard load). Idempotent under
/// arbitrary call rates thanks to the gate.
pub async fn tick(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let outcome = state.scheduler.execute_if_due().await;
    if outcome.executed {
        if let Err(e) = state.scheduler.run_subscription_tasks_if_due() {
            tracing::error!("Daily subscription tasks failed: {e}");
        }
    }
    Json(outcome)
}
