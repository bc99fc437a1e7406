pub mod admin;
pub mod alerts;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use crate::db::DbPool;
use crate::engine::scheduler::AlertScheduler;
use crate::error::AppError;

/// Shared state for the HTTP surface.
pub struct AppState {
    pub pool: DbPool,
    pub scheduler: Arc<AlertScheduler>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/alerts/user/{user_id}", get(alerts::list_for_user))
        .route("/api/alerts/{id}/read", post(alerts::mark_read))
        .route("/api/alerts/{id}/actioned", post(alerts::mark_actioned))
        .route("/api/alerts/{id}", delete(alerts::delete_one))
        .route("/api/alerts", delete(alerts::clear))
        .route("/api/scheduler/start", post(admin::start))
        .route("/api/scheduler/stop", post(admin::stop))
        .route("/api/scheduler/run-once", post(admin::run_once))
        .route("/api/scheduler/status", get(admin::status))
        .route("/api/scheduler/tick", post(admin::tick))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server. Returns once the listener shuts down.
pub async fn serve(
    state: Arc<AppState>,
    port: u16,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP surface listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            tracing::info!("HTTP surface shutting down");
        })
        .await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": "ledgerwatch" }))
}

/// Map an AppError onto an HTTP response in the `{error, kind}` shape.
pub(crate) fn error_response(err: AppError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Validation(_) | AppError::InvalidObligation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::to_value(&err).unwrap_or_default()))
}
