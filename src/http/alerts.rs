use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::db::repos::alerts as alert_repo;

use super::{error_response, AppState};

/// GET /api/alerts/user/{user_id} — active first, priority then recency.
pub async fn list_for_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match alert_repo::get_for_user(&state.pool, &user_id) {
        Ok(alerts) => (StatusCode::OK, Json(serde_json::json!({ "alerts": alerts }))),
        Err(e) => error_response(e),
    }
}

/// POST /api/alerts/{id}/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match alert_repo::mark_read(&state.pool, &id) {
        Ok(alert) => (StatusCode::OK, Json(serde_json::json!({ "alert": alert }))),
        Err(e) => error_response(e),
    }
}

/// POST /api/alerts/{id}/actioned
pub async fn mark_actioned(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match alert_repo::mark_actioned(&state.pool, &id) {
        Ok(alert) => (StatusCode::OK, Json(serde_json::json!({ "alert": alert }))),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/alerts/{id}
pub async fn delete_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match alert_repo::delete(&state.pool, &id) {
        Ok(deleted) => (StatusCode::OK, Json(serde_json::json!({ "deleted": deleted }))),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct ClearQuery {
    pub user_id: Option<String>,
}

/// DELETE /api/alerts[?user_id=] — bulk admin clear.
pub async fn clear(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClearQuery>,
) -> impl IntoResponse {
    match alert_repo::clear(&state.pool, query.user_id.as_deref()) {
        Ok(n) => (StatusCode::OK, Json(serde_json::json!({ "deleted": n }))),
        Err(e) => error_response(e),
    }
}
