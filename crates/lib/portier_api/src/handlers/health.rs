//! Liveness with a user-directory reachability check.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use tracing::warn;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::HealthResponse;

/// `GET /health`: 200 when the directory answers, 503 otherwise.
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    state.directory.ping().await.map_err(|e| {
        warn!(error = %e, "directory ping failed");
        AppError::Unavailable("user directory unreachable".into())
    })?;
    Ok(Json(HealthResponse {
        status: "healthy".into(),
        timestamp: Utc::now().timestamp(),
        service: "portier-auth".into(),
    }))
}
