//! One-time code submission.

use axum::Json;
use axum::extract::State;
use portier_core::models::LoginStatus;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{CodeCallbackRequest, CompletionResponse};
use crate::services::login;

/// `POST /auth/code/callback`: complete the login bound to a code.
pub async fn code_callback_handler(
    State(state): State<AppState>,
    Json(body): Json<CodeCallbackRequest>,
) -> AppResult<Json<CompletionResponse>> {
    login::detached(async move {
        login::complete_with_code(&state, &body.code, &body.refresh_token).await
    })
    .await?;

    Ok(Json(CompletionResponse {
        status: LoginStatus::Granted,
    }))
}
