//! Identity provider callback.

use axum::Json;
use axum::extract::{Path, Query, State};
use portier_core::identity::Provider;
use portier_core::models::LoginStatus;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{CallbackQuery, CompletionResponse};
use crate::services::login;

/// `GET /auth/{provider}/callback`: complete the login named by `state`.
pub async fn provider_callback_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Json<CompletionResponse>> {
    let provider: Provider = provider
        .parse()
        .map_err(|_| AppError::NotFound(format!("unknown provider: {provider}")))?;
    let login_token = query.state.unwrap_or_default();

    login::detached(async move {
        login::complete_with_provider(
            &state,
            provider,
            &login_token,
            query.code.as_deref(),
            query.error.as_deref(),
        )
        .await
    })
    .await?;

    Ok(Json(CompletionResponse {
        status: LoginStatus::Granted,
    }))
}
