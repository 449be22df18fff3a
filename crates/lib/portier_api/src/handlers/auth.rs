//! Login, polling, refresh, logout and access-token validation handlers.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{
    LoginRequest, LoginResponse, LoginStatusQuery, LoginStatusResponse, LogoutRequest,
    MessageResponse, RefreshRequest, TokenPair, ValidateResponse,
};
use crate::services::login::{self, LoginMethod, LoginStart};
use crate::services::refresh;

/// `POST /auth/login`: start a login and return a provider URL or a code.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let method: LoginMethod = body.method.parse()?;
    let resp = match login::start(&state, method, &body.login_token).await? {
        LoginStart::Redirect(url) => LoginResponse {
            auth_url: Some(url.into()),
            code: None,
        },
        LoginStart::Code(code) => LoginResponse {
            auth_url: None,
            code: Some(code),
        },
    };
    Ok(Json(resp))
}

/// `GET /auth/login/status`: poll a login attempt.
pub async fn login_status_handler(
    State(state): State<AppState>,
    Query(query): Query<LoginStatusQuery>,
) -> AppResult<Json<LoginStatusResponse>> {
    let token = query
        .login_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("login token is required".into()))?;
    let login = login::check_status(&state, &token).await?;
    Ok(Json(login.into()))
}

/// `POST /auth/refresh`: rotate a refresh token into a new pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let pair = refresh::refresh(&state, &body.refresh_token).await?;
    Ok(Json(pair))
}

/// `POST /auth/logout`: unlist the refresh token, or all of the user's.
pub async fn logout_handler(
    State(state): State<AppState>,
    Json(body): Json<LogoutRequest>,
) -> Json<MessageResponse> {
    refresh::logout(&state, &body.refresh_token, body.all).await;
    Json(MessageResponse {
        message: "Logged out successfully".into(),
    })
}

/// `POST /auth/validate`: verify a bearer access token.
pub async fn validate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ValidateResponse>> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Validation("authorization header is required".into()))?
        .to_str()
        .map_err(|_| AppError::Validation("invalid authorization header format".into()))?;
    let token = header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("invalid authorization header format".into()))?;

    let claims = state
        .tokens
        .validate_access(token)
        .map_err(|_| AppError::Unauthorized("invalid access token".into()))?;
    Ok(Json(ValidateResponse {
        valid: true,
        expired: claims.is_expired(),
        expires_at: claims.exp,
        permissions: claims.permissions,
    }))
}
