//! Client tier error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use portier_api::models::ErrorResponse;
use thiserror::Error;
use tracing::error;

use crate::gateway::GatewayError;
use crate::session::CacheError;

pub type WebResult<T> = Result<T, WebError>;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            WebError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.clone()),
            WebError::Gateway(GatewayError::Rejected { status, message }) => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                "auth_rejected",
                message.clone(),
            ),
            WebError::Gateway(e) => {
                error!(error = %e, "auth service call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "bad_gateway",
                    "Auth service unavailable".to_string(),
                )
            }
            WebError::Cache(e) => {
                error!(error = %e, "session cache failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });
        (status, body).into_response()
    }
}
