//! Request and response bodies of the auth service.

use portier_core::models::{LoginState, LoginStatus};
use serde::{Deserialize, Serialize};

pub use portier_core::models::TokenPair;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// `POST /auth/login` body. `type` is `github`, `yandex` or `code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "type")]
    pub method: String,
    pub login_token: String,
}

/// Either a provider URL to visit or a one-time code to show.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginStatusQuery {
    pub login_token: Option<String>,
}

/// Poll result; the token fields are set only for `granted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginStatusResponse {
    pub status: LoginStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl From<LoginState> for LoginStatusResponse {
    fn from(state: LoginState) -> Self {
        let tokens = match state.status {
            LoginStatus::Granted => state.tokens,
            LoginStatus::Pending | LoginStatus::Denied => None,
        };
        let (access_token, refresh_token) = match tokens {
            Some(pair) => (Some(pair.access_token), Some(pair.refresh_token)),
            None => (None, None),
        };
        Self {
            status: state.status,
            access_token,
            refresh_token,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `POST /auth/validate` result. `expired` reports the advisory expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub permissions: Vec<String>,
    pub expires_at: i64,
    pub expired: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeCallbackRequest {
    pub code: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub status: LoginStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub service: String,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn pair() -> TokenPair {
        TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
            token_type: "Bearer".into(),
            expires_in: 60,
        }
    }

    #[test]
    fn tokens_only_surface_when_granted() {
        let mut state = LoginState::pending("t", Utc::now());
        state.tokens = Some(pair());
        let pending = serde_json::to_value(LoginStatusResponse::from(state.clone())).unwrap();
        assert_eq!(pending, serde_json::json!({"status": "pending"}));

        state.status = LoginStatus::Granted;
        let granted = serde_json::to_value(LoginStatusResponse::from(state)).unwrap();
        assert_eq!(granted["access_token"], "a");
        assert_eq!(granted["refresh_token"], "r");
    }

    #[test]
    fn login_request_reads_type_field() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"type":"code","login_token":"abc"}"#).unwrap();
        assert_eq!(req.method, "code");
        let logout: LogoutRequest = serde_json::from_str(r#"{"refresh_token":"x"}"#).unwrap();
        assert!(!logout.all);
    }
}
