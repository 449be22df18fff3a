//! HTTP client of the auth service.

use std::time::Duration;

use async_trait::async_trait;
use portier_api::models::{
    ErrorResponse, LoginRequest, LoginResponse, LoginStatusResponse, LogoutRequest,
    RefreshRequest, TokenPair,
};
use portier_api::routes;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

/// Auth service call errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The auth service answered with a non-success status.
    #[error("auth service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("auth service unreachable: {0}")]
    Transport(String),
}

/// Operations the client tier needs from the auth service.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn start_login(&self, method: &str, login_token: &str)
    -> Result<LoginResponse, GatewayError>;

    async fn check_login(&self, login_token: &str) -> Result<LoginStatusResponse, GatewayError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, GatewayError>;

    async fn logout(&self, refresh_token: &str, all: bool) -> Result<(), GatewayError>;
}

/// [`AuthGateway`] over the auth service's JSON routes.
pub struct HttpAuthGateway {
    client: reqwest::Client,
    base: Url,
}

impl HttpAuthGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base = Url::parse(base_url)
            .map_err(|e| GatewayError::Transport(format!("invalid auth url {base_url}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("http client: {e}")))?;
        Ok(Self { client, base })
    }

    fn url(&self, path: &str) -> Result<Url, GatewayError> {
        self.base
            .join(path)
            .map_err(|e| GatewayError::Transport(format!("bad route {path}: {e}")))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, GatewayError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(rejection(status, resp).await);
    }
    resp.json::<T>()
        .await
        .map_err(|e| GatewayError::Transport(format!("response parse: {e}")))
}

async fn rejection(status: StatusCode, resp: reqwest::Response) -> GatewayError {
    let message = match resp.json::<ErrorResponse>().await {
        Ok(body) => body.message,
        Err(_) => status.canonical_reason().unwrap_or("").to_string(),
    };
    GatewayError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn start_login(
        &self,
        method: &str,
        login_token: &str,
    ) -> Result<LoginResponse, GatewayError> {
        let body = LoginRequest {
            method: method.to_string(),
            login_token: login_token.to_string(),
        };
        self.post_json(routes::POST_AUTH_LOGIN, &body).await
    }

    async fn check_login(&self, login_token: &str) -> Result<LoginStatusResponse, GatewayError> {
        let resp = self
            .client
            .get(self.url(routes::GET_AUTH_LOGIN_STATUS)?)
            .query(&[("login_token", login_token)])
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        decode(resp).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, GatewayError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.post_json(routes::POST_AUTH_REFRESH, &body).await
    }

    async fn logout(&self, refresh_token: &str, all: bool) -> Result<(), GatewayError> {
        let body = LogoutRequest {
            refresh_token: refresh_token.to_string(),
            all,
        };
        let _: serde_json::Value = self.post_json(routes::POST_AUTH_LOGOUT, &body).await?;
        Ok(())
    }
}
