//! Calls to the downstream main service on behalf of an authorized session.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use url::Url;

use crate::gateway::GatewayError;

/// Status and body of a downstream reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownstreamResponse {
    pub status: u16,
    pub body: Bytes,
}

impl DownstreamResponse {
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

#[async_trait]
pub trait Downstream: Send + Sync {
    async fn call(
        &self,
        method: Method,
        path: &str,
        access_token: &str,
        body: Bytes,
    ) -> Result<DownstreamResponse, GatewayError>;
}

/// [`Downstream`] forwarding over HTTP with a bearer access token.
pub struct HttpDownstream {
    client: reqwest::Client,
    base: Url,
}

impl HttpDownstream {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base = Url::parse(base_url)
            .map_err(|e| GatewayError::Transport(format!("invalid main url {base_url}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("http client: {e}")))?;
        Ok(Self { client, base })
    }
}

#[async_trait]
impl Downstream for HttpDownstream {
    async fn call(
        &self,
        method: Method,
        path: &str,
        access_token: &str,
        body: Bytes,
    ) -> Result<DownstreamResponse, GatewayError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| GatewayError::Transport(format!("bad path {path}: {e}")))?;
        let mut req = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {access_token}"));
        if !body.is_empty() {
            req = req.header(CONTENT_TYPE, "application/json").body(body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(DownstreamResponse { status, body })
    }
}
