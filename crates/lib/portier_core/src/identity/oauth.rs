//! OAuth2 authorization-code exchange against a provider's token and
//! userinfo endpoints.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use url::Url;

use super::{ExchangeError, IdentityExchange, Provider};
use crate::models::Identity;

const EMAIL_FIELDS: &[&str] = &["email", "default_email"];
const NAME_FIELDS: &[&str] = &["name", "display_name", "real_name", "login"];

/// Endpoints and client credentials for one provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
    /// Scheme used when presenting the provider access token to the
    /// userinfo endpoint (`Bearer`, or `OAuth` for Yandex).
    pub userinfo_auth_scheme: String,
}

impl ProviderConfig {
    pub fn github(client_id: &str, client_secret: &str, redirect_url: &str) -> Self {
        Self {
            authorize_url: "https://github.com/login/oauth/authorize".into(),
            token_url: "https://github.com/login/oauth/access_token".into(),
            userinfo_url: "https://api.github.com/user".into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
            scopes: vec!["read:user".into(), "user:email".into()],
            userinfo_auth_scheme: "Bearer".into(),
        }
    }

    pub fn yandex(client_id: &str, client_secret: &str, redirect_url: &str) -> Self {
        Self {
            authorize_url: "https://oauth.yandex.ru/authorize".into(),
            token_url: "https://oauth.yandex.ru/token".into(),
            userinfo_url: "https://login.yandex.ru/info?format=json".into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
            scopes: vec!["login:email".into(), "login:info".into()],
            userinfo_auth_scheme: "OAuth".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// [`IdentityExchange`] over plain OAuth2 HTTP endpoints.
pub struct OAuthExchange {
    client: reqwest::Client,
    providers: HashMap<Provider, ProviderConfig>,
}

impl OAuthExchange {
    pub fn new(timeout: Duration) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::Failed(format!("http client: {e}")))?;
        Ok(Self {
            client,
            providers: HashMap::new(),
        })
    }

    /// Register (or replace) a provider.
    pub fn with_provider(mut self, provider: Provider, config: ProviderConfig) -> Self {
        self.providers.insert(provider, config);
        self
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider)
    }

    fn config(&self, provider: Provider) -> Result<&ProviderConfig, ExchangeError> {
        self.providers
            .get(&provider)
            .ok_or(ExchangeError::NotConfigured(provider))
    }

    async fn redeem_code(
        &self,
        config: &ProviderConfig,
        code: &str,
    ) -> Result<String, ExchangeError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", config.redirect_url.as_str()),
        ];

        let resp = self
            .client
            .post(&config.token_url)
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| ExchangeError::Failed(format!("token request: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ExchangeError::Failed(format!("token HTTP {status}: {body}")));
        }

        resp.json::<TokenResponse>()
            .await
            .map(|t| t.access_token)
            .map_err(|e| ExchangeError::Failed(format!("token response parse: {e}")))
    }

    async fn fetch_profile(
        &self,
        config: &ProviderConfig,
        access_token: &str,
    ) -> Result<serde_json::Value, ExchangeError> {
        let resp = self
            .client
            .get(&config.userinfo_url)
            .header(
                AUTHORIZATION,
                format!("{} {access_token}", config.userinfo_auth_scheme),
            )
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, "portier")
            .send()
            .await
            .map_err(|e| ExchangeError::Failed(format!("userinfo request: {e}")))?;

        if !resp.status().is_success() {
            return Err(ExchangeError::Failed(format!(
                "userinfo HTTP {}",
                resp.status()
            )));
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| ExchangeError::Failed(format!("userinfo parse: {e}")))
    }
}

#[async_trait]
impl IdentityExchange for OAuthExchange {
    fn authorization_url(&self, provider: Provider, state: &str) -> Result<Url, ExchangeError> {
        let config = self.config(provider)?;
        let mut url = Url::parse(&config.authorize_url)
            .map_err(|e| ExchangeError::Failed(format!("authorize url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &config.redirect_url)
            .append_pair("scope", &config.scopes.join(" "))
            .append_pair("state", state);
        Ok(url)
    }

    async fn exchange(&self, provider: Provider, code: &str) -> Result<Identity, ExchangeError> {
        let config = self.config(provider)?;
        let access_token = self.redeem_code(config, code).await?;
        let profile = self.fetch_profile(config, &access_token).await?;
        identity_from_profile(&profile)
    }
}

/// Pick email and display name out of a provider profile document.
pub fn identity_from_profile(profile: &serde_json::Value) -> Result<Identity, ExchangeError> {
    let first_of = |fields: &[&str]| {
        fields
            .iter()
            .filter_map(|f| profile.get(*f).and_then(|v| v.as_str()))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    };

    let email = first_of(EMAIL_FIELDS)
        .ok_or_else(|| ExchangeError::Failed("profile has no email".into()))?;
    let name = first_of(NAME_FIELDS).unwrap_or_default();
    Ok(Identity::normalized(&email, &name))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn exchange() -> OAuthExchange {
        OAuthExchange::new(Duration::from_secs(5))
            .unwrap()
            .with_provider(
                Provider::Github,
                ProviderConfig::github("cid", "secret", "http://localhost/cb"),
            )
    }

    #[test]
    fn authorization_url_carries_state() {
        let url = exchange()
            .authorization_url(Provider::Github, "login-123")
            .unwrap();
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["state"], "login-123");
        assert_eq!(pairs["client_id"], "cid");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(url.host_str(), Some("github.com"));
    }

    #[test]
    fn unconfigured_provider_is_rejected() {
        let ex = exchange();
        assert!(!ex.is_configured(Provider::Yandex));
        assert!(matches!(
            ex.authorization_url(Provider::Yandex, "s"),
            Err(ExchangeError::NotConfigured(Provider::Yandex))
        ));
    }

    #[test]
    fn profile_email_falls_back_to_default_email() {
        let id = identity_from_profile(&json!({
            "default_email": "  Ada@Example.COM ",
            "real_name": "Ada Lovelace",
        }))
        .unwrap();
        assert_eq!(id.email, "ada@example.com");
        assert_eq!(id.display_name, "Ada Lovelace");
    }

    #[test]
    fn profile_name_prefers_name_over_login() {
        let id = identity_from_profile(&json!({
            "email": "ada@example.com",
            "name": "",
            "login": "ada",
        }))
        .unwrap();
        assert_eq!(id.display_name, "ada");
    }

    #[test]
    fn profile_without_email_fails() {
        assert!(identity_from_profile(&json!({"login": "ada", "email": null})).is_err());
    }
}
