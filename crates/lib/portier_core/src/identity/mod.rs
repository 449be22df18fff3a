//! Identity provider exchange.
//!
//! Turns a provider authorization code into a normalized [`Identity`].

pub mod oauth;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::models::Identity;

pub use oauth::{OAuthExchange, ProviderConfig};

/// Supported third-party identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Github,
    Yandex,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Github, Provider::Yandex];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Github => "github",
            Provider::Yandex => "yandex",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(Provider::Github),
            "yandex" => Ok(Provider::Yandex),
            other => Err(ExchangeError::UnknownProvider(other.to_string())),
        }
    }
}

/// Exchange errors.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider not configured: {0}")]
    NotConfigured(Provider),

    #[error("exchange failed: {0}")]
    Failed(String),
}

/// Provider handshake collaborator.
#[async_trait]
pub trait IdentityExchange: Send + Sync {
    /// URL the user agent is sent to; `state` round-trips the login token.
    fn authorization_url(&self, provider: Provider, state: &str) -> Result<Url, ExchangeError>;

    /// Redeem an authorization code for the user's identity.
    async fn exchange(&self, provider: Provider, code: &str) -> Result<Identity, ExchangeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_round_trip() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>().unwrap(), provider);
        }
        assert!(matches!(
            "code".parse::<Provider>(),
            Err(ExchangeError::UnknownProvider(_))
        ));
    }
}
