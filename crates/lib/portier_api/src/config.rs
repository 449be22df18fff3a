//! Auth service configuration.

use std::time::Duration as StdDuration;

use chrono::Duration;
use portier_core::code::DEFAULT_CODE_TTL_SECS;
use portier_core::identity::{Provider, ProviderConfig};
use portier_core::token::{DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS, resolve_jwt_secret};

/// Default lifetime of a pending login: 5 minutes.
pub const DEFAULT_LOGIN_TTL_SECS: i64 = 5 * 60;

/// OAuth client registration for one provider.
#[derive(Clone, Debug)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl ProviderCredentials {
    /// Reads `<PREFIX>_CLIENT_ID`, `<PREFIX>_CLIENT_SECRET` and
    /// `<PREFIX>_REDIRECT_URL`; `None` unless the client id is set.
    fn from_env(prefix: &str) -> Option<Self> {
        let client_id = env_string(&format!("{prefix}_CLIENT_ID"))?;
        Some(Self {
            client_id,
            client_secret: env_string(&format!("{prefix}_CLIENT_SECRET")).unwrap_or_default(),
            redirect_url: env_string(&format!("{prefix}_REDIRECT_URL")).unwrap_or_default(),
        })
    }

    /// Endpoint set for `provider` with these credentials.
    pub fn provider_config(&self, provider: Provider) -> ProviderConfig {
        match provider {
            Provider::Github => {
                ProviderConfig::github(&self.client_id, &self.client_secret, &self.redirect_url)
            }
            Provider::Yandex => {
                ProviderConfig::yandex(&self.client_id, &self.client_secret, &self.redirect_url)
            }
        }
    }
}

/// Configuration for the auth service.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8081").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    pub login_token_ttl: Duration,
    pub auth_code_ttl: Duration,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub sweep_interval: StdDuration,
    /// Bound on each user-directory call.
    pub directory_timeout: StdDuration,
    pub github: Option<ProviderCredentials>,
    pub yandex: Option<ProviderCredentials>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8081".into(),
            pg_connection_url: "postgres://localhost:5432/portier".into(),
            jwt_secret: String::new(),
            login_token_ttl: Duration::seconds(DEFAULT_LOGIN_TTL_SECS),
            auth_code_ttl: Duration::seconds(DEFAULT_CODE_TTL_SECS),
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_token_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
            sweep_interval: StdDuration::from_secs(300),
            directory_timeout: StdDuration::from_millis(5000),
            github: None,
            yandex: None,
        }
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                 | Default                               |
    /// |--------------------------|---------------------------------------|
    /// | `BIND_ADDR`              | `127.0.0.1:8081`                      |
    /// | `DATABASE_URL`           | `postgres://localhost:5432/portier`   |
    /// | `JWT_SECRET`             | generated & persisted to file         |
    /// | `LOGIN_TOKEN_TTL_SECS`   | `300`                                 |
    /// | `AUTH_CODE_TTL_SECS`     | `60`                                  |
    /// | `ACCESS_TOKEN_TTL_SECS`  | `60`                                  |
    /// | `REFRESH_TOKEN_TTL_SECS` | `604800`                              |
    /// | `SWEEP_INTERVAL_SECS`    | `300`                                 |
    /// | `DIRECTORY_TIMEOUT_MS`   | `5000`                                |
    /// | `GITHUB_*`, `YANDEX_*`   | unset: provider disabled              |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_string("BIND_ADDR").unwrap_or(defaults.bind_addr),
            pg_connection_url: env_string("DATABASE_URL").unwrap_or(defaults.pg_connection_url),
            jwt_secret: resolve_jwt_secret(),
            login_token_ttl: env_secs("LOGIN_TOKEN_TTL_SECS").unwrap_or(defaults.login_token_ttl),
            auth_code_ttl: env_secs("AUTH_CODE_TTL_SECS").unwrap_or(defaults.auth_code_ttl),
            access_token_ttl: env_secs("ACCESS_TOKEN_TTL_SECS")
                .unwrap_or(defaults.access_token_ttl),
            refresh_token_ttl: env_secs("REFRESH_TOKEN_TTL_SECS")
                .unwrap_or(defaults.refresh_token_ttl),
            sweep_interval: env_u64("SWEEP_INTERVAL_SECS")
                .map(StdDuration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            directory_timeout: env_u64("DIRECTORY_TIMEOUT_MS")
                .map(StdDuration::from_millis)
                .unwrap_or(defaults.directory_timeout),
            github: ProviderCredentials::from_env("GITHUB"),
            yandex: ProviderCredentials::from_env("YANDEX"),
        }
    }

    /// Credentials of every configured provider.
    pub fn providers(&self) -> Vec<(Provider, &ProviderCredentials)> {
        [
            (Provider::Github, self.github.as_ref()),
            (Provider::Yandex, self.yandex.as_ref()),
        ]
        .into_iter()
        .filter_map(|(p, c)| c.map(|c| (p, c)))
        .collect()
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key).and_then(|v| v.trim().parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_u64(key).and_then(|s| i64::try_from(s).ok()).map(Duration::seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ApiConfig::default();
        assert_eq!(config.login_token_ttl, Duration::minutes(5));
        assert_eq!(config.auth_code_ttl, Duration::minutes(1));
        assert_eq!(config.access_token_ttl, Duration::minutes(1));
        assert_eq!(config.refresh_token_ttl, Duration::days(7));
        assert_eq!(config.sweep_interval, StdDuration::from_secs(300));
        assert!(config.providers().is_empty());
    }

    #[test]
    fn configured_providers_are_listed() {
        let config = ApiConfig {
            yandex: Some(ProviderCredentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
                redirect_url: "http://localhost/cb".into(),
            }),
            ..ApiConfig::default()
        };
        let providers = config.providers();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].0, Provider::Yandex);
        let endpoints = providers[0].1.provider_config(Provider::Yandex);
        assert_eq!(endpoints.userinfo_auth_scheme, "OAuth");
    }
}
