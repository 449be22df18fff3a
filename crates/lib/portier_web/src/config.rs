//! Client tier configuration.

use std::time::Duration;

/// Configuration for the web client tier.
#[derive(Clone, Debug)]
pub struct WebConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8080").
    pub bind_addr: String,
    /// Name of the session id cookie.
    pub cookie_name: String,
    /// Development mode: session cookies are not marked `Secure`.
    pub dev_mode: bool,
    /// Lifetime of a session record and its cookie.
    pub session_ttl: Duration,
    /// Base URL of the auth service.
    pub auth_url: String,
    /// Base URL of the downstream main service.
    pub main_url: String,
    /// Bound on each call to the auth service or the main service.
    pub upstream_timeout: Duration,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            cookie_name: "session_id".into(),
            dev_mode: true,
            session_ttl: Duration::from_secs(24 * 60 * 60),
            auth_url: "http://localhost:8081".into(),
            main_url: "http://localhost:8082".into(),
            upstream_timeout: Duration::from_millis(5000),
        }
    }
}

impl WebConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable              | Default                  |
    /// |-----------------------|--------------------------|
    /// | `BIND_ADDR`           | `127.0.0.1:8080`         |
    /// | `COOKIE_NAME`         | `session_id`             |
    /// | `DEV_MODE`            | `true`                   |
    /// | `SESSION_TTL_MIN`     | `1440`                   |
    /// | `AUTH_URL`            | `http://localhost:8081`  |
    /// | `MAIN_URL`            | `http://localhost:8082`  |
    /// | `UPSTREAM_TIMEOUT_MS` | `5000`                   |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_string("BIND_ADDR").unwrap_or(defaults.bind_addr),
            cookie_name: env_string("COOKIE_NAME").unwrap_or(defaults.cookie_name),
            dev_mode: env_string("DEV_MODE")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.dev_mode),
            session_ttl: env_u64("SESSION_TTL_MIN")
                .map(|m| Duration::from_secs(m * 60))
                .unwrap_or(defaults.session_ttl),
            auth_url: env_string("AUTH_URL").unwrap_or(defaults.auth_url),
            main_url: env_string("MAIN_URL").unwrap_or(defaults.main_url),
            upstream_timeout: env_u64("UPSTREAM_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.upstream_timeout),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key).and_then(|v| v.trim().parse().ok())
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
