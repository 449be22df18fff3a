//! Client session records and the cache holding them.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use portier_api::models::TokenPair;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Session cache unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Anonymous,
    Authorized,
}

/// What the client tier knows about one browser session.
///
/// Anonymous records hold the login token being polled; authorized ones
/// hold the current token pair and no login token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl SessionRecord {
    pub fn anonymous(login_token: &str) -> Self {
        Self {
            status: SessionStatus::Anonymous,
            login_token: Some(login_token.to_string()),
            access_token: None,
            refresh_token: None,
        }
    }

    /// Upgrade to authorized with `pair`, dropping the login token.
    pub fn authorize(&mut self, access_token: String, refresh_token: String) {
        self.status = SessionStatus::Authorized;
        self.login_token = None;
        self.access_token = Some(access_token);
        self.refresh_token = Some(refresh_token);
    }

    /// Replace the token pair after a refresh.
    pub fn rotate(&mut self, pair: TokenPair) {
        self.access_token = Some(pair.access_token);
        self.refresh_token = Some(pair.refresh_token);
    }

    pub fn is_authorized(&self) -> bool {
        self.status == SessionStatus::Authorized
    }
}

/// Key-value store with per-key expiry, keyed by session id.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<SessionRecord>, CacheError>;

    async fn set(&self, key: &str, record: &SessionRecord, ttl: Duration)
    -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// In-process [`SessionCache`].
#[derive(Debug, Default)]
pub struct MemorySessionCache {
    entries: DashMap<String, (SessionRecord, Instant)>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired records.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn get(&self, key: &str) -> Result<Option<SessionRecord>, CacheError> {
        let now = Instant::now();
        let live = self
            .entries
            .get(key)
            .filter(|entry| entry.1 > now)
            .map(|entry| entry.0.clone());
        if live.is_none() {
            self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        }
        Ok(live)
    }

    async fn set(
        &self,
        key: &str,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (record.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}
