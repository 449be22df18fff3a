//! Login rendezvous storage.
//!
//! A TTL-bounded keyed store of login states and one-time codes. Request
//! handlers start and complete logins through it while the eviction sweeper
//! purges whatever has expired. The trait lets the same orchestration run
//! against the in-process store or an external shared one.

pub mod memory;
pub mod sweeper;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::models::{AuthCode, LoginOutcome, LoginState, LoginStatus};

pub use memory::MemoryRendezvousStore;
pub use sweeper::{DEFAULT_SWEEP_INTERVAL, Sweeper};

/// Rendezvous store errors. The in-memory store never produces one.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Rendezvous store unavailable: {0}")]
    Unavailable(String),
}

/// Result of attempting to move a login state to a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The pending entry now holds the outcome.
    Applied,
    /// No live entry exists for the token (never created, expired or deleted).
    Missing,
    /// The entry already reached the given terminal status; nothing changed.
    AlreadyTerminal(LoginStatus),
}

/// Number of entries removed by one purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub login_states: usize,
    pub auth_codes: usize,
}

impl PurgeStats {
    pub fn total(&self) -> usize {
        self.login_states + self.auth_codes
    }
}

/// Keyed store of login states and auth codes with per-entry expiry.
///
/// Readers never observe an entry at or past its expiry instant.
#[async_trait]
pub trait RendezvousStore: Send + Sync {
    /// Create a pending entry expiring `ttl` from now, replacing any prior entry.
    async fn create_login_state(&self, token: &str, ttl: Duration)
    -> Result<LoginState, StoreError>;

    async fn get_login_state(&self, token: &str) -> Result<Option<LoginState>, StoreError>;

    /// Move a live pending entry to the outcome's terminal status.
    async fn update_login_state(
        &self,
        token: &str,
        outcome: LoginOutcome,
    ) -> Result<Transition, StoreError>;

    async fn delete_login_state(&self, token: &str) -> Result<(), StoreError>;

    /// Bind `code` to `login_token`, overwriting any colliding code.
    async fn create_auth_code(
        &self,
        code: &str,
        login_token: &str,
        ttl: Duration,
    ) -> Result<AuthCode, StoreError>;

    async fn get_auth_code(&self, code: &str) -> Result<Option<AuthCode>, StoreError>;

    /// Remove and return a live code in one step; concurrent takers of the
    /// same code see at most one `Some`.
    async fn take_auth_code(&self, code: &str) -> Result<Option<AuthCode>, StoreError>;

    async fn delete_auth_code(&self, code: &str) -> Result<(), StoreError>;

    /// Remove every entry whose expiry is at or before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeStats, StoreError>;
}
