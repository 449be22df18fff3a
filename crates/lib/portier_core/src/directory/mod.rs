//! External user directory.
//!
//! Users and their currently valid refresh tokens live outside the rendezvous
//! store. Refresh tokens are stored as SHA-256 digests, never in plaintext.

pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::User;

pub use memory::MemoryUserDirectory;
pub use postgres::PgUserDirectory;

/// Default bound on a single directory call.
pub const DEFAULT_DIRECTORY_TIMEOUT: Duration = Duration::from_secs(5);

/// Directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("User already exists: {0}")]
    Duplicate(String),

    #[error("Directory call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Directory error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for DirectoryError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DirectoryError::Duplicate(db.message().to_string())
            }
            _ => DirectoryError::Store(e.to_string()),
        }
    }
}

/// User and refresh-token persistence.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;

    /// Create a user with the default role set. Fails with
    /// [`DirectoryError::Duplicate`] if the email is taken.
    async fn create(&self, email: &str, display_name: &str) -> Result<User, DirectoryError>;

    async fn add_refresh_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DirectoryError>;

    async fn remove_refresh_token(&self, token: &str) -> Result<(), DirectoryError>;

    /// Whether `token` is listed for `user_id` and not past its recorded expiry.
    async fn has_refresh_token(&self, user_id: &str, token: &str) -> Result<bool, DirectoryError>;

    /// Replace `old` with `new` in one update. Returns `false` without adding
    /// `new` when `old` was no longer listed.
    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        old: &str,
        new: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, DirectoryError>;

    /// Drop every refresh token listed for `user_id`.
    async fn clear_refresh_tokens(&self, user_id: &str) -> Result<(), DirectoryError>;

    /// Reachability check for health reporting.
    async fn ping(&self) -> Result<(), DirectoryError>;
}

/// SHA-256 hash a refresh token for storage.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Look up a user by email, creating it on first sight.
///
/// A concurrent creator winning the unique-email race is resolved by reading
/// the winner's record.
pub async fn get_or_create(
    directory: &dyn UserDirectory,
    email: &str,
    display_name: &str,
) -> Result<User, DirectoryError> {
    if let Some(user) = directory.get_by_email(email).await? {
        return Ok(user);
    }
    match directory.create(email, display_name).await {
        Ok(user) => Ok(user),
        Err(DirectoryError::Duplicate(_)) => directory
            .get_by_email(email)
            .await?
            .ok_or_else(|| DirectoryError::Store(format!("user {email} vanished after create"))),
        Err(e) => Err(e),
    }
}

/// Wraps a directory so every call is bounded by a timeout.
pub struct TimeoutDirectory {
    inner: Arc<dyn UserDirectory>,
    limit: Duration,
}

impl TimeoutDirectory {
    pub fn new(inner: Arc<dyn UserDirectory>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, DirectoryError>> + Send,
    ) -> Result<T, DirectoryError> {
        tokio::time::timeout(self.limit, fut)
            .await
            .map_err(|_| DirectoryError::Timeout(self.limit))?
    }
}

#[async_trait]
impl UserDirectory for TimeoutDirectory {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        self.bounded(self.inner.get_by_email(email)).await
    }

    async fn create(&self, email: &str, display_name: &str) -> Result<User, DirectoryError> {
        self.bounded(self.inner.create(email, display_name)).await
    }

    async fn add_refresh_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        self.bounded(self.inner.add_refresh_token(user_id, token, expires_at))
            .await
    }

    async fn remove_refresh_token(&self, token: &str) -> Result<(), DirectoryError> {
        self.bounded(self.inner.remove_refresh_token(token)).await
    }

    async fn has_refresh_token(&self, user_id: &str, token: &str) -> Result<bool, DirectoryError> {
        self.bounded(self.inner.has_refresh_token(user_id, token))
            .await
    }

    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        old: &str,
        new: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, DirectoryError> {
        self.bounded(
            self.inner
                .rotate_refresh_token(user_id, old, new, expires_at),
        )
        .await
    }

    async fn clear_refresh_tokens(&self, user_id: &str) -> Result<(), DirectoryError> {
        self.bounded(self.inner.clear_refresh_tokens(user_id)).await
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        self.bounded(self.inner.ping()).await
    }
}
