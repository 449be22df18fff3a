//! One-time numeric codes for second-device login.
//!
//! A code is shown to the user on the device that started the login and
//! typed into an already signed-in device. Each code maps to one pending
//! login token and validates exactly once.

use std::sync::Arc;

use chrono::Duration;
use rand::{Rng, rng};
use thiserror::Error;
use tracing::debug;

use crate::rendezvous::{RendezvousStore, StoreError};

/// Default code lifetime: 1 minute.
pub const DEFAULT_CODE_TTL_SECS: i64 = 60;

/// Number of digits in a code.
pub const CODE_LENGTH: usize = 6;

/// Code channel errors.
#[derive(Debug, Error)]
pub enum CodeError {
    #[error("invalid or expired code")]
    InvalidOrExpired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issues and redeems one-time codes on top of the rendezvous store.
#[derive(Clone)]
pub struct CodeChannel {
    store: Arc<dyn RendezvousStore>,
    ttl: Duration,
}

impl CodeChannel {
    pub fn new(store: Arc<dyn RendezvousStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Issue a fresh code bound to `login_token`.
    ///
    /// Codes are drawn uniformly from `000000..=999999` with the thread-local
    /// CSPRNG. A collision with a live code overwrites it.
    pub async fn generate_code(&self, login_token: &str) -> Result<String, CodeError> {
        let code = random_code();
        self.store
            .create_auth_code(&code, login_token, self.ttl)
            .await?;
        debug!(login_token, "issued one-time code");
        Ok(code)
    }

    /// Redeem a code, returning the login token it was bound to.
    pub async fn validate_code(&self, code: &str) -> Result<String, CodeError> {
        if !is_well_formed(code) {
            return Err(CodeError::InvalidOrExpired);
        }
        self.store
            .take_auth_code(code)
            .await?
            .map(|entry| entry.login_token)
            .ok_or(CodeError::InvalidOrExpired)
    }
}

fn random_code() -> String {
    let n: u32 = rng().random_range(0..1_000_000);
    format!("{n:0width$}", width = CODE_LENGTH)
}

fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}
