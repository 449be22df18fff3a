//! Rendezvous entries: login states and one-time codes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::token::TokenPair;

/// Status of a login attempt. `Granted` and `Denied` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginStatus {
    Pending,
    Granted,
    Denied,
}

impl LoginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginStatus::Pending => "pending",
            LoginStatus::Granted => "granted",
            LoginStatus::Denied => "denied",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoginStatus::Pending)
    }
}

impl fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome written by the completion path.
///
/// A grant always carries its token pair and a denial never does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Granted(TokenPair),
    Denied,
}

impl LoginOutcome {
    pub fn status(&self) -> LoginStatus {
        match self {
            LoginOutcome::Granted(_) => LoginStatus::Granted,
            LoginOutcome::Denied => LoginStatus::Denied,
        }
    }
}

/// One login attempt, keyed by the caller-chosen login token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginState {
    pub token: String,
    pub status: LoginStatus,
    pub expires_at: DateTime<Utc>,
    /// Present only while `status` is `Granted`.
    pub tokens: Option<TokenPair>,
}

impl LoginState {
    pub fn pending(token: &str, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.to_string(),
            status: LoginStatus::Pending,
            expires_at,
            tokens: None,
        }
    }

    /// An entry at or past its expiry instant behaves as absent.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Short numeric code bound to a pending login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCode {
    pub code: String,
    pub login_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
