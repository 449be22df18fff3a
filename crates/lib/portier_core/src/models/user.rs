//! Directory-owned user records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role assigned to accounts created on first login.
pub const DEFAULT_ROLE: &str = "student";

/// Domain user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub full_name: String,
    pub roles: Vec<String>,
    pub is_blocked: bool,
    pub refresh_tokens: Vec<RefreshTokenRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A currently valid refresh token, stored as its SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Normalized identity returned by a login channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub display_name: String,
}

impl Identity {
    /// Trims both fields and lowercases the email.
    pub fn normalized(email: &str, display_name: &str) -> Self {
        Self {
            email: email.trim().to_lowercase(),
            display_name: display_name.trim().to_string(),
        }
    }
}
