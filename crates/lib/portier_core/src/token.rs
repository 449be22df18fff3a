//! JWT credential issuance and verification.
//!
//! Access and refresh tokens share one HMAC secret but carry disjoint claim
//! sets, so neither can be decoded as the other. Verification accepts only
//! the HMAC algorithm family.
//!
//! Refresh tokens issued by one service (and its clones) never repeat: the
//! expiry claim strictly increases per email.
//!
//! Expiry policy: a refresh token at or past its `exp` is rejected. An access
//! token's `exp` is returned to the caller and not enforced here; callers that
//! gate on it use [`AccessClaims::is_expired`](crate::models::AccessClaims).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use thiserror::Error;
use tracing::info;

use crate::models::{AccessClaims, RefreshClaims, TokenPair};

/// Default access token lifetime: 1 minute.
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 60;

/// Default refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token errors.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,

    #[error("token expired")]
    Expired,

    #[error("token encode: {0}")]
    Encode(String),
}

impl AccessClaims {
    /// Whether the access token is at or past its expiry.
    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

/// Signs and verifies access/refresh tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    /// Last refresh expiry issued per email.
    refresh_issued: Arc<Mutex<HashMap<String, i64>>>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
            refresh_issued: Arc::default(),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign an access token carrying only `permissions` and expiry.
    pub fn issue_access(&self, permissions: &[String]) -> Result<String, TokenError> {
        let claims = AccessClaims {
            permissions: permissions.to_vec(),
            exp: (Utc::now() + self.access_ttl).timestamp(),
        };
        self.sign(&claims)
    }

    /// Sign a refresh token carrying only `email` and expiry.
    pub fn issue_refresh(&self, email: &str) -> Result<String, TokenError> {
        let claims = RefreshClaims {
            email: email.to_string(),
            exp: self.next_refresh_exp(email),
        };
        self.sign(&claims)
    }

    fn next_refresh_exp(&self, email: &str) -> i64 {
        let floor = (Utc::now() + self.refresh_ttl).timestamp();
        let mut issued = self
            .refresh_issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        issued.retain(|_, last| *last >= floor);
        let exp = match issued.get(email) {
            Some(last) => last + 1,
            None => floor,
        };
        issued.insert(email.to_string(), exp);
        exp
    }

    /// Issue a fresh access/refresh pair.
    pub fn issue_pair(&self, email: &str, permissions: &[String]) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(permissions)?,
            refresh_token: self.issue_refresh(email)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Verify an access token's signature and claim shape.
    pub fn validate_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.decoding, &validation())
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }

    /// Verify a refresh token and return its email.
    pub fn validate_refresh(&self, token: &str) -> Result<String, TokenError> {
        let claims = decode::<RefreshClaims>(token, &self.decoding, &validation())
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        if claims.email.trim().is_empty() {
            return Err(TokenError::Invalid);
        }
        Ok(claims.email)
    }

    fn sign<T: serde::Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        encode(&Header::new(SIGNING_ALGORITHM), claims, &self.encoding)
            .map_err(|e| TokenError::Encode(format!("jwt encode: {e}")))
    }
}

/// HMAC-only validation with expiry checks left to the callers above.
fn validation() -> Validation {
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    validation.validate_exp = false;
    validation.leeway = 0;
    validation
}

/// Resolve the signing secret: env var `JWT_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret = generate_secret(64);
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Random alphanumeric secret of `len` characters.
pub fn generate_secret(len: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portier")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn service() -> TokenService {
        TokenService::new(
            SECRET,
            Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
        )
    }

    fn forge(alg: Algorithm, claims: serde_json::Value, secret: &[u8]) -> String {
        encode(&Header::new(alg), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn access_token_round_trips_permissions() {
        let svc = service();
        let perms = vec!["quest:read".to_string(), "course:add".to_string()];
        let token = svc.issue_access(&perms).unwrap();
        let claims = svc.validate_access(&token).unwrap();
        assert_eq!(claims.permissions, perms);
        assert!(!claims.is_expired());
    }

    #[test]
    fn refresh_token_yields_email() {
        let svc = service();
        let token = svc.issue_refresh("ada@example.com").unwrap();
        assert_eq!(svc.validate_refresh(&token).unwrap(), "ada@example.com");
    }

    fn refresh_exp(token: &str) -> i64 {
        decode::<RefreshClaims>(token, &DecodingKey::from_secret(SECRET), &validation())
            .unwrap()
            .claims
            .exp
    }

    #[test]
    fn refresh_tokens_for_one_email_never_repeat() {
        let svc = service();
        let shared = svc.clone();
        let first = svc.issue_refresh("ada@example.com").unwrap();
        let second = svc.issue_refresh("ada@example.com").unwrap();
        let third = shared.issue_refresh("ada@example.com").unwrap();
        assert_ne!(first, second);
        assert_ne!(second, third);
        assert!(refresh_exp(&first) < refresh_exp(&second));
        assert!(refresh_exp(&second) < refresh_exp(&third));
        assert_eq!(svc.validate_refresh(&third).unwrap(), "ada@example.com");

        let other = svc.issue_refresh("bob@example.com").unwrap();
        assert_eq!(svc.validate_refresh(&other).unwrap(), "bob@example.com");
    }

    #[test]
    fn claim_sets_are_not_interchangeable() {
        let svc = service();
        let pair = svc.issue_pair("ada@example.com", &["quest:read".into()]).unwrap();
        assert!(matches!(
            svc.validate_access(&pair.refresh_token),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            svc.validate_refresh(&pair.access_token),
            Err(TokenError::Invalid)
        ));
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, DEFAULT_ACCESS_TTL_SECS);
    }

    #[test]
    fn expired_refresh_token_is_rejected() {
        let token = forge(
            Algorithm::HS256,
            json!({"email": "ada@example.com", "exp": Utc::now().timestamp() - 10}),
            SECRET,
        );
        assert!(matches!(
            service().validate_refresh(&token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn expired_access_token_still_decodes() {
        let token = forge(
            Algorithm::HS256,
            json!({"permissions": ["quest:read"], "exp": Utc::now().timestamp() - 10}),
            SECRET,
        );
        let claims = service().validate_access(&token).unwrap();
        assert!(claims.is_expired());
    }

    #[test]
    fn empty_email_is_invalid() {
        let token = forge(
            Algorithm::HS256,
            json!({"email": "", "exp": Utc::now().timestamp() + 600}),
            SECRET,
        );
        assert!(matches!(
            service().validate_refresh(&token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn missing_email_is_invalid() {
        let token = forge(
            Algorithm::HS256,
            json!({"exp": Utc::now().timestamp() + 600}),
            SECRET,
        );
        assert!(matches!(
            service().validate_refresh(&token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = forge(
            Algorithm::HS256,
            json!({"permissions": [], "exp": Utc::now().timestamp() + 600}),
            b"other-secret",
        );
        assert!(matches!(
            service().validate_access(&token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn other_hmac_strengths_are_accepted() {
        let token = forge(
            Algorithm::HS512,
            json!({"permissions": ["quest:read"], "exp": Utc::now().timestamp() + 600}),
            SECRET,
        );
        assert!(service().validate_access(&token).is_ok());
    }

    #[test]
    fn unsigned_token_is_invalid() {
        // {"alg":"none","typ":"JWT"}.{"permissions":[],"exp":9999999999}.
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.\
                     eyJwZXJtaXNzaW9ucyI6W10sImV4cCI6OTk5OTk5OTk5OX0.";
        assert!(matches!(
            service().validate_access(token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn generated_secret_has_requested_length() {
        let secret = generate_secret(48);
        assert_eq!(secret.len(), 48);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
