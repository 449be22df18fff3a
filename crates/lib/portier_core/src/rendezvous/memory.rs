//! In-process rendezvous store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::{PurgeStats, RendezvousStore, StoreError, Transition};
use crate::models::{AuthCode, LoginOutcome, LoginState};

#[derive(Debug, Default)]
struct Collections {
    login_states: HashMap<String, LoginState>,
    auth_codes: HashMap<String, AuthCode>,
}

/// Both collections sit behind one lock: reads share it, every mutation and
/// the sweeper's purge hold it exclusively.
#[derive(Debug, Default)]
pub struct MemoryRendezvousStore {
    inner: RwLock<Collections>,
}

impl MemoryRendezvousStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored `(login_states, auth_codes)`, expired ones included.
    pub async fn entry_counts(&self) -> (usize, usize) {
        let inner = self.inner.read().await;
        (inner.login_states.len(), inner.auth_codes.len())
    }
}

#[async_trait]
impl RendezvousStore for MemoryRendezvousStore {
    async fn create_login_state(
        &self,
        token: &str,
        ttl: Duration,
    ) -> Result<LoginState, StoreError> {
        let state = LoginState::pending(token, Utc::now() + ttl);
        let mut inner = self.inner.write().await;
        inner.login_states.insert(token.to_string(), state.clone());
        Ok(state)
    }

    async fn get_login_state(&self, token: &str) -> Result<Option<LoginState>, StoreError> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        Ok(inner
            .login_states
            .get(token)
            .filter(|state| !state.is_expired(now))
            .cloned())
    }

    async fn update_login_state(
        &self,
        token: &str,
        outcome: LoginOutcome,
    ) -> Result<Transition, StoreError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let Some(state) = inner.login_states.get_mut(token) else {
            return Ok(Transition::Missing);
        };
        if state.is_expired(now) {
            return Ok(Transition::Missing);
        }
        if state.status.is_terminal() {
            return Ok(Transition::AlreadyTerminal(state.status));
        }
        state.status = outcome.status();
        state.tokens = match outcome {
            LoginOutcome::Granted(pair) => Some(pair),
            LoginOutcome::Denied => None,
        };
        Ok(Transition::Applied)
    }

    async fn delete_login_state(&self, token: &str) -> Result<(), StoreError> {
        self.inner.write().await.login_states.remove(token);
        Ok(())
    }

    async fn create_auth_code(
        &self,
        code: &str,
        login_token: &str,
        ttl: Duration,
    ) -> Result<AuthCode, StoreError> {
        let entry = AuthCode {
            code: code.to_string(),
            login_token: login_token.to_string(),
            expires_at: Utc::now() + ttl,
        };
        let mut inner = self.inner.write().await;
        inner.auth_codes.insert(code.to_string(), entry.clone());
        Ok(entry)
    }

    async fn get_auth_code(&self, code: &str) -> Result<Option<AuthCode>, StoreError> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        Ok(inner
            .auth_codes
            .get(code)
            .filter(|entry| !entry.is_expired(now))
            .cloned())
    }

    async fn take_auth_code(&self, code: &str) -> Result<Option<AuthCode>, StoreError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        Ok(inner
            .auth_codes
            .remove(code)
            .filter(|entry| !entry.is_expired(now)))
    }

    async fn delete_auth_code(&self, code: &str) -> Result<(), StoreError> {
        self.inner.write().await.auth_codes.remove(code);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeStats, StoreError> {
        let mut inner = self.inner.write().await;
        let before = (inner.login_states.len(), inner.auth_codes.len());
        inner.login_states.retain(|_, state| !state.is_expired(now));
        inner.auth_codes.retain(|_, entry| !entry.is_expired(now));
        Ok(PurgeStats {
            login_states: before.0 - inner.login_states.len(),
            auth_codes: before.1 - inner.auth_codes.len(),
        })
    }
}
