//! In-memory user directory for tests and database-less development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DirectoryError, UserDirectory, hash_refresh_token};
use crate::models::user::DEFAULT_ROLE;
use crate::models::{RefreshTokenRecord, User};

/// Users keyed by email.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block or unblock a user. Returns `false` if the email is unknown.
    pub async fn set_blocked(&self, email: &str, blocked: bool) -> bool {
        self.modify(email, |user| user.is_blocked = blocked).await
    }

    /// Replace a user's role set. Returns `false` if the email is unknown.
    pub async fn set_roles(&self, email: &str, roles: &[&str]) -> bool {
        self.modify(email, |user| {
            user.roles = roles.iter().map(|r| r.to_string()).collect();
        })
        .await
    }

    async fn modify(&self, email: &str, f: impl FnOnce(&mut User)) -> bool {
        let mut users = self.users.write().await;
        match users.get_mut(email) {
            Some(user) => {
                f(user);
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn create(&self, email: &str, display_name: &str) -> Result<User, DirectoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(email) {
            return Err(DirectoryError::Duplicate(email.to_string()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7().to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            full_name: String::new(),
            roles: vec![DEFAULT_ROLE.to_string()],
            is_blocked: false,
            refresh_tokens: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        users.insert(email.to_string(), user.clone());
        Ok(user)
    }

    async fn add_refresh_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        let mut users = self.users.write().await;
        let user = users
            .values_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| DirectoryError::Store(format!("unknown user id {user_id}")))?;
        let now = Utc::now();
        user.refresh_tokens.push(RefreshTokenRecord {
            token_hash: hash_refresh_token(token),
            issued_at: now,
            expires_at,
        });
        user.updated_at = now;
        Ok(())
    }

    async fn remove_refresh_token(&self, token: &str) -> Result<(), DirectoryError> {
        let hash = hash_refresh_token(token);
        let mut users = self.users.write().await;
        for user in users.values_mut() {
            user.refresh_tokens.retain(|r| r.token_hash != hash);
        }
        Ok(())
    }

    async fn has_refresh_token(&self, user_id: &str, token: &str) -> Result<bool, DirectoryError> {
        let hash = hash_refresh_token(token);
        let now = Utc::now();
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| u.id == user_id)
            .flat_map(|u| u.refresh_tokens.iter())
            .any(|r| r.token_hash == hash && r.expires_at > now))
    }

    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        old: &str,
        new: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, DirectoryError> {
        let old_hash = hash_refresh_token(old);
        let mut users = self.users.write().await;
        let Some(user) = users.values_mut().find(|u| u.id == user_id) else {
            return Ok(false);
        };
        let before = user.refresh_tokens.len();
        user.refresh_tokens.retain(|r| r.token_hash != old_hash);
        if user.refresh_tokens.len() == before {
            return Ok(false);
        }
        let now = Utc::now();
        user.refresh_tokens.push(RefreshTokenRecord {
            token_hash: hash_refresh_token(new),
            issued_at: now,
            expires_at,
        });
        user.updated_at = now;
        Ok(true)
    }

    async fn clear_refresh_tokens(&self, user_id: &str) -> Result<(), DirectoryError> {
        let mut users = self.users.write().await;
        if let Some(user) = users.values_mut().find(|u| u.id == user_id) {
            user.refresh_tokens.clear();
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn later() -> DateTime<Utc> {
        Utc::now() + Duration::days(7)
    }

    #[tokio::test]
    async fn created_user_has_default_role() {
        let dir = MemoryUserDirectory::new();
        let user = dir.create("ada@example.com", "Ada").await.unwrap();
        assert_eq!(user.roles, vec!["student".to_string()]);
        assert!(!user.is_blocked);
        assert!(matches!(
            dir.create("ada@example.com", "Ada").await,
            Err(DirectoryError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn tokens_are_listed_per_user() {
        let dir = MemoryUserDirectory::new();
        let ada = dir.create("ada@example.com", "Ada").await.unwrap();
        let bob = dir.create("bob@example.com", "Bob").await.unwrap();
        dir.add_refresh_token(&ada.id, "tok-a", later()).await.unwrap();

        assert!(dir.has_refresh_token(&ada.id, "tok-a").await.unwrap());
        assert!(!dir.has_refresh_token(&bob.id, "tok-a").await.unwrap());

        let stored = dir.get_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(stored.refresh_tokens.len(), 1);
        assert_ne!(stored.refresh_tokens[0].token_hash, "tok-a");
    }

    #[tokio::test]
    async fn expired_record_is_not_listed() {
        let dir = MemoryUserDirectory::new();
        let ada = dir.create("ada@example.com", "Ada").await.unwrap();
        dir.add_refresh_token(&ada.id, "tok-a", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        assert!(!dir.has_refresh_token(&ada.id, "tok-a").await.unwrap());
    }

    #[tokio::test]
    async fn rotation_replaces_once() {
        let dir = MemoryUserDirectory::new();
        let ada = dir.create("ada@example.com", "Ada").await.unwrap();
        dir.add_refresh_token(&ada.id, "old", later()).await.unwrap();

        assert!(dir
            .rotate_refresh_token(&ada.id, "old", "new", later())
            .await
            .unwrap());
        assert!(!dir
            .rotate_refresh_token(&ada.id, "old", "newer", later())
            .await
            .unwrap());
        assert!(dir.has_refresh_token(&ada.id, "new").await.unwrap());
        assert!(!dir.has_refresh_token(&ada.id, "newer").await.unwrap());
    }

    #[tokio::test]
    async fn clear_and_remove_drop_tokens() {
        let dir = MemoryUserDirectory::new();
        let ada = dir.create("ada@example.com", "Ada").await.unwrap();
        dir.add_refresh_token(&ada.id, "one", later()).await.unwrap();
        dir.add_refresh_token(&ada.id, "two", later()).await.unwrap();

        dir.remove_refresh_token("one").await.unwrap();
        assert!(!dir.has_refresh_token(&ada.id, "one").await.unwrap());
        assert!(dir.has_refresh_token(&ada.id, "two").await.unwrap());

        dir.clear_refresh_tokens(&ada.id).await.unwrap();
        assert!(!dir.has_refresh_token(&ada.id, "two").await.unwrap());
    }

    #[tokio::test]
    async fn admin_helpers_update_user() {
        let dir = MemoryUserDirectory::new();
        dir.create("ada@example.com", "Ada").await.unwrap();
        assert!(dir.set_blocked("ada@example.com", true).await);
        assert!(dir.set_roles("ada@example.com", &["admin"]).await);
        assert!(!dir.set_blocked("nobody@example.com", true).await);

        let ada = dir.get_by_email("ada@example.com").await.unwrap().unwrap();
        assert!(ada.is_blocked);
        assert_eq!(ada.roles, vec!["admin".to_string()]);
    }
}
