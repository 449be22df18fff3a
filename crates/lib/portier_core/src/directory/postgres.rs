//! PostgreSQL-backed user directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{DirectoryError, UserDirectory, hash_refresh_token};
use crate::models::user::DEFAULT_ROLE;
use crate::models::{RefreshTokenRecord, User};

type UserRow = (
    String,
    String,
    String,
    String,
    Vec<String>,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
);

const USER_COLUMNS: &str =
    "id::text, email, display_name, full_name, roles, is_blocked, created_at, updated_at";

/// Directory over the `users` and `user_refresh_tokens` tables.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn refresh_tokens(&self, user_id: &str) -> Result<Vec<RefreshTokenRecord>, DirectoryError> {
        let rows = sqlx::query_as::<_, (String, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT token_hash, issued_at, expires_at FROM user_refresh_tokens \
             WHERE user_id = $1::uuid ORDER BY issued_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(token_hash, issued_at, expires_at)| RefreshTokenRecord {
                token_hash,
                issued_at,
                expires_at,
            })
            .collect())
    }
}

fn user_from_row(row: UserRow, refresh_tokens: Vec<RefreshTokenRecord>) -> User {
    let (id, email, display_name, full_name, roles, is_blocked, created_at, updated_at) = row;
    User {
        id,
        email,
        display_name,
        full_name,
        roles,
        is_blocked,
        refresh_tokens,
        created_at,
        updated_at,
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let tokens = self.refresh_tokens(&row.0).await?;
                Ok(Some(user_from_row(row, tokens)))
            }
            None => Ok(None),
        }
    }

    async fn create(&self, email: &str, display_name: &str) -> Result<User, DirectoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (email, display_name, roles) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(display_name)
        .bind(vec![DEFAULT_ROLE.to_string()])
        .fetch_one(&self.pool)
        .await?;
        Ok(user_from_row(row, Vec::new()))
    }

    async fn add_refresh_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        sqlx::query(
            "INSERT INTO user_refresh_tokens (token_hash, user_id, expires_at) \
             VALUES ($1, $2::uuid, $3) ON CONFLICT (token_hash) DO UPDATE \
             SET user_id = EXCLUDED.user_id, expires_at = EXCLUDED.expires_at",
        )
        .bind(hash_refresh_token(token))
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_refresh_token(&self, token: &str) -> Result<(), DirectoryError> {
        sqlx::query("DELETE FROM user_refresh_tokens WHERE token_hash = $1")
            .bind(hash_refresh_token(token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn has_refresh_token(&self, user_id: &str, token: &str) -> Result<bool, DirectoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_refresh_tokens \
             WHERE token_hash = $1 AND user_id = $2::uuid AND expires_at > now())",
        )
        .bind(hash_refresh_token(token))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        old: &str,
        new: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, DirectoryError> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query(
            "DELETE FROM user_refresh_tokens WHERE token_hash = $1 AND user_id = $2::uuid",
        )
        .bind(hash_refresh_token(old))
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if removed == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        sqlx::query(
            "INSERT INTO user_refresh_tokens (token_hash, user_id, expires_at) \
             VALUES ($1, $2::uuid, $3) ON CONFLICT (token_hash) DO UPDATE \
             SET expires_at = EXCLUDED.expires_at",
        )
        .bind(hash_refresh_token(new))
        .bind(user_id)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE users SET updated_at = now() WHERE id = $1::uuid")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn clear_refresh_tokens(&self, user_id: &str) -> Result<(), DirectoryError> {
        sqlx::query("DELETE FROM user_refresh_tokens WHERE user_id = $1::uuid")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
