//! Refresh-token rotation and revocation.

use chrono::Utc;
use portier_core::models::{TokenPair, User};
use portier_core::permissions;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};

/// Exchange a listed refresh token for a new pair, unlisting the old one.
///
/// A token that verifies but is no longer listed (already rotated or
/// revoked) is rejected like a forged one.
pub async fn refresh(state: &AppState, presented: &str) -> AppResult<TokenPair> {
    let user = listed_user(state, presented).await?;
    if user.is_blocked {
        return Err(AppError::Forbidden("user is blocked".into()));
    }

    let pair = issue_unlisted(state, &user).await?;
    let expires_at = Utc::now() + state.tokens.refresh_ttl();

    // Loses to a concurrent rotation of the same token.
    if !state
        .directory
        .rotate_refresh_token(&user.id, presented, &pair.refresh_token, expires_at)
        .await?
    {
        return Err(AppError::Unauthorized("refresh token not found".into()));
    }

    debug!(user_id = %user.id, "refresh token rotated");
    Ok(pair)
}

/// Issue a pair whose refresh token is not already listed for `user`.
///
/// Another issuer signing with the same secret can produce the same token
/// within one second; re-issuing moves the expiry forward until it differs.
pub(crate) async fn issue_unlisted(state: &AppState, user: &User) -> AppResult<TokenPair> {
    const MAX_REISSUES: usize = 8;

    let permissions = permissions::resolve(&user.roles);
    let mut pair = state.tokens.issue_pair(&user.email, &permissions)?;
    for _ in 0..MAX_REISSUES {
        if !state
            .directory
            .has_refresh_token(&user.id, &pair.refresh_token)
            .await?
        {
            return Ok(pair);
        }
        pair.refresh_token = state.tokens.issue_refresh(&user.email)?;
    }
    Err(AppError::Internal(format!(
        "no unique refresh token for user {}",
        user.id
    )))
}

/// Drop every refresh token listed for the token's user.
pub async fn revoke_all(state: &AppState, refresh_token: &str) -> AppResult<()> {
    let user = token_user(state, refresh_token).await?;
    state.directory.clear_refresh_tokens(&user.id).await?;
    info!(user_id = %user.id, "all refresh tokens revoked");
    Ok(())
}

/// Unlist one refresh token, or all of the user's with `all`.
///
/// Logout never fails from the caller's point of view; problems are logged.
pub async fn logout(state: &AppState, refresh_token: &str, all: bool) {
    let result = if all {
        revoke_all(state, refresh_token).await
    } else {
        revoke_one(state, refresh_token).await
    };
    if let Err(e) = result {
        warn!(all, error = %e, "logout left tokens in place");
    }
}

async fn revoke_one(state: &AppState, refresh_token: &str) -> AppResult<()> {
    state
        .tokens
        .validate_refresh(refresh_token)
        .map_err(|_| AppError::Unauthorized("invalid refresh token".into()))?;
    state.directory.remove_refresh_token(refresh_token).await?;
    Ok(())
}

async fn token_user(state: &AppState, refresh_token: &str) -> AppResult<User> {
    let email = state
        .tokens
        .validate_refresh(refresh_token)
        .map_err(|_| AppError::Unauthorized("invalid refresh token".into()))?;
    state
        .directory
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("user not found".into()))
}

async fn listed_user(state: &AppState, refresh_token: &str) -> AppResult<User> {
    let user = token_user(state, refresh_token).await?;
    if !state
        .directory
        .has_refresh_token(&user.id, refresh_token)
        .await?
    {
        return Err(AppError::Unauthorized("refresh token not found".into()));
    }
    Ok(user)
}
