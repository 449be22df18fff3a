//! Login orchestration over the rendezvous store.
//!
//! A login starts `pending` and is completed exactly once by either a
//! provider callback or a one-time code submission. Every failure on a
//! completion path still tries to mark the login `denied` so a poller is
//! never left waiting until expiry.

use std::str::FromStr;

use chrono::Utc;
use portier_core::directory::get_or_create;
use portier_core::identity::Provider;
use portier_core::models::{LoginOutcome, LoginState, TokenPair, User};
use portier_core::rendezvous::Transition;
use tracing::{debug, info, warn};
use url::Url;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::services::refresh::issue_unlisted;

/// How the user intends to finish a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    Provider(Provider),
    Code,
}

impl FromStr for LoginMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(LoginMethod::Code),
            other => other
                .parse::<Provider>()
                .map(LoginMethod::Provider)
                .map_err(|_| AppError::Validation("unsupported auth type".into())),
        }
    }
}

/// What the starting caller needs to continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStart {
    /// Send the user agent here; `state` carries the login token.
    Redirect(Url),
    /// Show this code for entry on a signed-in device.
    Code(String),
}

/// Create a pending login for `login_token`.
pub async fn start(
    state: &AppState,
    method: LoginMethod,
    login_token: &str,
) -> AppResult<LoginStart> {
    if login_token.trim().is_empty() {
        return Err(AppError::Validation("login token is required".into()));
    }

    // An unusable method must not leave a pending entry behind.
    let redirect = match method {
        LoginMethod::Provider(provider) => Some(
            state
                .identity
                .authorization_url(provider, login_token)
                .map_err(|e| AppError::Validation(format!("invalid auth type: {e}")))?,
        ),
        LoginMethod::Code => None,
    };

    state
        .store
        .create_login_state(login_token, state.config.login_token_ttl)
        .await?;

    let start = match redirect {
        Some(url) => LoginStart::Redirect(url),
        None => LoginStart::Code(state.codes.generate_code(login_token).await?),
    };
    info!(login_token, ?method, "login started");
    Ok(start)
}

/// Current state of a login; absent and expired both read as not found.
pub async fn check_status(state: &AppState, login_token: &str) -> AppResult<LoginState> {
    state
        .store
        .get_login_state(login_token)
        .await?
        .ok_or_else(|| AppError::NotFound("login token not found or expired".into()))
}

/// Finish a login from a provider callback.
///
/// `error` is the provider's cancellation signal; `login_token` is the
/// round-tripped `state` parameter.
pub async fn complete_with_provider(
    state: &AppState,
    provider: Provider,
    login_token: &str,
    code: Option<&str>,
    error: Option<&str>,
) -> AppResult<TokenPair> {
    let result: AppResult<TokenPair> = async {
        let code = match (code, error) {
            (Some(code), None) if !code.is_empty() && !login_token.is_empty() => code,
            _ => {
                return Err(AppError::Validation(
                    "oauth cancelled or invalid request".into(),
                ));
            }
        };
        let identity = state.identity.exchange(provider, code).await.map_err(|e| {
            warn!(login_token, %provider, error = %e, "identity exchange failed");
            AppError::Unauthorized("oauth exchange failed".into())
        })?;
        let user = get_or_create(
            state.directory.as_ref(),
            &identity.email,
            &identity.display_name,
        )
        .await?;
        grant(state, login_token, &user).await
    }
    .await;
    settle(state, login_token, result).await
}

/// Finish a login from a one-time code typed into a signed-in device.
///
/// `refresh_token` identifies that device's user and must be currently
/// listed for them.
pub async fn complete_with_code(
    state: &AppState,
    code: &str,
    refresh_token: &str,
) -> AppResult<TokenPair> {
    // An unknown code resolves no login, so there is nothing to deny.
    let login_token = state.codes.validate_code(code).await?;

    let result: AppResult<TokenPair> = async {
        match state.store.get_login_state(&login_token).await? {
            Some(login) if !login.status.is_terminal() => {}
            _ => {
                return Err(AppError::Validation(
                    "invalid or expired login token".into(),
                ));
            }
        }
        let email = state
            .tokens
            .validate_refresh(refresh_token)
            .map_err(|_| AppError::Unauthorized("invalid refresh token".into()))?;
        let user = state
            .directory
            .get_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Unauthorized("user not found".into()))?;
        if !state
            .directory
            .has_refresh_token(&user.id, refresh_token)
            .await?
        {
            return Err(AppError::Unauthorized("refresh token not found".into()));
        }
        grant(state, &login_token, &user).await
    }
    .await;
    settle(state, &login_token, result).await
}

/// Issue tokens for `user` and write the grant.
async fn grant(state: &AppState, login_token: &str, user: &User) -> AppResult<TokenPair> {
    if user.is_blocked {
        return Err(AppError::Forbidden("user is blocked".into()));
    }

    let pair = issue_unlisted(state, user).await?;
    let expires_at = Utc::now() + state.tokens.refresh_ttl();
    state
        .directory
        .add_refresh_token(&user.id, &pair.refresh_token, expires_at)
        .await?;

    match state
        .store
        .update_login_state(login_token, LoginOutcome::Granted(pair.clone()))
        .await
    {
        Ok(Transition::Applied) => {
            info!(login_token, user_id = %user.id, "login granted");
            Ok(pair)
        }
        Ok(transition) => {
            warn!(login_token, ?transition, "grant not applied");
            discard_refresh_token(state, &pair.refresh_token).await;
            Err(AppError::Validation("invalid or expired login token".into()))
        }
        Err(e) => {
            discard_refresh_token(state, &pair.refresh_token).await;
            Err(e.into())
        }
    }
}

/// Mark the login denied when `result` is a failure.
async fn settle(
    state: &AppState,
    login_token: &str,
    result: AppResult<TokenPair>,
) -> AppResult<TokenPair> {
    if let Err(e) = &result {
        debug!(login_token, error = %e, "completion failed");
        deny(state, login_token).await;
    }
    result
}

async fn deny(state: &AppState, login_token: &str) {
    if login_token.is_empty() {
        return;
    }
    match state
        .store
        .update_login_state(login_token, LoginOutcome::Denied)
        .await
    {
        Ok(Transition::Applied) => info!(login_token, "login denied"),
        Ok(transition) => warn!(login_token, ?transition, "denial not applied"),
        Err(e) => warn!(login_token, error = %e, "failed to record denial"),
    }
}

async fn discard_refresh_token(state: &AppState, refresh_token: &str) {
    if let Err(e) = state.directory.remove_refresh_token(refresh_token).await {
        warn!(error = %e, "failed to discard unused refresh token");
    }
}

/// Run a completion on its own task so a dropped request cannot abandon it
/// between issuing tokens and writing the outcome.
pub async fn detached<F, T>(fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(fut)
        .await
        .map_err(|e| AppError::Internal(format!("completion task: {e}")))?
}
