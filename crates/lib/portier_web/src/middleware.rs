//! Client session middleware.
//!
//! Resolves the session cookie into a [`SessionContext`], upgrades an
//! anonymous session once its login is granted, and keeps unauthenticated
//! visitors on the entry page. [`call_downstream`] performs the single
//! refresh-and-retry permitted on a downstream 401.

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use portier_core::models::LoginStatus;
use tracing::{debug, info, warn};

use crate::WebState;
use crate::downstream::DownstreamResponse;
use crate::error::{WebError, WebResult};
use crate::session::{SessionRecord, SessionStatus};

/// Entry page; the only destination of middleware redirects.
pub const ENTRY_PATH: &str = "/";
/// Login-start route.
pub const LOGIN_PATH: &str = "/login";

/// Session resolved for the current request, stored in request extensions.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub session_id: Option<String>,
    pub record: Option<SessionRecord>,
}

/// Axum middleware implementing the anonymous → authorized session flow.
pub async fn session_flow(
    State(state): State<WebState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, WebError> {
    let path = request.uri().path().to_string();
    let open = path == ENTRY_PATH || path == LOGIN_PATH;

    let Some(session_id) = jar
        .get(&state.config.cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
    else {
        return Ok(pass_or_redirect(open, SessionContext::default(), request, next).await);
    };

    let Some(mut record) = state.cache.get(&session_id).await? else {
        let ctx = SessionContext {
            session_id: Some(session_id),
            record: None,
        };
        return Ok(pass_or_redirect(open, ctx, request, next).await);
    };

    match record.status {
        SessionStatus::Anonymous if path == LOGIN_PATH => {}
        SessionStatus::Anonymous => {
            match poll_login(&state, &session_id, &mut record).await? {
                Poll::Upgraded => {}
                Poll::Pending if path == ENTRY_PATH => {}
                Poll::Pending | Poll::Ended => return Ok(to_entry()),
            }
        }
        SessionStatus::Authorized if path == LOGIN_PATH => return Ok(to_entry()),
        SessionStatus::Authorized => {}
    }

    request.extensions_mut().insert(SessionContext {
        session_id: Some(session_id),
        record: Some(record),
    });
    Ok(next.run(request).await)
}

enum Poll {
    Upgraded,
    Pending,
    /// The login failed or could not be polled; the record is gone.
    Ended,
}

async fn poll_login(
    state: &WebState,
    session_id: &str,
    record: &mut SessionRecord,
) -> WebResult<Poll> {
    let Some(login_token) = record.login_token.clone() else {
        state.cache.delete(session_id).await?;
        return Ok(Poll::Ended);
    };

    let polled = match state.gateway.check_login(&login_token).await {
        Ok(polled) => polled,
        Err(e) => {
            debug!(%login_token, error = %e, "login poll failed");
            state.cache.delete(session_id).await?;
            return Ok(Poll::Ended);
        }
    };

    match (polled.status, polled.access_token, polled.refresh_token) {
        (LoginStatus::Granted, Some(access), Some(refresh)) => {
            record.authorize(access, refresh);
            state
                .cache
                .set(session_id, record, state.config.session_ttl)
                .await?;
            info!(%login_token, "session authorized");
            Ok(Poll::Upgraded)
        }
        (LoginStatus::Pending, _, _) => Ok(Poll::Pending),
        (status, _, _) => {
            debug!(%login_token, %status, "login not granted");
            state.cache.delete(session_id).await?;
            Ok(Poll::Ended)
        }
    }
}

async fn pass_or_redirect(
    open: bool,
    ctx: SessionContext,
    mut request: Request,
    next: Next,
) -> Response {
    if !open {
        return to_entry();
    }
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

pub(crate) fn to_entry() -> Response {
    Redirect::to(ENTRY_PATH).into_response()
}

/// Result of a downstream call made for a session.
#[derive(Debug)]
pub enum ProxyOutcome {
    Response(DownstreamResponse),
    /// Refresh failed; the session record was deleted.
    SessionEnded,
}

/// Call the main service with the session's access token.
///
/// On a 401 the stored refresh token is rotated once, the new pair is
/// persisted and the call is replayed once. A failed refresh deletes the
/// session. A second 401 is returned as is.
pub async fn call_downstream(
    state: &WebState,
    session_id: &str,
    record: &mut SessionRecord,
    method: Method,
    path: &str,
    body: Bytes,
) -> WebResult<ProxyOutcome> {
    let access = record.access_token.clone().unwrap_or_default();
    let first = state
        .downstream
        .call(method.clone(), path, &access, body.clone())
        .await?;
    if !first.is_unauthorized() {
        return Ok(ProxyOutcome::Response(first));
    }

    let Some(refresh_token) = record.refresh_token.clone() else {
        state.cache.delete(session_id).await?;
        return Ok(ProxyOutcome::SessionEnded);
    };
    let pair = match state.gateway.refresh(&refresh_token).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "refresh failed, ending session");
            state.cache.delete(session_id).await?;
            return Ok(ProxyOutcome::SessionEnded);
        }
    };
    record.rotate(pair);
    state
        .cache
        .set(session_id, record, state.config.session_ttl)
        .await?;
    debug!("session tokens refreshed, replaying downstream call");

    let access = record.access_token.clone().unwrap_or_default();
    let retried = state.downstream.call(method, path, &access, body).await?;
    Ok(ProxyOutcome::Response(retried))
}
