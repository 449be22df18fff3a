//! Client tier routes.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::WebState;
use crate::cookies::{clear_session_cookie, session_cookie};
use crate::error::{WebError, WebResult};
use crate::middleware::{ProxyOutcome, SessionContext, call_downstream, to_entry};
use crate::session::SessionRecord;

/// Summary of the caller's session shown on the entry page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryView {
    /// `unknown`, `anonymous` or `authorized`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_token: Option<String>,
}

/// `GET /`: entry page.
pub async fn entry_handler(Extension(ctx): Extension<SessionContext>) -> Json<EntryView> {
    let view = match ctx.record {
        None => EntryView {
            status: "unknown".into(),
            login_token: None,
        },
        Some(record) if record.is_authorized() => EntryView {
            status: "authorized".into(),
            login_token: None,
        },
        Some(record) => EntryView {
            status: "anonymous".into(),
            login_token: record.login_token,
        },
    };
    Json(view)
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(rename = "type")]
    pub method: Option<String>,
}

#[derive(Debug, Serialize)]
struct CodeView {
    code: String,
}

/// `GET /login?type=`: start a login and remember it in an anonymous session.
pub async fn login_handler(
    State(state): State<WebState>,
    Extension(ctx): Extension<SessionContext>,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> WebResult<(CookieJar, Response)> {
    let Some(method) = query.method.filter(|m| !m.is_empty()) else {
        return Ok((jar, to_entry()));
    };

    let (session_id, jar) = match ctx.session_id {
        Some(id) => (id, jar),
        None => {
            let id = Uuid::new_v4().to_string();
            let jar = jar.add(session_cookie(&state.config, &id));
            (id, jar)
        }
    };

    let login_token = Uuid::new_v4().to_string();
    state
        .cache
        .set(
            &session_id,
            &SessionRecord::anonymous(&login_token),
            state.config.session_ttl,
        )
        .await?;

    let started = state.gateway.start_login(&method, &login_token).await?;
    let resp = match (started.auth_url, started.code) {
        (Some(url), _) => Redirect::to(&url).into_response(),
        (None, Some(code)) => Json(CodeView { code }).into_response(),
        (None, None) => {
            return Err(WebError::Validation(
                "empty response from auth service".into(),
            ));
        }
    };
    Ok((jar, resp))
}

#[derive(Debug, Deserialize)]
pub struct LogoutQuery {
    #[serde(default)]
    pub all: bool,
}

/// `GET /logout[?all=true]`: end the session, optionally revoking every
/// refresh token of the user.
pub async fn logout_handler(
    State(state): State<WebState>,
    Extension(ctx): Extension<SessionContext>,
    Query(query): Query<LogoutQuery>,
    jar: CookieJar,
) -> WebResult<(CookieJar, Redirect)> {
    if let Some(session_id) = &ctx.session_id {
        state.cache.delete(session_id).await?;
    }
    if query.all
        && let Some(refresh) = ctx.record.as_ref().and_then(|r| r.refresh_token.as_deref())
        && let Err(e) = state.gateway.logout(refresh, true).await
    {
        warn!(error = %e, "revoke-all logout failed");
    }
    let jar = jar.add(clear_session_cookie(&state.config));
    Ok((jar, Redirect::to("/")))
}

/// `ANY /actions/{*path}`: forward to the main service for an authorized
/// session.
pub async fn action_handler(
    State(state): State<WebState>,
    Extension(ctx): Extension<SessionContext>,
    method: Method,
    Path(path): Path<String>,
    body: Bytes,
) -> WebResult<Response> {
    let (Some(session_id), Some(mut record)) = (ctx.session_id, ctx.record) else {
        return Ok(to_entry());
    };
    if !record.is_authorized() {
        return Ok(to_entry());
    }

    let target = format!("/{}", path.trim_start_matches('/'));
    match call_downstream(&state, &session_id, &mut record, method, &target, body).await? {
        ProxyOutcome::Response(resp) => {
            let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::BAD_GATEWAY);
            Ok((status, [(header::CONTENT_TYPE, "application/json")], resp.body).into_response())
        }
        ProxyOutcome::SessionEnded => Ok(to_entry()),
    }
}
