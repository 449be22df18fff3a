//! Integration tests: drive the client tier router against fake auth and
//! main services and check the session transitions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{Method, Request, StatusCode, header};
use portier_api::models::{LoginResponse, LoginStatusResponse, TokenPair};
use portier_core::models::LoginStatus;
use portier_web::config::WebConfig;
use portier_web::downstream::{Downstream, DownstreamResponse};
use portier_web::gateway::{AuthGateway, GatewayError};
use portier_web::session::{MemorySessionCache, SessionCache, SessionRecord, SessionStatus};
use portier_web::{WebState, router};
use serde_json::Value;
use tower::ServiceExt;

#[derive(Default)]
struct FakeGateway {
    statuses: Mutex<HashMap<String, LoginStatus>>,
    refresh_ok: Mutex<bool>,
    refresh_calls: AtomicUsize,
    logouts: Mutex<Vec<(String, bool)>>,
}

impl FakeGateway {
    fn set_status(&self, login_token: &str, status: LoginStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(login_token.to_string(), status);
    }
}

#[async_trait]
impl AuthGateway for FakeGateway {
    async fn start_login(
        &self,
        method: &str,
        login_token: &str,
    ) -> Result<LoginResponse, GatewayError> {
        self.set_status(login_token, LoginStatus::Pending);
        match method {
            "code" => Ok(LoginResponse {
                auth_url: None,
                code: Some("123456".into()),
            }),
            "github" => Ok(LoginResponse {
                auth_url: Some(format!("https://idp.test/authorize?state={login_token}")),
                code: None,
            }),
            _ => Err(GatewayError::Rejected {
                status: 400,
                message: "unsupported auth type".into(),
            }),
        }
    }

    async fn check_login(&self, login_token: &str) -> Result<LoginStatusResponse, GatewayError> {
        let status = self.statuses.lock().unwrap().get(login_token).copied();
        match status {
            None => Err(GatewayError::Rejected {
                status: 404,
                message: "login token not found or expired".into(),
            }),
            Some(LoginStatus::Granted) => Ok(LoginStatusResponse {
                status: LoginStatus::Granted,
                access_token: Some("access-1".into()),
                refresh_token: Some("refresh-1".into()),
            }),
            Some(status) => Ok(LoginStatusResponse {
                status,
                access_token: None,
                refresh_token: None,
            }),
        }
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, GatewayError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !*self.refresh_ok.lock().unwrap() {
            return Err(GatewayError::Rejected {
                status: 401,
                message: "refresh token not found".into(),
            });
        }
        Ok(TokenPair {
            access_token: format!("fresh-{n}"),
            refresh_token: format!("refresh-{}", n + 1),
            token_type: "Bearer".into(),
            expires_in: 60,
        })
    }

    async fn logout(&self, refresh_token: &str, all: bool) -> Result<(), GatewayError> {
        self.logouts
            .lock()
            .unwrap()
            .push((refresh_token.to_string(), all));
        Ok(())
    }
}

/// Main service stand-in: `stale` tokens and the `/always401` path are
/// rejected, everything else echoes the token it saw.
#[derive(Default)]
struct FakeDownstream {
    calls: AtomicUsize,
}

#[async_trait]
impl Downstream for FakeDownstream {
    async fn call(
        &self,
        _method: Method,
        path: &str,
        access_token: &str,
        _body: Bytes,
    ) -> Result<DownstreamResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if access_token == "stale" || path == "/always401" {
            return Ok(DownstreamResponse {
                status: 401,
                body: Bytes::from_static(br#"{"error":"token expired"}"#),
            });
        }
        Ok(DownstreamResponse {
            status: 200,
            body: Bytes::from(format!(r#"{{"path":"{path}","token":"{access_token}"}}"#)),
        })
    }
}

struct Harness {
    app: Router,
    cache: Arc<MemorySessionCache>,
    gateway: Arc<FakeGateway>,
    downstream: Arc<FakeDownstream>,
}

impl Harness {
    fn new() -> Self {
        let cache = Arc::new(MemorySessionCache::new());
        let gateway = Arc::new(FakeGateway::default());
        let downstream = Arc::new(FakeDownstream::default());
        let state = WebState {
            config: WebConfig::default(),
            cache: cache.clone(),
            gateway: gateway.clone(),
            downstream: downstream.clone(),
        };
        Self {
            app: router(state),
            cache,
            gateway,
            downstream,
        }
    }

    async fn seed(&self, session_id: &str, record: &SessionRecord) {
        self.cache
            .set(session_id, record, Duration::from_secs(600))
            .await
            .unwrap();
    }

    async fn authorized(&self, session_id: &str, access: &str) {
        let mut record = SessionRecord::anonymous("done");
        record.authorize(access.into(), "refresh-1".into());
        self.seed(session_id, &record).await;
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        session_id: Option<&str>,
    ) -> (StatusCode, Option<String>, Vec<String>, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(sid) = session_id {
            builder = builder.header(header::COOKIE, format!("session_id={sid}"));
        }
        let resp = self
            .app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .expect("request");
        let status = resp.status();
        let location = resp
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let cookies = resp
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, location, cookies, json)
    }

    async fn get(&self, uri: &str, session_id: Option<&str>) -> (StatusCode, Option<String>, Value) {
        let (status, location, _, body) = self.request(Method::GET, uri, session_id).await;
        (status, location, body)
    }
}

#[tokio::test]
async fn visitor_without_session_stays_on_entry() {
    let h = Harness::new();
    let (status, location, _) = h.get("/actions/demo", None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/"));

    let (status, _, body) = h.get("/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unknown");

    let (status, location, _) = h.get("/actions/demo", Some("ghost")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/"));
}

#[tokio::test]
async fn code_login_mints_cookie_and_anonymous_record() {
    let h = Harness::new();
    let (status, _, cookies, body) = h.request(Method::GET, "/login?type=code", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], "123456");

    let cookie = cookies
        .iter()
        .find(|c| c.starts_with("session_id="))
        .expect("session cookie");
    assert!(cookie.contains("HttpOnly"));
    let sid = cookie["session_id=".len()..]
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let record = h.cache.get(&sid).await.unwrap().expect("record stored");
    assert_eq!(record.status, SessionStatus::Anonymous);
    assert!(record.login_token.is_some());
}

#[tokio::test]
async fn provider_login_redirects_to_provider() {
    let h = Harness::new();
    let (status, location, _) = h.get("/login?type=github", None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert!(location.unwrap().starts_with("https://idp.test/authorize?state="));
}

#[tokio::test]
async fn pending_session_waits_on_entry() {
    let h = Harness::new();
    h.seed("s1", &SessionRecord::anonymous("L1")).await;
    h.gateway.set_status("L1", LoginStatus::Pending);

    let (status, location, _) = h.get("/actions/demo", Some("s1")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/"));

    let (status, _, body) = h.get("/", Some("s1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "anonymous");
    assert_eq!(body["login_token"], "L1");
    assert!(h.cache.get("s1").await.unwrap().is_some());
}

#[tokio::test]
async fn granted_login_upgrades_session() {
    let h = Harness::new();
    h.seed("s1", &SessionRecord::anonymous("L1")).await;
    h.gateway.set_status("L1", LoginStatus::Granted);

    let (status, _, body) = h.get("/actions/demo", Some("s1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"], "access-1");
    assert_eq!(body["path"], "/demo");

    let record = h.cache.get("s1").await.unwrap().unwrap();
    assert_eq!(record.status, SessionStatus::Authorized);
    assert_eq!(record.login_token, None);
    assert_eq!(record.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn denied_or_unknown_login_ends_session() {
    let h = Harness::new();
    h.seed("s1", &SessionRecord::anonymous("L1")).await;
    h.gateway.set_status("L1", LoginStatus::Denied);
    let (status, location, _) = h.get("/actions/demo", Some("s1")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/"));
    assert!(h.cache.get("s1").await.unwrap().is_none());

    h.seed("s2", &SessionRecord::anonymous("never-started")).await;
    let (status, _, _) = h.get("/actions/demo", Some("s2")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert!(h.cache.get("s2").await.unwrap().is_none());
}

#[tokio::test]
async fn authorized_session_cannot_login_again() {
    let h = Harness::new();
    h.authorized("s1", "good").await;
    let (status, location, _) = h.get("/login?type=code", Some("s1")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/"));
    assert_eq!(h.gateway.statuses.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn unauthorized_downstream_refreshes_once_and_replays() {
    let h = Harness::new();
    h.authorized("s1", "stale").await;
    *h.gateway.refresh_ok.lock().unwrap() = true;

    let (status, _, body) = h.get("/actions/demo", Some("s1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"], "fresh-1");
    assert_eq!(h.gateway.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.downstream.calls.load(Ordering::SeqCst), 2);

    let record = h.cache.get("s1").await.unwrap().unwrap();
    assert_eq!(record.access_token.as_deref(), Some("fresh-1"));
    assert_eq!(record.refresh_token.as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn failed_refresh_ends_session_without_retry() {
    let h = Harness::new();
    h.authorized("s1", "stale").await;

    let (status, location, _) = h.get("/actions/demo", Some("s1")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/"));
    assert_eq!(h.gateway.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.downstream.calls.load(Ordering::SeqCst), 1);
    assert!(h.cache.get("s1").await.unwrap().is_none());
}

#[tokio::test]
async fn second_unauthorized_is_returned_not_retried() {
    let h = Harness::new();
    h.authorized("s1", "good").await;
    *h.gateway.refresh_ok.lock().unwrap() = true;

    let (status, _, _) = h.get("/actions/always401", Some("s1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.gateway.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.downstream.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn logout_all_revokes_and_forgets_session() {
    let h = Harness::new();
    h.authorized("s1", "good").await;

    let (status, location, cookies, _) = h
        .request(Method::GET, "/logout?all=true", Some("s1"))
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/"));
    assert!(cookies.iter().any(|c| c.starts_with("session_id=;")));
    assert!(h.cache.get("s1").await.unwrap().is_none());
    assert_eq!(
        h.gateway.logouts.lock().unwrap().as_slice(),
        &[("refresh-1".to_string(), true)]
    );
}
