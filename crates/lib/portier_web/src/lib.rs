//! # portier_web
//!
//! Client tier of Portier. Browser sessions start anonymous, poll the auth
//! service until their login is decided and then call the main service with
//! the granted tokens.

pub mod config;
pub mod cookies;
pub mod downstream;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod session;

use std::sync::Arc;

use axum::Router;
use axum::routing::{any, get};
use tower_http::trace::TraceLayer;

use crate::config::WebConfig;
use crate::downstream::Downstream;
use crate::gateway::AuthGateway;
use crate::session::SessionCache;

/// Shared state of the client tier.
#[derive(Clone)]
pub struct WebState {
    pub config: WebConfig,
    pub cache: Arc<dyn SessionCache>,
    pub gateway: Arc<dyn AuthGateway>,
    pub downstream: Arc<dyn Downstream>,
}

/// Builds the client tier router with the session middleware applied.
pub fn router(state: WebState) -> Router {
    Router::new()
        .route(middleware::ENTRY_PATH, get(handlers::entry_handler))
        .route(middleware::LOGIN_PATH, get(handlers::login_handler))
        .route("/logout", get(handlers::logout_handler))
        .route("/actions/{*path}", any(handlers::action_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::session_flow,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
