//! # portier_api
//!
//! HTTP API of the Portier auth service: login rendezvous, one-time code
//! completion, refresh rotation and access-token validation.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use portier_core::code::CodeChannel;
use portier_core::directory::{TimeoutDirectory, UserDirectory};
use portier_core::identity::IdentityExchange;
use portier_core::rendezvous::RendezvousStore;
use portier_core::token::TokenService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, code, health, oauth};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    /// Pending and terminal login attempts plus one-time codes.
    pub store: Arc<dyn RendezvousStore>,
    /// User directory, every call bounded by `config.directory_timeout`.
    pub directory: Arc<dyn UserDirectory>,
    pub identity: Arc<dyn IdentityExchange>,
    pub tokens: TokenService,
    pub codes: CodeChannel,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn RendezvousStore>,
        directory: Arc<dyn UserDirectory>,
        identity: Arc<dyn IdentityExchange>,
    ) -> Self {
        let tokens = TokenService::new(
            config.jwt_secret.as_bytes(),
            config.access_token_ttl,
            config.refresh_token_ttl,
        );
        let codes = CodeChannel::new(store.clone(), config.auth_code_ttl);
        let directory: Arc<dyn UserDirectory> =
            Arc::new(TimeoutDirectory::new(directory, config.directory_timeout));
        Self {
            config,
            store,
            directory,
            identity,
            tokens,
            codes,
        }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::GET_AUTH_LOGIN_STATUS, get(auth::login_status_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::POST_AUTH_VALIDATE, post(auth::validate_handler))
        .route(routes::POST_AUTH_CODE_CALLBACK, post(code::code_callback_handler))
        .route(
            routes::GET_AUTH_PROVIDER_CALLBACK,
            get(oauth::provider_callback_handler),
        )
        .route(routes::GET_HEALTH, get(health::health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
