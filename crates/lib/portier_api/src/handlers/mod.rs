//! Request handlers.

pub mod auth;
pub mod code;
pub mod health;
pub mod oauth;
