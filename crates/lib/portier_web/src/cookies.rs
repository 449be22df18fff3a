//! Session id cookie.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::config::WebConfig;

/// HttpOnly session cookie; `Secure` outside dev mode.
pub fn session_cookie(config: &WebConfig, session_id: &str) -> Cookie<'static> {
    let max_age = i64::try_from(config.session_ttl.as_secs()).unwrap_or(i64::MAX);
    Cookie::build((config.cookie_name.clone(), session_id.to_string()))
        .http_only(true)
        .secure(!config.dev_mode)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(max_age))
        .build()
}

/// Expired cookie that clears the session id.
pub fn clear_session_cookie(config: &WebConfig) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), String::new()))
        .http_only(true)
        .secure(!config.dev_mode)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}
