//! Route paths of the auth service, shared with its HTTP clients.

pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const GET_AUTH_LOGIN_STATUS: &str = "/auth/login/status";
pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
pub const POST_AUTH_VALIDATE: &str = "/auth/validate";
pub const GET_AUTH_PROVIDER_CALLBACK: &str = "/auth/{provider}/callback";
pub const POST_AUTH_CODE_CALLBACK: &str = "/auth/code/callback";
pub const GET_HEALTH: &str = "/health";
