//! Domain models.
//!
//! These are internal domain models; the HTTP tiers define their own request
//! and response shapes on top of them.

pub mod login;
pub mod token;
pub mod user;

pub use login::{AuthCode, LoginOutcome, LoginState, LoginStatus};
pub use token::{AccessClaims, RefreshClaims, TokenPair};
pub use user::{Identity, RefreshTokenRecord, User};
