//! Business logic behind the handlers.

pub mod login;
pub mod refresh;
