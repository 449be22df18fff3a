//! # portier_core
//!
//! Core domain logic for Portier: the login rendezvous, one-time codes,
//! credential signing, role permissions and the collaborator traits the
//! HTTP tiers are built on.

pub mod code;
pub mod directory;
pub mod identity;
pub mod migrate;
pub mod models;
pub mod permissions;
pub mod rendezvous;
pub mod token;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
