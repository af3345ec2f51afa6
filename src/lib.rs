//! # Keystone (content management web server)
//!
//! `keystone` wires an HTTP server, session/authentication middleware and the
//! mount points of a GraphQL API and an admin UI in front of pluggable list
//! storage adapters.
//!
//! ## Identity
//!
//! Cookie sessions and bearer tokens share one code path. A bearer token is the
//! session identifier itself: the translator in [`session::bearer`] turns
//! `Authorization: Bearer <token>` into a signed `keystone.sid` cookie before the
//! session layer runs, so every downstream handler sees the same
//! [`session::Session`] and, when the session names a live item, the same
//! [`auth::AuthedItem`].
//!
//! ## Mounting order
//!
//! Layers: request id, request logging, CORS, then (only when an authentication
//! strategy is configured) bearer translation, session resolution and
//! authenticated-item population. Routes: landing page and health, admin session
//! routes, the API, and finally the admin UI as the router fallback.

pub mod api;
pub mod auth;
pub mod cli;
pub mod error;
pub mod lists;
pub mod session;

pub use error::{BoxError, Error, Result};

pub const GIT_COMMIT_HASH: &str = env!("KEYSTONE_GIT_SHA");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
