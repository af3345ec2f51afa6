//! Route handlers and the collaborator seams mounted by the web server.

pub mod admin;
pub mod graphql;
pub mod health;
pub mod root;
