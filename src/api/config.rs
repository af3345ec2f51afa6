//! Mount paths and CORS settings for the web server.

use axum::http::HeaderValue;
use url::Url;

use crate::{Error, Result};

pub const DEFAULT_API_PATH: &str = "/admin/api";
pub const DEFAULT_GRAPHIQL_PATH: &str = "/admin/graphiql";
pub const DEFAULT_ADMIN_PATH: &str = "/admin";

/// Where the API middleware is mounted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiPaths {
    pub api_path: String,
    pub graphiql_path: String,
}

impl Default for ApiPaths {
    fn default() -> Self {
        Self {
            api_path: DEFAULT_API_PATH.to_string(),
            graphiql_path: DEFAULT_GRAPHIQL_PATH.to_string(),
        }
    }
}

impl ApiPaths {
    /// # Errors
    /// Returns `Error::Config` for relative, root or identical paths.
    pub fn validate(&self) -> Result<()> {
        validate_mount_path("api path", &self.api_path)?;
        validate_mount_path("graphiql path", &self.graphiql_path)?;
        if self.api_path == self.graphiql_path {
            return Err(Error::Config(format!(
                "api path and graphiql path must differ: {}",
                self.api_path
            )));
        }
        Ok(())
    }
}

/// Mount paths must be absolute, must not be `/` and must not end with `/`.
///
/// # Errors
/// Returns `Error::Config` describing the offending path.
pub fn validate_mount_path(name: &str, path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(Error::Config(format!("{name} must start with '/': {path}")));
    }
    if path == "/" || path.ends_with('/') {
        return Err(Error::Config(format!(
            "{name} must not be '/' or end with '/': {path}"
        )));
    }
    Ok(())
}

/// Normalize an origin URL into the `scheme://host[:port]` header form.
///
/// # Errors
/// Returns `Error::Config` if the URL is invalid or has no host.
pub fn origin_header(origin: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(origin).map_err(|err| Error::Config(format!("invalid origin {origin}: {err}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::Config(format!("origin must include a valid host: {origin}")))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin)
        .map_err(|err| Error::Config(format!("failed to build origin header: {err}")))
}
