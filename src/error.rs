use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Boxed error returned by external collaborators (stores, adapters).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session store failed to read, write or destroy a record.
    #[error("session store failure: {0}")]
    Store(#[source] BoxError),

    /// A list's storage adapter failed to resolve an item.
    #[error("storage adapter failure for list {list}: {source}")]
    Adapter {
        list: String,
        #[source]
        source: BoxError,
    },

    /// A stored secret could not be parsed or verified.
    #[error("password hash failure: {0}")]
    PasswordHash(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

impl Error {
    pub fn store<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Store(err.into())
    }

    pub fn adapter<E>(list: &str, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Adapter {
            list: list.to_string(),
            source: err.into(),
        }
    }
}

// Faults surface to clients as a bare 500; details stay in the logs.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!("Request failed: {self}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "internal server error" })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_error_names_the_list() {
        let err = Error::adapter("Todo", "connection reset");
        assert_eq!(
            err.to_string(),
            "storage adapter failure for list Todo: connection reset"
        );
    }

    #[test]
    fn errors_render_as_internal_server_error() {
        let response = Error::store("unreachable").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
