//! Admin UI mount point and its session routes.
//!
//! Flow Overview: an [`AdminUi`] may contribute session routes (sign in, sign
//! out, current session) mounted before the API, and always contributes a
//! catch-all router installed as the fallback, after every concrete route.
//! [`AdminApp`] is the built-in implementation: it serves a static build (or a
//! placeholder page) under its admin path, and every other unmatched path is a
//! 404.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};
use tower_http::services::{ServeDir, ServeFile};
use tracing::debug;
use utoipa::ToSchema;

use crate::{
    api::{
        config::{validate_mount_path, DEFAULT_ADMIN_PATH},
        Mount,
    },
    auth::{end_authed_session, start_authed_session, AuthStrategy, AuthedItem, Validation},
    session::Session,
    Result,
};

/// Admin UI collaborator.
pub trait AdminUi: Send + Sync {
    /// Check the UI's configuration before any of its routes are built.
    ///
    /// # Errors
    /// Returns `Error::Config` when the UI cannot be mounted.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Routes handling admin sign in and sign out, if any.
    fn session_routes(&self) -> Option<Mount>;

    /// Fallback router serving the UI for any path no other stage matched.
    fn catch_all(&self) -> Router;
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct SigninRequest {
    identity: String,
    secret: String,
}

#[derive(ToSchema, Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SigninResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    list_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SignoutResponse {
    success: bool,
}

#[derive(Clone)]
pub struct AdminState {
    strategy: Arc<dyn AuthStrategy>,
}

/// Built-in admin UI.
#[derive(Clone)]
pub struct AdminApp {
    admin_path: String,
    strategy: Option<Arc<dyn AuthStrategy>>,
    static_dir: Option<PathBuf>,
}

impl Default for AdminApp {
    fn default() -> Self {
        Self::new(DEFAULT_ADMIN_PATH)
    }
}

impl AdminApp {
    #[must_use]
    pub fn new(admin_path: impl Into<String>) -> Self {
        Self {
            admin_path: admin_path.into(),
            strategy: None,
            static_dir: None,
        }
    }

    /// Enable sign in/out routes backed by `strategy`.
    #[must_use]
    pub fn with_auth_strategy(mut self, strategy: Arc<dyn AuthStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Serve a prebuilt UI from `dir`, falling back to its `index.html`.
    #[must_use]
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn admin_path(&self) -> &str {
        &self.admin_path
    }

    fn path(&self, suffix: &str) -> String {
        format!("{}/{suffix}", self.admin_path)
    }
}

impl AdminUi for AdminApp {
    fn validate(&self) -> Result<()> {
        validate_mount_path("admin path", &self.admin_path)
    }

    fn session_routes(&self) -> Option<Mount> {
        let strategy = self.strategy.clone()?;
        let (signin_path, signout_path, session_path) =
            (self.path("signin"), self.path("signout"), self.path("session"));

        let router = Router::new()
            .route(&signin_path, post(signin))
            .route(&signout_path, post(signout))
            .route(&session_path, get(current_session))
            .with_state(AdminState { strategy });

        Some(
            Mount::new(router)
                .claiming(&signin_path)
                .claiming(&signout_path)
                .claiming(&session_path),
        )
    }

    fn catch_all(&self) -> Router {
        match &self.static_dir {
            // Request paths are relative to the admin path once nested.
            Some(dir) => Router::new().nest_service(
                &self.admin_path,
                ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
            ),
            None => Router::new()
                .route(&self.admin_path, get(placeholder))
                .route(&self.path("*rest"), get(placeholder)),
        }
    }
}

#[utoipa::path(
    post,
    path = "/admin/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Session started; token works as a bearer token", body = SigninResponse),
        (status = 400, description = "Missing payload"),
        (status = 401, description = "Credentials rejected", body = SigninResponse)
    ),
    tag = "admin"
)]
pub async fn signin(
    State(state): State<AdminState>,
    session: Session,
    payload: Option<Json<SigninRequest>>,
) -> Response {
    let request: SigninRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload").into_response(),
    };

    let item_id = match state.strategy.validate(&request.identity, &request.secret).await {
        Ok(Validation::Success { item_id, .. }) => item_id,
        Ok(Validation::Failure(reason)) => {
            debug!(
                strategy = state.strategy.name(),
                reason = reason.as_str(),
                "Sign in rejected"
            );
            let response = SigninResponse {
                success: false,
                message: Some("Invalid credentials".to_string()),
                ..SigninResponse::default()
            };
            return (StatusCode::UNAUTHORIZED, Json(response)).into_response();
        }
        Err(err) => return err.into_response(),
    };

    let list_key = state.strategy.list_key();
    if let Err(err) = start_authed_session(&session, list_key, &item_id).await {
        return err.into_response();
    }

    let response = SigninResponse {
        success: true,
        token: Some(session.id().await),
        item_id: Some(item_id),
        list_key: Some(list_key.to_string()),
        message: None,
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[utoipa::path(
    post,
    path = "/admin/signout",
    responses(
        (status = 200, description = "Session ended", body = SignoutResponse)
    ),
    tag = "admin"
)]
pub async fn signout(session: Session) -> Response {
    match end_authed_session(&session).await {
        Ok(success) => Json(SignoutResponse { success }).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/admin/session",
    responses(
        (status = 200, description = "Session is authenticated", body = AuthedItem),
        (status = 204, description = "No authenticated session")
    ),
    tag = "admin"
)]
pub async fn current_session(authed: Option<AuthedItem>) -> Response {
    match authed {
        Some(authed) => Json(authed).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

// axum handler for the admin catch-all without a static build
async fn placeholder() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html lang="en">
  <head><meta charset="utf-8"><title>Keystone Admin</title></head>
  <body><div id="app">Keystone admin UI</div></body>
</html>
"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use std::fs;
    use tower::ServiceExt;

    async fn get_text(router: &Router, uri: &str) -> (StatusCode, String) {
        let request = match Request::builder().uri(uri).body(Body::empty()) {
            Ok(request) => request,
            Err(err) => panic!("request should build: {err}"),
        };
        let response = router
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|err| match err {});
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[test]
    fn admin_path_must_be_a_mount_path() {
        assert!(AdminApp::default().validate().is_ok());
        assert!(AdminApp::new("/cms").validate().is_ok());
        for path in ["admin", "/admin/", "/", ""] {
            assert!(
                matches!(AdminApp::new(path).validate(), Err(crate::Error::Config(_))),
                "{path:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn static_build_is_served_under_the_admin_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("index.html"), "INDEX").expect("write index");
        fs::write(dir.path().join("app.js"), "APPJS").expect("write asset");

        let router = AdminApp::default().with_static_dir(dir.path()).catch_all();

        assert_eq!(get_text(&router, "/admin/app.js").await, (StatusCode::OK, "APPJS".to_string()));
        assert_eq!(get_text(&router, "/admin").await, (StatusCode::OK, "INDEX".to_string()));
        assert_eq!(
            get_text(&router, "/admin/lists/users").await,
            (StatusCode::OK, "INDEX".to_string())
        );

        // Nothing from the build leaks outside the admin path.
        let (status, _) = get_text(&router, "/app.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn placeholder_is_served_under_the_admin_path() {
        let router = AdminApp::new("/cms").catch_all();

        let (status, body) = get_text(&router, "/cms/lists/posts").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Keystone admin UI"));

        let (status, _) = get_text(&router, "/cms").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get_text(&router, "/elsewhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn session_routes_require_a_strategy() {
        assert!(AdminApp::default().session_routes().is_none());
    }

    #[test]
    fn session_routes_live_under_the_admin_path() {
        let adapter = crate::lists::MemoryAdapter::new();
        let list = crate::lists::List::new("User", Arc::new(adapter));
        let strategy = Arc::new(crate::auth::PasswordAuthStrategy::new(list));
        let app = AdminApp::new("/cms").with_auth_strategy(strategy);

        let mount = app.session_routes();
        assert_eq!(
            mount.as_ref().map(Mount::paths),
            Some(
                &[
                    "/cms/signin".to_string(),
                    "/cms/signout".to_string(),
                    "/cms/session".to_string()
                ][..]
            )
        );
    }
}
