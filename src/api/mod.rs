//! HTTP server composition.
//!
//! The router is assembled from an ordered list of [`Stage`]s. Concrete routes
//! from different stages may not overlap (checked when building), and the admin
//! UI is installed as the fallback, so it only ever sees requests no other stage
//! handles. Identity layers wrap every stage, including the fallback.
//! Paths the fallback does not serve answer 404.

pub mod config;
pub mod handlers;
mod openapi;

pub use config::ApiPaths;
pub use openapi::{openapi, openapi_for};

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use std::{collections::HashMap, future::Future, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

use crate::{
    api::handlers::{
        admin::AdminUi,
        graphql::{ApiMiddleware, AuthedItemApi},
        health, root,
    },
    auth::{self, AuthContext, AuthStrategy, StaleSessionPolicy},
    lists::Lists,
    session::{self, bearer, SessionConfig},
    Error, Result,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Routes contributed by one stage together with the paths they claim.
pub struct Mount {
    paths: Vec<String>,
    router: Router,
}

impl Mount {
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self {
            paths: Vec::new(),
            router,
        }
    }

    #[must_use]
    pub fn claiming(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }

    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

/// Route stages in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// `GET /` landing document and `/health`.
    Landing,
    /// Admin sign in/out routes.
    AdminSession,
    /// The API, always mounted.
    Api,
    /// Admin UI catch-all under the admin path, the router fallback.
    AdminUi,
}

pub const STAGES: [Stage; 4] = [Stage::Landing, Stage::AdminSession, Stage::Api, Stage::AdminUi];

/// Builder for the web server.
pub struct WebServer {
    lists: Arc<Lists>,
    sessions: Option<SessionConfig>,
    strategies: Vec<Arc<dyn AuthStrategy>>,
    stale_policy: StaleSessionPolicy,
    api: Arc<dyn ApiMiddleware>,
    paths: ApiPaths,
    admin_ui: Option<Arc<dyn AdminUi>>,
    cors_origins: Vec<HeaderValue>,
}

impl WebServer {
    #[must_use]
    pub fn new(lists: Lists) -> Self {
        Self {
            lists: Arc::new(lists),
            sessions: None,
            strategies: Vec::new(),
            stale_policy: StaleSessionPolicy::default(),
            api: Arc::new(AuthedItemApi),
            paths: ApiPaths::default(),
            admin_ui: None,
            cors_origins: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_sessions(mut self, sessions: SessionConfig) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Register an authentication strategy; any strategy turns the identity layers on.
    #[must_use]
    pub fn with_auth_strategy(mut self, strategy: Arc<dyn AuthStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    #[must_use]
    pub fn with_stale_session_policy(mut self, policy: StaleSessionPolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    #[must_use]
    pub fn with_api(mut self, api: Arc<dyn ApiMiddleware>) -> Self {
        self.api = api;
        self
    }

    #[must_use]
    pub fn with_paths(mut self, paths: ApiPaths) -> Self {
        self.paths = paths;
        self
    }

    #[must_use]
    pub fn with_admin_ui(mut self, admin_ui: Arc<dyn AdminUi>) -> Self {
        self.admin_ui = Some(admin_ui);
        self
    }

    /// Allowed CORS origins; when empty the request origin is mirrored.
    #[must_use]
    pub fn with_cors_origins(mut self, origins: Vec<HeaderValue>) -> Self {
        self.cors_origins = origins;
        self
    }

    #[must_use]
    pub fn lists(&self) -> &Lists {
        &self.lists
    }

    #[must_use]
    pub fn auth_enabled(&self) -> bool {
        !self.strategies.is_empty()
    }

    /// Assemble the application router.
    ///
    /// # Errors
    /// Returns `Error::Config` for invalid or overlapping paths (including the
    /// admin UI's own path), for strategies
    /// without a session configuration, and for admin session routes without a
    /// strategy.
    pub fn router(&self) -> Result<Router> {
        self.paths.validate()?;
        if let Some(admin_ui) = &self.admin_ui {
            admin_ui.validate()?;
        }

        let mut claimed: HashMap<String, Stage> = HashMap::new();
        let mut router = Router::new();

        for stage in STAGES {
            match stage {
                Stage::Landing => {
                    let mount = Mount::new(
                        Router::new()
                            .route("/", get(root::root))
                            .route("/health", get(health::health).options(health::health)),
                    )
                    .claiming("/")
                    .claiming("/health");
                    router = merge(router, mount, stage, &mut claimed)?;
                }
                Stage::AdminSession => {
                    let Some(mount) = self.admin_ui.as_ref().and_then(|ui| ui.session_routes())
                    else {
                        continue;
                    };
                    if !self.auth_enabled() {
                        return Err(Error::Config(
                            "admin session routes require an authentication strategy".to_string(),
                        ));
                    }
                    router = merge(router, mount, stage, &mut claimed)?;
                }
                Stage::Api => {
                    let mount = self.api.mount(&self.paths);
                    router = merge(router, mount, stage, &mut claimed)?;
                }
                Stage::AdminUi => {
                    if let Some(admin_ui) = &self.admin_ui {
                        router = router.fallback_service(admin_ui.catch_all());
                    }
                }
            }
        }

        // Each layer wraps the previous ones: requests see bearer translation,
        // then session resolution, then item population.
        if self.auth_enabled() {
            let sessions = self.sessions.clone().ok_or_else(|| {
                Error::Config("authentication strategies require a session store".to_string())
            })?;
            let ctx = AuthContext::new(self.lists.clone(), self.stale_policy);
            router = router
                .layer(from_fn_with_state(ctx, auth::populate))
                .layer(from_fn_with_state(sessions.clone(), session::resolve))
                .layer(from_fn_with_state(sessions.signer().clone(), bearer::translate));
        }

        Ok(router.layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID_HEADER,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(self.cors_layer()),
        ))
    }

    fn cors_layer(&self) -> CorsLayer {
        let origin = if self.cors_origins.is_empty() {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::list(self.cors_origins.clone())
        };

        CorsLayer::new()
            .allow_headers([CONTENT_TYPE, AUTHORIZATION])
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_origin(origin)
            .allow_credentials(true)
    }

    /// Build the router and bind the listener.
    ///
    /// # Errors
    /// Returns `Error::Config` from [`WebServer::router`] or `Error::Bind` if the
    /// address cannot be bound.
    pub async fn bind(self, addr: SocketAddr) -> Result<Server> {
        let app = self.router()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;

        info!("Listening on {}", local_addr);

        Ok(Server {
            listener,
            app,
            local_addr,
        })
    }
}

fn merge(
    router: Router,
    mount: Mount,
    stage: Stage,
    claimed: &mut HashMap<String, Stage>,
) -> Result<Router> {
    for path in &mount.paths {
        if let Some(owner) = claimed.insert(path.clone(), stage) {
            return Err(Error::Config(format!(
                "{stage:?} routes conflict with {owner:?} routes on {path}"
            )));
        }
    }
    Ok(router.merge(mount.router))
}

/// A bound server, ready to serve.
pub struct Server {
    listener: TcpListener,
    app: Router,
    local_addr: SocketAddr,
}

impl Server {
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Serve requests until `shutdown` resolves.
    ///
    /// # Errors
    /// Returns `Error::Serve` if the server fails.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(Error::Serve)
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
