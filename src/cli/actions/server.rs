use crate::{
    api::{config::origin_header, handlers::admin::AdminApp, ApiPaths, WebServer},
    auth::{AuthStrategy, PasswordAuthStrategy, StaleSessionPolicy},
    cli::{seed, telemetry},
    lists::Lists,
    session::{CookiePolicy, CookieSigner, MemoryStore, SessionConfig},
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub listen_address: IpAddr,
    pub cors_origins: Vec<String>,
    pub cookie_secrets: Vec<SecretString>,
    pub session_max_age: Option<Duration>,
    pub cookie_secure: bool,
    pub stale_session_policy: StaleSessionPolicy,
    pub api_path: String,
    pub graphiql_path: String,
    pub admin_path: String,
    pub admin_static_dir: Option<PathBuf>,
    pub admin_ui: bool,
    pub seed: Option<PathBuf>,
    pub auth_list: Option<String>,
    pub identity_field: String,
    pub secret_field: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the seed cannot be loaded, the configuration is
/// inconsistent, or the server fails to bind or serve.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let addr = SocketAddr::new(args.listen_address, args.port);
    let server = build(args)?;

    let server = server
        .bind(addr)
        .await
        .with_context(|| format!("Failed to start server on {addr}"))?;

    info!("Keystone ready on port {}", server.port());

    let result = server.serve(shutdown_signal()).await;

    telemetry::shutdown_tracer();

    result.context("Server error")
}

/// Assemble the web server from parsed arguments.
///
/// # Errors
/// Returns an error if the seed, cookie secrets, origins or paths are invalid.
pub fn build(args: Args) -> Result<WebServer> {
    let lists = match &args.seed {
        Some(path) => {
            let seed = seed::load(path)?;
            seed::into_lists(seed, args.auth_list.as_deref(), &args.secret_field)?
        }
        None if args.auth_list.is_some() => {
            return Err(anyhow!("--auth-list requires a --seed file defining the list"));
        }
        None => Lists::new(),
    };

    let strategy: Option<Arc<dyn AuthStrategy>> = match &args.auth_list {
        Some(key) => {
            let list = lists
                .get(key)
                .cloned()
                .ok_or_else(|| anyhow!("authentication list {key} is not registered"))?;
            Some(Arc::new(
                PasswordAuthStrategy::new(list)
                    .with_identity_field(args.identity_field.as_str())
                    .with_secret_field(args.secret_field.as_str()),
            ))
        }
        None => None,
    };

    let cors_origins = args
        .cors_origins
        .iter()
        .map(|origin| origin_header(origin))
        .collect::<crate::Result<Vec<_>>>()
        .context("Invalid --cors-origin")?;

    let mut server = WebServer::new(lists)
        .with_paths(ApiPaths {
            api_path: args.api_path,
            graphiql_path: args.graphiql_path,
        })
        .with_stale_session_policy(args.stale_session_policy)
        .with_cors_origins(cors_origins);

    if let Some(strategy) = &strategy {
        let signer = CookieSigner::new(args.cookie_secrets).context("Invalid --cookie-secret")?;
        let store = Arc::new(MemoryStore::new());
        spawn_session_pruner(store.clone());
        let policy = CookiePolicy {
            max_age: args.session_max_age,
            secure: args.cookie_secure,
        };
        server = server
            .with_sessions(SessionConfig::new(store, signer, policy))
            .with_auth_strategy(strategy.clone());
    } else if !args.cookie_secrets.is_empty() {
        warn!("--cookie-secret is ignored without --auth-list");
    }

    if args.admin_ui {
        let mut admin = AdminApp::new(args.admin_path);
        if let Some(strategy) = strategy {
            admin = admin.with_auth_strategy(strategy);
        }
        if let Some(dir) = args.admin_static_dir {
            admin = admin.with_static_dir(dir);
        }
        server = server.with_admin_ui(Arc::new(admin));
    }

    // Surface path conflicts before binding.
    server.router().context("Invalid server configuration")?;

    Ok(server)
}

fn spawn_session_pruner(store: Arc<MemoryStore>) {
    if tokio::runtime::Handle::try_current().is_err() {
        return;
    }
    tokio::spawn(async move {
        let mut ticker = interval(SESSION_PRUNE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let pruned = store.prune_expired().await;
            if pruned > 0 {
                debug!("pruned {} expired sessions", pruned);
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn log_startup_args(args: &Args) {
    debug!(
        port = args.port,
        listen_address = %args.listen_address,
        api_path = %args.api_path,
        graphiql_path = %args.graphiql_path,
        admin_path = %args.admin_path,
        admin_ui = args.admin_ui,
        auth_list = ?args.auth_list,
        seed = ?args.seed,
        cookie_secrets = args.cookie_secrets.len(),
        stale_session_policy = args.stale_session_policy.as_str(),
        "Startup configuration"
    );
}
