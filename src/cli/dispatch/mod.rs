//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action to run, such as starting the web
//! server with its full configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{self, admin, lists, session};
use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv6Addr};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    commands::validate(matches).map_err(|e| anyhow::anyhow!(e))?;

    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(3000);
    let listen_address = matches
        .get_one::<IpAddr>(commands::ARG_LISTEN_ADDRESS)
        .copied()
        .unwrap_or(IpAddr::V6(Ipv6Addr::UNSPECIFIED));
    let cors_origins = matches
        .get_many::<String>(commands::ARG_CORS_ORIGIN)
        .map(|values| {
            values
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let session_opts = session::Options::parse(matches).context("invalid session arguments")?;
    let admin_opts = admin::Options::parse(matches)?;
    let list_opts = lists::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        listen_address,
        cors_origins,
        cookie_secrets: session_opts.cookie_secrets,
        session_max_age: session_opts.max_age,
        cookie_secure: session_opts.secure,
        stale_session_policy: session_opts.stale_session_policy,
        api_path: admin_opts.api_path,
        graphiql_path: admin_opts.graphiql_path,
        admin_path: admin_opts.admin_path,
        admin_static_dir: admin_opts.admin_static_dir,
        admin_ui: admin_opts.admin_ui,
        seed: list_opts.seed,
        auth_list: list_opts.auth_list,
        identity_field: list_opts.identity_field,
        secret_field: list_opts.secret_field,
    }))
}
