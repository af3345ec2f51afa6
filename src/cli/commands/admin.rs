use crate::api::config::{
    validate_mount_path, DEFAULT_ADMIN_PATH, DEFAULT_API_PATH, DEFAULT_GRAPHIQL_PATH,
};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_API_PATH: &str = "api-path";
pub const ARG_GRAPHIQL_PATH: &str = "graphiql-path";
pub const ARG_ADMIN_PATH: &str = "admin-path";
pub const ARG_ADMIN_STATIC_DIR: &str = "admin-static-dir";
pub const ARG_NO_ADMIN_UI: &str = "no-admin-ui";

#[derive(Debug, Clone)]
pub struct Options {
    pub api_path: String,
    pub graphiql_path: String,
    pub admin_path: String,
    pub admin_static_dir: Option<PathBuf>,
    pub admin_ui: bool,
}

impl Options {
    /// Parse mount path arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a path argument is empty or not a mount path.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let path = |id: &str| -> anyhow::Result<String> {
            match matches.get_one::<String>(id) {
                Some(value) if !value.trim().is_empty() => {
                    let value = value.trim();
                    validate_mount_path(&format!("--{id}"), value)?;
                    Ok(value.to_string())
                }
                _ => anyhow::bail!("missing required argument: --{id}"),
            }
        };

        Ok(Self {
            api_path: path(ARG_API_PATH)?,
            graphiql_path: path(ARG_GRAPHIQL_PATH)?,
            admin_path: path(ARG_ADMIN_PATH)?,
            admin_static_dir: matches.get_one::<PathBuf>(ARG_ADMIN_STATIC_DIR).cloned(),
            admin_ui: !matches.get_flag(ARG_NO_ADMIN_UI),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_PATH)
                .long(ARG_API_PATH)
                .help("Path the API is mounted on")
                .env("KEYSTONE_API_PATH")
                .default_value(DEFAULT_API_PATH),
        )
        .arg(
            Arg::new(ARG_GRAPHIQL_PATH)
                .long(ARG_GRAPHIQL_PATH)
                .help("Path of the API explorer page")
                .env("KEYSTONE_GRAPHIQL_PATH")
                .default_value(DEFAULT_GRAPHIQL_PATH),
        )
        .arg(
            Arg::new(ARG_ADMIN_PATH)
                .long(ARG_ADMIN_PATH)
                .help("Path prefix of the admin session routes")
                .env("KEYSTONE_ADMIN_PATH")
                .default_value(DEFAULT_ADMIN_PATH),
        )
        .arg(
            Arg::new(ARG_ADMIN_STATIC_DIR)
                .long(ARG_ADMIN_STATIC_DIR)
                .help("Directory with a prebuilt admin UI (index.html is the fallback)")
                .env("KEYSTONE_ADMIN_STATIC_DIR")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_NO_ADMIN_UI)
                .long(ARG_NO_ADMIN_UI)
                .help("Serve the API without the admin UI")
                .env("KEYSTONE_NO_ADMIN_UI")
                .action(ArgAction::SetTrue)
                .conflicts_with(ARG_ADMIN_STATIC_DIR),
        )
}
