pub mod admin;
pub mod lists;
pub mod logging;
pub mod session;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ArgMatches, ColorChoice, Command,
};
use std::net::IpAddr;

pub const ARG_PORT: &str = "port";
pub const ARG_LISTEN_ADDRESS: &str = "listen-address";
pub const ARG_CORS_ORIGIN: &str = "cors-origin";

/// Check arguments that only make sense together.
///
/// # Errors
/// Returns an error string if an authentication list is set without a cookie secret.
pub fn validate(matches: &ArgMatches) -> Result<(), String> {
    let auth_list = matches
        .get_one::<String>(lists::ARG_AUTH_LIST)
        .filter(|v| !v.trim().is_empty());
    let has_secret = matches
        .get_many::<String>(session::ARG_COOKIE_SECRET)
        .is_some_and(|mut values| values.any(|v| !v.trim().is_empty()));

    if auth_list.is_some() && !has_secret {
        return Err(format!(
            "Missing required argument: --{} (required with --{})",
            session::ARG_COOKIE_SECRET,
            lists::ARG_AUTH_LIST
        ));
    }
    Ok(())
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("keystone")
        .about("Content management web server")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("3000")
                .env("KEYSTONE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_LISTEN_ADDRESS)
                .long(ARG_LISTEN_ADDRESS)
                .help("Address to bind")
                .default_value("::")
                .env("KEYSTONE_LISTEN_ADDRESS")
                .value_parser(clap::value_parser!(IpAddr)),
        )
        .arg(
            Arg::new(ARG_CORS_ORIGIN)
                .long(ARG_CORS_ORIGIN)
                .help("Allowed CORS origin (repeatable); the request origin is mirrored when unset")
                .env("KEYSTONE_CORS_ORIGIN")
                .value_delimiter(',')
                .action(ArgAction::Append),
        );

    let command = session::with_args(command);
    let command = admin::with_args(command);
    let command = lists::with_args(command);
    logging::with_args(command)
}
