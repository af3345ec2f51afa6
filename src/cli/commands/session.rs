use crate::auth::StaleSessionPolicy;
use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;
use std::time::Duration;

pub const ARG_COOKIE_SECRET: &str = "cookie-secret";
pub const ARG_SESSION_MAX_AGE: &str = "session-max-age-seconds";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_STALE_SESSION_POLICY: &str = "stale-session-policy";

#[derive(Debug)]
pub struct Options {
    /// Signing secrets, newest first.
    pub cookie_secrets: Vec<SecretString>,
    pub max_age: Option<Duration>,
    pub secure: bool,
    pub stale_session_policy: StaleSessionPolicy,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the stale session policy is invalid.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let cookie_secrets = matches
            .get_many::<String>(ARG_COOKIE_SECRET)
            .map(|values| {
                values
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| SecretString::from(v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let max_age = matches
            .get_one::<u64>(ARG_SESSION_MAX_AGE)
            .copied()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let stale_session_policy = matches
            .get_one::<String>(ARG_STALE_SESSION_POLICY)
            .map(|value| value.parse::<StaleSessionPolicy>())
            .transpose()
            .map_err(anyhow::Error::msg)
            .context("invalid --stale-session-policy")?
            .unwrap_or_default();

        Ok(Self {
            cookie_secrets,
            max_age,
            secure: matches.get_flag(ARG_COOKIE_SECURE),
            stale_session_policy,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_COOKIE_SECRET)
                .long(ARG_COOKIE_SECRET)
                .help("Secret used to sign session cookies (repeat or comma separate to rotate)")
                .long_help(
                    "Secret used to sign session cookies. The first value signs new cookies; every value is accepted when verifying, so older secrets can be kept while rotating.",
                )
                .env("KEYSTONE_COOKIE_SECRET")
                .hide_env_values(true)
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new(ARG_SESSION_MAX_AGE)
                .long(ARG_SESSION_MAX_AGE)
                .help("Session cookie Max-Age in seconds, 0 for a browser session cookie")
                .env("KEYSTONE_SESSION_MAX_AGE_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure")
                .env("KEYSTONE_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_STALE_SESSION_POLICY)
                .long(ARG_STALE_SESSION_POLICY)
                .help("What to do when a session names a missing item")
                .env("KEYSTONE_STALE_SESSION_POLICY")
                .default_value(StaleSessionPolicy::default().as_str())
                .value_parser([
                    StaleSessionPolicy::Ignore.as_str(),
                    StaleSessionPolicy::Regenerate.as_str(),
                ]),
        )
}
