use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_SEED: &str = "seed";
pub const ARG_AUTH_LIST: &str = "auth-list";
pub const ARG_IDENTITY_FIELD: &str = "identity-field";
pub const ARG_SECRET_FIELD: &str = "secret-field";

#[derive(Debug, Clone)]
pub struct Options {
    pub seed: Option<PathBuf>,
    pub auth_list: Option<String>,
    pub identity_field: String,
    pub secret_field: String,
}

impl Options {
    /// Parse list and authentication arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the identity and secret fields are the same.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let identity_field =
            get_non_empty(ARG_IDENTITY_FIELD).unwrap_or_else(|| "email".to_string());
        let secret_field = get_non_empty(ARG_SECRET_FIELD).unwrap_or_else(|| "password".to_string());
        if identity_field == secret_field {
            anyhow::bail!(
                "--{ARG_IDENTITY_FIELD} and --{ARG_SECRET_FIELD} must differ: {identity_field}"
            );
        }

        Ok(Self {
            seed: matches.get_one::<PathBuf>(ARG_SEED).cloned(),
            auth_list: get_non_empty(ARG_AUTH_LIST),
            identity_field,
            secret_field,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SEED)
                .long(ARG_SEED)
                .help("JSON file with the initial items of each list")
                .long_help(
                    "JSON file mapping list keys to arrays of items, e.g. {\"User\": [{\"id\": \"1\", \"email\": \"ada@example.com\", \"password\": \"...\"}]}.\n\nItems are held in memory. Plain text secrets of the authentication list are hashed when loading.",
                )
                .env("KEYSTONE_SEED")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_AUTH_LIST)
                .long(ARG_AUTH_LIST)
                .help("List whose items can sign in; enables sessions")
                .env("KEYSTONE_AUTH_LIST"),
        )
        .arg(
            Arg::new(ARG_IDENTITY_FIELD)
                .long(ARG_IDENTITY_FIELD)
                .help("Field matched against the sign in identity")
                .env("KEYSTONE_IDENTITY_FIELD")
                .default_value("email"),
        )
        .arg(
            Arg::new(ARG_SECRET_FIELD)
                .long(ARG_SECRET_FIELD)
                .help("Field holding the Argon2 secret hash")
                .env("KEYSTONE_SECRET_FIELD")
                .default_value("password"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 4] = [
        "KEYSTONE_SEED",
        "KEYSTONE_AUTH_LIST",
        "KEYSTONE_IDENTITY_FIELD",
        "KEYSTONE_SECRET_FIELD",
    ];

    #[test]
    fn defaults() {
        temp_env::with_vars_unset(VARS, || {
            let matches = with_args(Command::new("test")).get_matches_from(vec!["test"]);
            let options = Options::parse(&matches).expect("list options");
            assert_eq!(options.seed, None);
            assert_eq!(options.auth_list, None);
            assert_eq!(options.identity_field, "email");
            assert_eq!(options.secret_field, "password");
        });
    }

    #[test]
    fn identity_and_secret_must_differ() {
        temp_env::with_vars_unset(VARS, || {
            let matches = with_args(Command::new("test")).get_matches_from(vec![
                "test",
                "--identity-field",
                "password",
            ]);
            assert!(Options::parse(&matches).is_err());
        });
    }
}
