use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::credentials::{DEFAULT_TOKEN_TTL_SECONDS, MAX_TOKEN_TTL_SECONDS};

pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";

/// Deployment environment; production refuses to start without a signing secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug)]
pub struct Options {
    pub environment: Environment,
    pub jwt_secret: Option<SecretString>,
    pub token_ttl_seconds: i64,
    pub frontend_base_url: String,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let environment = match matches
            .get_one::<String>(ARG_ENVIRONMENT)
            .map(String::as_str)
        {
            Some("production") => Environment::Production,
            _ => Environment::Development,
        };

        // Helper to filter empty strings which clap might pass through if env vars are set to ""
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.clone()));

        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_FRONTEND_BASE_URL}"))?;

        Ok(Self {
            environment,
            jwt_secret,
            token_ttl_seconds: matches
                .get_one::<i64>(ARG_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS),
            frontend_base_url,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long(ARG_ENVIRONMENT)
                .help("Deployment environment")
                .env("NOTELY_ENVIRONMENT")
                .default_value("development")
                .value_parser(["development", "production"]),
        )
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign bearer tokens (HS256)")
                .long_help(
                    "Secret used to sign bearer tokens (HS256). Required in production; development falls back to a fixed key.",
                )
                .env("NOTELY_JWT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Bearer token lifetime in seconds (at most 365 days)")
                .env("NOTELY_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for CORS and OAuth redirects")
                .env("NOTELY_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
}
