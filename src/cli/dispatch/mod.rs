use crate::cli::{
    actions::{
        Action,
        server::{self, Storage},
    },
    commands::{self, auth, google},
};
use anyhow::{Context, Result};

/// Build the [`Action`] for the parsed command line.
///
/// # Errors
/// Returns an error if a required argument is missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let storage = if matches.get_flag(commands::ARG_IN_MEMORY) {
        Storage::Memory
    } else {
        let dsn = matches
            .get_one::<String>(commands::ARG_DSN)
            .cloned()
            .context("missing required argument: --dsn")?;
        Storage::Postgres(dsn)
    };

    let auth = auth::Options::parse(matches)?;
    let google = google::Options::parse(matches)?;

    Ok(Action::Server(server::Args {
        port: matches
            .get_one::<u16>(commands::ARG_PORT)
            .copied()
            .unwrap_or(8080),
        storage,
        environment: auth.environment,
        jwt_secret: auth.jwt_secret,
        token_ttl_seconds: auth.token_ttl_seconds,
        frontend_base_url: auth.frontend_base_url,
        google: google.google,
    }))
}
