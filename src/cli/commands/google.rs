use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::api::handlers::auth::GoogleConfig;

pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_CLIENT_SECRET: &str = "google-client-secret";
pub const ARG_GOOGLE_CALLBACK_URL: &str = "google-callback-url";

#[derive(Debug)]
pub struct Options {
    /// `None` when Google sign-in is disabled.
    pub google: Option<GoogleConfig>,
}

impl Options {
    /// Parse Google OAuth arguments. Sign-in is enabled only when the client id
    /// and secret are both set.
    ///
    /// # Errors
    /// Returns an error if only one of the client id and secret is set.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let google = match (
            get_non_empty(ARG_GOOGLE_CLIENT_ID),
            get_non_empty(ARG_GOOGLE_CLIENT_SECRET),
        ) {
            (Some(client_id), Some(client_secret)) => {
                let callback_url = get_non_empty(ARG_GOOGLE_CALLBACK_URL).ok_or_else(|| {
                    anyhow::anyhow!("missing required argument: --{ARG_GOOGLE_CALLBACK_URL}")
                })?;
                Some(GoogleConfig::new(
                    client_id,
                    SecretString::from(client_secret),
                    callback_url,
                ))
            }
            (None, None) => None,
            (Some(_), None) => {
                anyhow::bail!("missing required argument: --{ARG_GOOGLE_CLIENT_SECRET}")
            }
            (None, Some(_)) => {
                anyhow::bail!("missing required argument: --{ARG_GOOGLE_CLIENT_ID}")
            }
        };

        Ok(Self { google })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("Google OAuth client id; enables Google sign-in together with the secret")
                .env("NOTELY_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_SECRET)
                .long(ARG_GOOGLE_CLIENT_SECRET)
                .help("Google OAuth client secret")
                .env("NOTELY_GOOGLE_CLIENT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CALLBACK_URL)
                .long(ARG_GOOGLE_CALLBACK_URL)
                .help("Redirect URI registered with Google")
                .env("NOTELY_GOOGLE_CALLBACK_URL")
                .default_value("http://localhost:8080/auth/google/callback"),
        )
}
