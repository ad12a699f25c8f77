//! Auth state and configuration.

use anyhow::{Context, Result};
use url::Url;

use super::google::{GoogleConfig, GoogleOAuth};
use crate::credentials::TokenKeys;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    google: Option<GoogleConfig>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        // Ensure the base does not end with a slash so paths can be appended.
        let frontend_base_url = frontend_base_url.trim_end_matches('/').to_string();
        Self {
            frontend_base_url,
            google: None,
        }
    }

    #[must_use]
    pub fn with_google(mut self, google: GoogleConfig) -> Self {
        self.google = Some(google);
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn google(&self) -> Option<&GoogleConfig> {
        self.google.as_ref()
    }

    /// `{frontend}{path}` with the given query pairs appended.
    ///
    /// # Errors
    /// Returns an error if the frontend base URL does not parse.
    pub fn frontend_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{path}", self.frontend_base_url))
            .with_context(|| format!("Invalid frontend base URL: {}", self.frontend_base_url))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

pub struct AuthState {
    config: AuthConfig,
    keys: TokenKeys,
    google: Option<GoogleOAuth>,
}

impl AuthState {
    /// Build the shared auth state, setting up the Google client when configured.
    ///
    /// # Errors
    /// Returns an error if the Google endpoints or callback URL are invalid.
    pub fn new(config: AuthConfig, keys: TokenKeys) -> Result<Self> {
        let google = config
            .google()
            .map(GoogleOAuth::new)
            .transpose()
            .context("Failed to configure Google OAuth")?;
        Ok(Self {
            config,
            keys,
            google,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    #[must_use]
    pub fn google(&self) -> Option<&GoogleOAuth> {
        self.google.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthConfig, AuthState};
    use crate::api::handlers::auth::google::GoogleConfig;
    use crate::credentials::TokenKeys;
    use secrecy::SecretString;

    #[test]
    fn auth_config_trims_trailing_slash() {
        let config = AuthConfig::new("https://notely.dev/".to_string());
        assert_eq!(config.frontend_base_url(), "https://notely.dev");
        assert!(config.google().is_none());
    }

    #[test]
    fn frontend_url_encodes_query() {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        let url = config
            .frontend_url("/login", &[("error", "google_auth_failed")])
            .map(String::from)
            .unwrap_or_default();
        assert_eq!(url, "http://localhost:3000/login?error=google_auth_failed");
    }

    #[test]
    fn google_is_optional() {
        let state = AuthState::new(
            AuthConfig::new("http://localhost:3000".to_string()),
            TokenKeys::development(),
        );
        assert!(state.is_ok_and(|state| state.google().is_none()));

        let config = AuthConfig::new("http://localhost:3000".to_string()).with_google(
            GoogleConfig::new(
                "client-id".to_string(),
                SecretString::from("client-secret".to_string()),
                "http://localhost:8080/auth/google/callback".to_string(),
            ),
        );
        let state = AuthState::new(config, TokenKeys::development());
        assert!(state.is_ok_and(|state| state.google().is_some()));
    }

    #[test]
    fn invalid_callback_url_fails() {
        let config = AuthConfig::new("http://localhost:3000".to_string()).with_google(
            GoogleConfig::new(
                "client-id".to_string(),
                SecretString::from("client-secret".to_string()),
                "not a url".to_string(),
            ),
        );
        assert!(AuthState::new(config, TokenKeys::development()).is_err());
    }
}
