//! Google OAuth 2.0 sign-in (authorization code flow with PKCE).
//!
//! Flow Overview:
//! 1) `GET /auth/google` builds the consent URL with a random CSRF state and
//!    PKCE challenge; the verifier is kept in memory keyed by that state.
//! 2) `GET /auth/google/callback` takes the verifier for the returned state
//!    (single use, 10-minute TTL), exchanges the code, fetches the userinfo
//!    profile, resolves it to a user and redirects to the frontend with a token.
//! 3) Any failure redirects to `GET /auth/google/failure`, which sends the
//!    browser to the frontend login page with an error marker.

use axum::{
    extract::{Extension, Query},
    response::{IntoResponse, Redirect, Response},
};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
    basic::BasicClient,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{debug, error, instrument, warn};
use utoipa::IntoParams;

use super::state::AuthState;
use crate::identity::{ExternalProfile, IdentityService};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const PENDING_TTL: Duration = Duration::from_secs(10 * 60);
const MAX_PENDING_AUTHORIZATIONS: usize = 10_000;
pub const FAILURE_PATH: &str = "/auth/google/failure";

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

#[derive(Clone)]
pub struct GoogleConfig {
    client_id: String,
    client_secret: SecretString,
    callback_url: String,
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

impl GoogleConfig {
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString, callback_url: String) -> Self {
        Self {
            client_id,
            client_secret,
            callback_url,
        }
    }
}

/// Userinfo response from `googleapis.com/oauth2/v2/userinfo`.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    email: String,
    name: Option<String>,
    #[serde(default)]
    verified_email: bool,
}

struct Pending {
    verifier: String,
    created_at: Instant,
}

/// CSRF state → PKCE verifier for authorizations in flight, bounded to
/// `max_entries`.
pub struct PendingAuthorizations {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, Pending>>,
}

impl PendingAuthorizations {
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Remember `verifier` for `state`, dropping expired entries and then the
    /// oldest ones while the map is full.
    pub async fn insert(&self, state: String, verifier: String) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        while entries.len() >= self.max_entries {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            entries.remove(&oldest);
            debug!("pending authorizations full, evicted the oldest state");
        }
        entries.insert(
            state,
            Pending {
                verifier,
                created_at: Instant::now(),
            },
        );
    }

    /// Remove and return the verifier for `state` if it has not expired.
    pub async fn take(&self, state: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        match entries.remove(state) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => Some(entry.verifier),
            _ => None,
        }
    }
}

pub struct GoogleOAuth {
    client: ConfiguredClient,
    http: reqwest::Client,
    pending: PendingAuthorizations,
}

impl GoogleOAuth {
    /// # Errors
    /// Returns an error if an endpoint or the callback URL does not parse, or
    /// the HTTP client cannot be built.
    pub fn new(config: &GoogleConfig) -> anyhow::Result<Self> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(
                config.client_secret.expose_secret().to_string(),
            ))
            .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string())?)
            .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URL.to_string())?)
            .set_redirect_uri(RedirectUrl::new(config.callback_url.clone())?);

        // The token endpoint must not be allowed to redirect (SSRF).
        let http = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            http,
            pending: PendingAuthorizations::new(PENDING_TTL, MAX_PENDING_AUTHORIZATIONS),
        })
    }

    /// Consent URL requesting `openid email profile`, with PKCE.
    pub async fn authorize_url(&self) -> String {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, csrf_state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        self.pending
            .insert(csrf_state.secret().clone(), pkce_verifier.secret().clone())
            .await;
        url.to_string()
    }

    /// Exchange `code` for an access token and fetch the Google profile.
    async fn exchange(&self, code: &str, state: &str) -> Result<ExternalProfile, String> {
        let verifier = self
            .pending
            .take(state)
            .await
            .ok_or_else(|| "Invalid or expired OAuth state".to_string())?;

        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(verifier))
            .request_async(&self.http)
            .await
            .map_err(|err| format!("Token exchange failed: {err}"))?;

        let google_user: GoogleUser = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(token.access_token().secret())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| format!("Userinfo request failed: {err}"))?
            .json()
            .await
            .map_err(|err| format!("Userinfo response invalid: {err}"))?;

        Ok(ExternalProfile {
            id: google_user.id,
            email: google_user.email,
            name: google_user.name,
            email_verified: google_user.verified_email,
        })
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by Google when the user denies consent.
    pub error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/google",
    responses(
        (status = 303, description = "Redirect to the Google consent screen, or to the failure route when Google sign-in is not configured."),
    ),
    tag = "auth"
)]
pub async fn google_start(Extension(auth): Extension<Arc<AuthState>>) -> Response {
    match auth.google() {
        Some(google) => Redirect::to(&google.authorize_url().await).into_response(),
        None => {
            warn!("Google sign-in requested but not configured");
            Redirect::to(FAILURE_PATH).into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/auth/google/callback",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Redirect to the frontend with a token, or to the failure route."),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn google_callback(
    Extension(auth): Extension<Arc<AuthState>>,
    Extension(identity): Extension<IdentityService>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    match complete_sign_in(&auth, &identity, query).await {
        Ok(location) => Redirect::to(&location).into_response(),
        Err(reason) => {
            error!("Google sign-in failed: {reason}");
            Redirect::to(FAILURE_PATH).into_response()
        }
    }
}

async fn complete_sign_in(
    auth: &AuthState,
    identity: &IdentityService,
    query: CallbackQuery,
) -> Result<String, String> {
    if let Some(error) = query.error {
        return Err(format!("provider returned error: {error}"));
    }
    let google = auth
        .google()
        .ok_or_else(|| "Google sign-in is not configured".to_string())?;
    let (Some(code), Some(state)) = (query.code, query.state) else {
        return Err("missing code or state".to_string());
    };

    let profile = google.exchange(&code, &state).await?;
    let user = identity
        .resolve_external_identity(&profile)
        .await
        .map_err(|err| format!("identity resolution failed: {err}"))?;
    debug!(user_id = %user.id, "google sign-in resolved");

    let token = auth
        .keys()
        .issue(user.id, &user.email)
        .map_err(|err| err.to_string())?;
    auth.config()
        .frontend_url("/auth/callback", &[("token", &token)])
        .map(String::from)
        .map_err(|err| err.to_string())
}

#[utoipa::path(
    get,
    path = "/auth/google/failure",
    responses(
        (status = 303, description = "Redirect to the frontend login page with `error=google_auth_failed`."),
    ),
    tag = "auth"
)]
pub async fn google_failure(Extension(auth): Extension<Arc<AuthState>>) -> Response {
    let fallback = format!(
        "{}/login?error=google_auth_failed",
        auth.config().frontend_base_url()
    );
    let location = auth
        .config()
        .frontend_url("/login", &[("error", "google_auth_failed")])
        .map_or(fallback, String::from);
    Redirect::to(&location).into_response()
}
