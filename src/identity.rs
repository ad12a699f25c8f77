//! Identity resolution: password accounts and Google-linked accounts.
//!
//! Flow Overview:
//! 1) Normalize the email (trim + lower-case) before any lookup.
//! 2) Validate input and pre-check uniqueness, then write.
//! 3) Re-map unique-constraint races raised by the store to `Conflict`, or
//!    re-read the winning row for OAuth logins.
//!
//! Login failures always report the same message so callers cannot tell an
//! unknown email from a wrong password.

use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    credentials::{MIN_PASSWORD_LENGTH, UNMATCHABLE_PASSWORD_HASH, hash_password, verify_password},
    error::{Error, Result},
    store::{NewUser, StoreError, User, UserStore},
};

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const UNVERIFIED_PROVIDER_EMAIL: &str = "Provider email is not verified";

/// Lightweight email sanity check run before persisting data.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalize_name(name: Option<&str>) -> Option<String> {
    name.map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
}

/// Profile returned by an external identity provider.
#[derive(Debug, Clone)]
pub struct ExternalProfile {
    /// Provider-scoped subject id (Google `id`).
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    /// Whether the provider vouches for `email`.
    pub email_verified: bool,
}

#[derive(Clone)]
pub struct IdentityService {
    users: Arc<dyn UserStore>,
}

impl IdentityService {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Create a password account.
    ///
    /// # Errors
    /// `InvalidInput` for a malformed email or short password, `Conflict` when
    /// the email is already registered.
    #[instrument(skip(self, password, name))]
    pub async fn register_with_password(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<User> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(Error::invalid_input("Please provide a valid email"));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::invalid_input(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            debug!("email already registered");
            return Err(email_taken());
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|err| Error::Internal(format!("password hashing task failed: {err}")))??;

        let new_user = NewUser {
            email,
            name: normalize_name(name),
            password_hash: Some(password_hash),
            google_id: None,
        };
        match self.users.insert(new_user).await {
            Ok(user) => {
                info!(user_id = %user.id, "user registered");
                Ok(user)
            }
            Err(StoreError::UniqueViolation(constraint)) => {
                debug!("registration lost a race on {constraint}");
                Err(email_taken())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Authenticate with email and password.
    ///
    /// # Errors
    /// `Unauthenticated` with [`INVALID_CREDENTIALS`] for an unknown email, an
    /// account without a password, or a wrong password.
    #[instrument(skip(self, password))]
    pub async fn login_with_password(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(Error::invalid_input("Email and password are required"));
        }

        let credentials = self.users.find_credentials(&email).await?;
        let stored_hash = credentials
            .as_ref()
            .and_then(|credentials| credentials.password_hash.clone());
        if let Some(credentials) = &credentials {
            if stored_hash.is_none() {
                debug!(user_id = %credentials.user.id, "password login on an OAuth-only account");
            }
        }

        // Unknown emails and password-less accounts still pay for one Argon2 run.
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || {
            verify_password(
                &password,
                stored_hash.as_deref().unwrap_or(UNMATCHABLE_PASSWORD_HASH),
            )
        })
        .await
        .map_err(|err| Error::Internal(format!("password verification task failed: {err}")))?;

        match credentials {
            Some(credentials) if matches && credentials.password_hash.is_some() => {
                Ok(credentials.user)
            }
            _ => Err(Error::unauthenticated(INVALID_CREDENTIALS)),
        }
    }

    /// Map a Google profile to a user, linking or creating one as needed.
    ///
    /// Lookup order: linked Google id, then normalized email (linking the id
    /// when that user has none), then a new password-less user. Only the
    /// linked-id lookup accepts a profile whose email the provider has not
    /// verified.
    ///
    /// # Errors
    /// `InvalidInput` when the profile has no usable email or id,
    /// `Unauthenticated` when an unlinked profile carries an unverified email.
    #[instrument(skip(self, profile), fields(google_id = %profile.id))]
    pub async fn resolve_external_identity(&self, profile: &ExternalProfile) -> Result<User> {
        let email = normalize_email(&profile.email);
        let google_id = profile.id.trim();
        if google_id.is_empty() || !valid_email(&email) {
            return Err(Error::invalid_input("Provider profile is missing an id or email"));
        }

        if let Some(user) = self.users.find_by_google_id(google_id).await? {
            return Ok(user);
        }

        if !profile.email_verified {
            warn!("refusing google profile with an unverified email");
            return Err(Error::unauthenticated(UNVERIFIED_PROVIDER_EMAIL));
        }

        if let Some(user) = self.users.find_by_email(&email).await? {
            if user.google_id.is_some() {
                return Ok(user);
            }
            return match self.users.link_google_id(user.id, google_id).await {
                Ok(Some(linked)) => {
                    info!(user_id = %linked.id, "linked google account");
                    Ok(linked)
                }
                Ok(None) | Err(StoreError::UniqueViolation(_)) => {
                    self.reread(google_id, &email).await
                }
                Err(err) => Err(err.into()),
            };
        }

        let new_user = NewUser {
            email: email.clone(),
            name: normalize_name(profile.name.as_deref()),
            password_hash: None,
            google_id: Some(google_id.to_string()),
        };
        match self.users.insert(new_user).await {
            Ok(user) => {
                info!(user_id = %user.id, "user created from google profile");
                Ok(user)
            }
            Err(StoreError::UniqueViolation(constraint)) => {
                debug!("google sign-up lost a race on {constraint}");
                self.reread(google_id, &email).await
            }
            Err(err) => Err(err.into()),
        }
    }

    /// # Errors
    /// Returns `Internal` when the store fails.
    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.find_by_id(id).await?)
    }

    async fn reread(&self, google_id: &str, email: &str) -> Result<User> {
        if let Some(user) = self.users.find_by_google_id(google_id).await? {
            return Ok(user);
        }
        if let Some(user) = self.users.find_by_email(email).await? {
            return Ok(user);
        }
        warn!("google identity vanished after a conflicting write");
        Err(Error::Internal(
            "failed to resolve external identity".to_string(),
        ))
    }
}

fn email_taken() -> Error {
    Error::Conflict("User already exists with this email".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn service() -> (IdentityService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (IdentityService::new(store.clone()), store)
    }

    fn profile(id: &str, email: &str) -> ExternalProfile {
        ExternalProfile {
            id: id.to_string(),
            email: email.to_string(),
            name: Some("Ada".to_string()),
            email_verified: true,
        }
    }

    #[test]
    fn email_validation() {
        assert!(valid_email("ada@example.com"));
        assert!(!valid_email("ada@example"));
        assert!(!valid_email("ada example.com"));
        assert!(!valid_email(""));
    }

    #[tokio::test]
    async fn register_normalizes_email_and_hashes_password() {
        let (identity, store) = service();
        let user = identity
            .register_with_password("  Ada@Example.COM ", "secret1", Some("  Ada "))
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.name.as_deref(), Some("Ada"));
        assert!(user.has_password);

        let creds = store.find_credentials("ada@example.com").await.unwrap().unwrap();
        let hash = creds.password_hash.unwrap();
        assert_ne!(hash, "secret1");
        assert!(verify_password("secret1", &hash));
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let (identity, _) = service();
        let err = identity
            .register_with_password("not-an-email", "secret1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = identity
            .register_with_password("ada@example.com", "12345", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_case_insensitively() {
        let (identity, _) = service();
        identity
            .register_with_password("ada@example.com", "secret1", None)
            .await
            .unwrap();
        let err = identity
            .register_with_password("ADA@example.com", "secret2", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn concurrent_registrations_yield_one_conflict() {
        let (identity, _) = service();
        let (first, second) = tokio::join!(
            identity.register_with_password("ada@example.com", "secret1", None),
            identity.register_with_password("Ada@Example.com", "secret1", None),
        );
        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(Error::Conflict(_))))
        );
    }

    #[tokio::test]
    async fn login_failures_share_one_message() {
        let (identity, _) = service();
        identity
            .register_with_password("ada@example.com", "secret1", None)
            .await
            .unwrap();
        identity
            .resolve_external_identity(&profile("g-1", "grace@example.com"))
            .await
            .unwrap();

        let user = identity
            .login_with_password("ADA@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");

        for (email, password) in [
            ("ada@example.com", "wrong-password"),
            ("nobody@example.com", "secret1"),
            ("grace@example.com", "secret1"),
        ] {
            let err = identity.login_with_password(email, password).await.unwrap_err();
            match err {
                Error::Unauthenticated(message) => assert_eq!(message, INVALID_CREDENTIALS),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn external_identity_creates_then_reuses() {
        let (identity, _) = service();
        let created = identity
            .resolve_external_identity(&profile("g-1", "Grace@Example.com"))
            .await
            .unwrap();
        assert_eq!(created.email, "grace@example.com");
        assert_eq!(created.google_id.as_deref(), Some("g-1"));
        assert!(!created.has_password);

        let again = identity
            .resolve_external_identity(&profile("g-1", "grace@example.com"))
            .await
            .unwrap();
        assert_eq!(again.id, created.id);
    }

    #[tokio::test]
    async fn external_identity_links_existing_password_account() {
        let (identity, _) = service();
        let registered = identity
            .register_with_password("ada@example.com", "secret1", None)
            .await
            .unwrap();
        let resolved = identity
            .resolve_external_identity(&profile("g-9", "ada@example.com"))
            .await
            .unwrap();
        assert_eq!(resolved.id, registered.id);
        assert_eq!(resolved.google_id.as_deref(), Some("g-9"));
        assert!(resolved.has_password);

        // The password keeps working after linking.
        assert!(
            identity
                .login_with_password("ada@example.com", "secret1")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn unknown_email_costs_a_password_verification() {
        let (identity, _) = service();
        identity
            .register_with_password("ada@example.com", "secret1", None)
            .await
            .unwrap();

        let started = std::time::Instant::now();
        assert!(
            identity
                .login_with_password("ada@example.com", "wrong-password")
                .await
                .is_err()
        );
        let known = started.elapsed();

        let started = std::time::Instant::now();
        assert!(
            identity
                .login_with_password("nobody@example.com", "wrong-password")
                .await
                .is_err()
        );
        let unknown = started.elapsed();

        // Both paths run one Argon2 verification with the same parameters.
        assert!(
            unknown * 4 >= known,
            "unknown email took {unknown:?}, known email took {known:?}"
        );
    }

    #[tokio::test]
    async fn unverified_google_email_never_links_or_creates() {
        let (identity, store) = service();
        let registered = identity
            .register_with_password("ada@example.com", "secret1", None)
            .await
            .unwrap();

        let mut unverified = profile("g-evil", "ada@example.com");
        unverified.email_verified = false;
        let err = identity.resolve_external_identity(&unverified).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(ref message) if message == UNVERIFIED_PROVIDER_EMAIL));
        assert_eq!(
            store.find_by_id(registered.id).await.unwrap().unwrap().google_id,
            None
        );

        let mut stranger = profile("g-new", "new@example.com");
        stranger.email_verified = false;
        assert!(identity.resolve_external_identity(&stranger).await.is_err());
        assert_eq!(store.find_by_email("new@example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn linked_google_id_signs_in_regardless_of_verification() {
        let (identity, _) = service();
        let created = identity
            .resolve_external_identity(&profile("g-1", "grace@example.com"))
            .await
            .unwrap();
        let mut later = profile("g-1", "grace@example.com");
        later.email_verified = false;
        let again = identity.resolve_external_identity(&later).await.unwrap();
        assert_eq!(again.id, created.id);
    }

    #[tokio::test]
    async fn find_user_by_id() {
        let (identity, _) = service();
        let user = identity
            .register_with_password("ada@example.com", "secret1", None)
            .await
            .unwrap();
        assert_eq!(identity.find_user(user.id).await.unwrap(), Some(user));
        assert_eq!(identity.find_user(Uuid::new_v4()).await.unwrap(), None);
    }
}
