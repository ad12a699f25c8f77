use crate::{
    api::{
        self, AppContext,
        handlers::auth::{AuthConfig, AuthState, GoogleConfig},
    },
    cli::{commands::auth::Environment, telemetry},
    credentials::TokenKeys,
    identity::IdentityService,
    notes::NoteService,
    store::{NoteStore, UserStore, memory::MemoryStore, postgres::PgStore},
};
use anyhow::{Context, Result, bail};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

/// Where users and notes are kept.
#[derive(Debug)]
pub enum Storage {
    Memory,
    Postgres(String),
}

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub storage: Storage,
    pub environment: Environment,
    pub jwt_secret: Option<SecretString>,
    pub token_ttl_seconds: i64,
    pub frontend_base_url: String,
    pub google: Option<GoogleConfig>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database cannot be reached, no signing secret is
/// configured in production, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let keys = token_keys(args.jwt_secret, args.environment, args.token_ttl_seconds)?;
    let (users, notes) = open_storage(&args.storage).await?;

    let mut config = AuthConfig::new(args.frontend_base_url);
    if let Some(google) = args.google {
        config = config.with_google(google);
    }
    let auth = AuthState::new(config, keys).context("Failed to configure authentication")?;

    let context = AppContext {
        identity: IdentityService::new(users),
        notes: NoteService::new(notes),
        auth: Arc::new(auth),
    };

    let result = api::new(args.port, context).await;
    telemetry::shutdown_tracer();
    result
}

/// Pick the token signing key for the environment.
///
/// # Errors
/// Returns an error in production when no secret is configured.
pub fn token_keys(
    secret: Option<SecretString>,
    environment: Environment,
    ttl_seconds: i64,
) -> Result<TokenKeys> {
    let keys = match (secret, environment) {
        (Some(secret), _) => TokenKeys::new(secret),
        (None, Environment::Production) => {
            bail!("a JWT signing secret is required in production (--jwt-secret or NOTELY_JWT_SECRET)")
        }
        (None, Environment::Development) => {
            warn!("No JWT secret configured, signing tokens with the development key");
            TokenKeys::development()
        }
    };
    Ok(keys.with_ttl_seconds(ttl_seconds))
}

async fn open_storage(storage: &Storage) -> Result<(Arc<dyn UserStore>, Arc<dyn NoteStore>)> {
    match storage {
        Storage::Memory => {
            let store = Arc::new(MemoryStore::new());
            let users: Arc<dyn UserStore> = store.clone();
            let notes: Arc<dyn NoteStore> = store;
            Ok((users, notes))
        }
        Storage::Postgres(dsn) => {
            let store = PgStore::connect(dsn)
                .await
                .context("Failed to connect to database")?;
            store
                .apply_schema()
                .await
                .context("Failed to apply database schema")?;
            let store = Arc::new(store);
            let users: Arc<dyn UserStore> = store.clone();
            let notes: Arc<dyn NoteStore> = store;
            Ok((users, notes))
        }
    }
}

fn log_startup_args(args: &Args) {
    let storage = match args.storage {
        Storage::Memory => "memory",
        Storage::Postgres(_) => "postgres",
    };
    info!(
        port = args.port,
        storage,
        environment = ?args.environment,
        token_ttl_seconds = args.token_ttl_seconds,
        frontend_base_url = %args.frontend_base_url,
        google_sign_in = args.google.is_some(),
        "Starting notely"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn production_requires_a_secret() {
        assert!(token_keys(None, Environment::Production, 60).is_err());
    }

    #[test]
    fn development_falls_back_to_the_development_key() {
        let keys = token_keys(None, Environment::Development, 60);
        assert!(keys.is_ok());
        if let Ok(keys) = keys {
            assert_eq!(keys.ttl_seconds(), 60);
            let token = keys.issue(Uuid::new_v4(), "a@example.com");
            let verified = token.ok().map(|token| TokenKeys::development().verify(&token));
            assert!(matches!(verified, Some(Ok(_))));
        }
    }

    #[test]
    fn configured_secret_is_used() {
        let keys = token_keys(
            Some(SecretString::from("configured".to_string())),
            Environment::Production,
            3600,
        );
        assert!(keys.is_ok());
        if let Ok(keys) = keys {
            let token = keys.issue(Uuid::new_v4(), "a@example.com");
            let verified = token.ok().map(|token| TokenKeys::development().verify(&token));
            assert!(matches!(verified, Some(Err(_))));
        }
    }

    #[tokio::test]
    async fn memory_storage_opens() {
        assert!(open_storage(&Storage::Memory).await.is_ok());
    }
}
