//! Authenticated principal extraction.
//!
//! Flow Overview: read the bearer token, verify it, load the user it names,
//! and attach a [`Principal`] plus the loaded [`User`] to the request
//! extensions for downstream handlers.

use axum::{
    extract::{Extension, Request},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::state::AuthState;
use crate::{
    credentials::TokenError,
    error::{Error, Result},
    identity::IdentityService,
    store::User,
};

pub const NO_TOKEN: &str = "Access denied. No token provided";
pub const TOKEN_EXPIRED: &str = "Token expired";
pub const INVALID_TOKEN: &str = "Invalid token";
pub const USER_NOT_FOUND: &str = "User not found";

/// Authenticated user context derived from the bearer token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the request's bearer token into a principal and its user.
///
/// # Errors
/// `Unauthenticated` for a missing, expired or invalid token, or a token whose
/// user no longer exists.
pub async fn authenticate(
    headers: &HeaderMap,
    auth: &AuthState,
    identity: &IdentityService,
) -> Result<(Principal, User)> {
    let token = extract_bearer_token(headers).ok_or_else(|| Error::unauthenticated(NO_TOKEN))?;

    let payload = auth.keys().verify(&token).map_err(|err| {
        debug!("rejected bearer token: {err}");
        match err {
            TokenError::Expired => Error::unauthenticated(TOKEN_EXPIRED),
            TokenError::Malformed => Error::unauthenticated(INVALID_TOKEN),
        }
    })?;

    let user = identity
        .find_user(payload.user_id)
        .await?
        .ok_or_else(|| Error::unauthenticated(USER_NOT_FOUND))?;

    let principal = Principal {
        user_id: user.id,
        email: user.email.clone(),
    };
    Ok((principal, user))
}

/// Middleware guarding every protected route.
pub async fn require_auth(
    Extension(auth): Extension<Arc<AuthState>>,
    Extension(identity): Extension<IdentityService>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(request.headers(), &auth, &identity).await {
        Ok((principal, user)) => {
            request.extensions_mut().insert(principal);
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}
