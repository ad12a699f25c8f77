//! HS256 session tokens (JWT).
//!
//! Tokens carry `{id, email, iat, exp}` and are signed with a shared secret.
//! Verification checks structure and signature first, then expiry, so a
//! tampered token is always `Malformed` even when it is also past `exp`.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Token lifetime: 7 days.
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Longest accepted token lifetime: 365 days.
pub const MAX_TOKEN_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

/// Signing key used outside production when no secret is configured.
pub const DEVELOPMENT_SECRET: &str = "notely-development-secret-change-me";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Wire claims, kept separate from [`TokenPayload`] so the id is validated once.
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    id: String,
    email: String,
    iat: i64,
    exp: i64,
}

/// Verified token contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPayload {
    pub user_id: Uuid,
    pub email: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct TokenKeys {
    secret: SecretString,
    ttl_seconds: i64,
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKeys")
            .field("secret", &"***")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl TokenKeys {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn development() -> Self {
        Self::new(SecretString::from(DEVELOPMENT_SECRET.to_string()))
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Issue a token for `user_id`/`email`, valid from now.
    ///
    /// # Errors
    /// Returns `Error::Internal` if the claims cannot be encoded.
    pub fn issue(&self, user_id: Uuid, email: &str) -> Result<String> {
        self.issue_at(user_id, email, now_unix_seconds())
    }

    /// Issue a token as of `now` (unix seconds).
    ///
    /// # Errors
    /// Returns `Error::Internal` if the claims cannot be encoded or the expiry
    /// does not fit in an `i64`.
    pub fn issue_at(&self, user_id: Uuid, email: &str, now: i64) -> Result<String> {
        let exp = now
            .checked_add(self.ttl_seconds)
            .ok_or_else(|| Error::Internal("token expiry overflows".to_string()))?;
        let claims = TokenClaims {
            id: user_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp,
        };
        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(&claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let signature = self
            .mac(signing_input.as_bytes())
            .ok_or_else(|| Error::Internal("invalid token signing key".to_string()))?
            .finalize()
            .into_bytes();
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify a token against the current time.
    ///
    /// # Errors
    /// `TokenError::Malformed` for bad structure or signature, `TokenError::Expired` past `exp`.
    pub fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.verify_at(token, now_unix_seconds())
    }

    /// Verify a token as of `now` (unix seconds).
    ///
    /// # Errors
    /// `TokenError::Malformed` for bad structure or signature, `TokenError::Expired` past `exp`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<TokenPayload, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let claims_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let sig_b64 = parts.next().ok_or(TokenError::Malformed)?;
        if parts.next().is_some() {
            return Err(TokenError::Malformed);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != "HS256" {
            return Err(TokenError::Malformed);
        }

        let signature =
            Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Malformed)?;
        let signing_input = format!("{header_b64}.{claims_b64}");
        self.mac(signing_input.as_bytes())
            .ok_or(TokenError::Malformed)?
            .verify_slice(&signature)
            .map_err(|_| TokenError::Malformed)?;

        let claims: TokenClaims = b64d_json(claims_b64)?;
        let user_id = Uuid::parse_str(&claims.id).map_err(|_| TokenError::Malformed)?;
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }

        Ok(TokenPayload {
            user_id,
            email: claims.email,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    fn mac(&self, input: &[u8]) -> Option<HmacSha256> {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(self.secret.expose_secret().as_bytes()).ok()?;
        mac.update(input);
        Some(mac)
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)
        .map_err(|err| Error::Internal(format!("failed to encode token: {err}")))?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

fn now_unix_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}
