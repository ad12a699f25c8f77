//! Error taxonomy shared by the identity, note and HTTP layers.
//!
//! Handlers never inspect storage errors directly: services translate them into
//! one of these kinds and the HTTP layer maps each kind to a status code.

use thiserror::Error;

use crate::store::StoreError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing fields, reported before any storage call.
    #[error("{0}")]
    InvalidInput(String),
    /// Duplicate email on registration.
    #[error("{0}")]
    Conflict(String),
    /// Missing, expired or invalid token, or bad credentials.
    #[error("{0}")]
    Unauthenticated(String),
    /// No entity owned by the requester matches the id (and state, for transitions).
    #[error("{0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}
