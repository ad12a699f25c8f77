//! Password hashing and session token signing.

pub mod password;
pub mod token;

pub use password::{
    MIN_PASSWORD_LENGTH, UNMATCHABLE_PASSWORD_HASH, hash_password, verify_password,
};
pub use token::{
    DEFAULT_TOKEN_TTL_SECONDS, MAX_TOKEN_TTL_SECONDS, TokenError, TokenKeys, TokenPayload,
};
