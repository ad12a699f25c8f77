//! # Notely (multi-tenant notes API)
//!
//! `notely` serves user-owned notes over a small JSON REST API. Users sign in
//! with an email and password or through Google OAuth and receive a signed
//! bearer token (HS256 JWT) that authenticates every note request.
//!
//! ## Tenant Model
//!
//! Every note has exactly one owner, fixed at creation. All reads, updates,
//! transitions and deletes filter on the authenticated user id, so a note owned
//! by someone else is indistinguishable from a note that does not exist: both
//! return `404 Not Found`.
//!
//! ## Note Lifecycle
//!
//! Notes move between `active`, `archived` and `trash`:
//!
//! - **archive:** `active` → `archived`
//! - **unarchive:** `archived` → `active`
//! - **trash:** `active` or `archived` → `trash`
//! - **restore:** `trash` → `active`
//!
//! Each transition is a single conditional update on the current status. A
//! transition from the wrong state reports `404 Not Found`, and two concurrent
//! identical transitions never both succeed.
//!
//! ## Storage
//!
//! Persistence sits behind the [`store::UserStore`] and [`store::NoteStore`]
//! traits, implemented for PostgreSQL (`sqlx`) and for an in-process map used
//! by tests and `--in-memory` runs.

pub mod api;
pub mod cli;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod notes;
pub mod store;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
