//! Auth handlers and supporting modules.
//!
//! Password accounts register and log in with JSON bodies; Google accounts go
//! through the OAuth redirect flow in [`google`]. Both end with an HS256 bearer
//! token which [`principal::require_auth`] checks on every protected route.

pub mod google;
pub mod login;
pub mod me;
pub mod principal;
pub mod register;
mod state;
pub mod types;

pub use google::GoogleConfig;
pub use principal::{Principal, require_auth};
pub use state::{AuthConfig, AuthState};
