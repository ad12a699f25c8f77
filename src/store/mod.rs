//! Persistence for users and notes.
//!
//! Services depend on the [`UserStore`] and [`NoteStore`] traits only. The
//! process owns the connection pool and hands a concrete store to the services
//! at startup.

pub mod memory;
pub mod postgres;
mod traits;
mod types;

use thiserror::Error;

pub use traits::{NoteStore, UserStore};
pub use types::{
    NewUser, Note, NoteFilter, NoteStatus, StatusCounts, UnknownStatus, User, UserCredentials,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write (name of the constraint or column).
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("corrupt row: {0}")]
    CorruptRow(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
