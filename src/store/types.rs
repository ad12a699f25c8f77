//! Records exchanged with the storage layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// A persisted user, without the password hash.
///
/// Lookups used for request authentication return this projection so the hash
/// never leaves the store outside of the password login path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub google_id: Option<String>,
    pub has_password: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user together with its stored password hash, only used by password login.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    #[default]
    Active,
    Archived,
    Trash,
}

impl NoteStatus {
    pub const ALL: [Self; 3] = [Self::Active, Self::Archived, Self::Trash];

    /// Canonical value stored in the `notes.status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Trash => "trash",
        }
    }
}

impl fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown note status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for NoteStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            "trash" => Ok(Self::Trash),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub status: NoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Predicate for listing and counting notes.
#[derive(Debug, Clone)]
pub struct NoteFilter {
    pub owner: Uuid,
    pub status: NoteStatus,
    /// Case-insensitive substring matched against title or content.
    pub search: Option<String>,
}

impl NoteFilter {
    #[must_use]
    pub fn new(owner: Uuid, status: NoteStatus) -> Self {
        Self {
            owner,
            status,
            search: None,
        }
    }

    #[must_use]
    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search;
        self
    }

    /// Checks a note against the predicate; used by the in-process store.
    #[must_use]
    pub fn matches(&self, note: &Note) -> bool {
        if note.user_id != self.owner || note.status != self.status {
            return false;
        }
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                note.title.to_lowercase().contains(&term)
                    || note.content.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub active: i64,
    pub archived: i64,
    pub trash: i64,
}

impl StatusCounts {
    pub fn add(&mut self, status: NoteStatus, count: i64) {
        match status {
            NoteStatus::Active => self.active += count,
            NoteStatus::Archived => self.archived += count,
            NoteStatus::Trash => self.trash += count,
        }
    }

    #[must_use]
    pub const fn total(&self) -> i64 {
        self.active + self.archived + self.trash
    }
}
