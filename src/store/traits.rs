//! Repository interfaces consumed by the identity and note services.
//!
//! Implementations must scope every note query by owner and perform status
//! transitions as a single conditional write, so that two concurrent requests
//! can never both observe the same source status.

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    StoreError,
    types::{NewUser, Note, NoteFilter, NoteStatus, StatusCounts, User, UserCredentials},
};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// `email` must already be normalized (trimmed, lower-cased).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError>;

    /// Password login lookup; the only query that returns the stored hash.
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, StoreError>;

    /// # Errors
    /// Returns `StoreError::UniqueViolation` when the email or Google id is taken.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Attach a Google id to a user that has none. Returns `None` when the user
    /// is missing or already linked.
    async fn link_google_id(&self, id: Uuid, google_id: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn insert(&self, owner: Uuid, title: &str, content: &str) -> Result<Note, StoreError>;

    async fn find(&self, owner: Uuid, id: Uuid) -> Result<Option<Note>, StoreError>;

    /// Notes matching `filter`, newest `updated_at` first.
    async fn find_many(
        &self,
        filter: &NoteFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Note>, StoreError>;

    async fn count(&self, filter: &NoteFilter) -> Result<i64, StoreError>;

    /// Replace title and content, leaving the status untouched.
    async fn update_content(
        &self,
        owner: Uuid,
        id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<Option<Note>, StoreError>;

    /// Set `to` only if the stored status is one of `from`. Returns `None` when
    /// no owned note matched the predicate.
    async fn update_status(
        &self,
        owner: Uuid,
        id: Uuid,
        from: &[NoteStatus],
        to: NoteStatus,
    ) -> Result<Option<Note>, StoreError>;

    /// Returns `false` when no owned note had this id.
    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError>;

    async fn count_by_status(&self, owner: Uuid) -> Result<StatusCounts, StoreError>;

    /// Connectivity check for `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}
