//! Note lifecycle: owner-scoped CRUD and status transitions.
//!
//! Every operation takes the owner explicitly. A note owned by someone else is
//! reported exactly like a missing note.

use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    store::{Note, NoteFilter, NoteStatus, NoteStore, StatusCounts},
};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

const NOTE_NOT_FOUND: &str = "Note not found";

/// A conditional status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Archive,
    Unarchive,
    Trash,
    Restore,
}

impl Transition {
    /// Statuses the note must currently have for the transition to apply.
    #[must_use]
    pub const fn sources(self) -> &'static [NoteStatus] {
        match self {
            Self::Archive => &[NoteStatus::Active],
            Self::Unarchive => &[NoteStatus::Archived],
            Self::Trash => &[NoteStatus::Active, NoteStatus::Archived],
            Self::Restore => &[NoteStatus::Trash],
        }
    }

    #[must_use]
    pub const fn target(self) -> NoteStatus {
        match self {
            Self::Archive => NoteStatus::Archived,
            Self::Unarchive | Self::Restore => NoteStatus::Active,
            Self::Trash => NoteStatus::Trash,
        }
    }

    fn not_found_message(self) -> &'static str {
        match self {
            Self::Archive => "Note not found or already archived",
            Self::Unarchive => "Archived note not found",
            Self::Trash => "Note not found or already in trash",
            Self::Restore => "Note not found in trash",
        }
    }
}

/// Paging request after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// `page < 1` becomes 1; `limit` defaults to 10 and is clamped to `1..=100`.
    #[must_use]
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone)]
pub struct NotePage {
    pub notes: Vec<Note>,
    pub page: i64,
    pub limit: i64,
    /// Matches across all pages.
    pub total: i64,
}

impl NotePage {
    #[must_use]
    pub fn total_pages(&self) -> i64 {
        if self.total == 0 {
            0
        } else {
            (self.total + self.limit - 1) / self.limit
        }
    }
}

fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::invalid_input(format!("{field} is required")))
    } else {
        Ok(trimmed.to_string())
    }
}

#[derive(Clone)]
pub struct NoteService {
    notes: Arc<dyn NoteStore>,
}

impl NoteService {
    #[must_use]
    pub fn new(notes: Arc<dyn NoteStore>) -> Self {
        Self { notes }
    }

    /// # Errors
    /// `InvalidInput` when the title or content is blank.
    #[instrument(skip(self, title, content))]
    pub async fn create(&self, owner: Uuid, title: &str, content: &str) -> Result<Note> {
        let title = required(title, "Title")?;
        let content = required(content, "Content")?;
        let note = self.notes.insert(owner, &title, &content).await?;
        debug!(note_id = %note.id, "note created");
        Ok(note)
    }

    /// # Errors
    /// `NotFound` when no note with this id belongs to `owner`.
    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<Note> {
        self.notes
            .find(owner, id)
            .await?
            .ok_or_else(|| Error::not_found(NOTE_NOT_FOUND))
    }

    /// Replace title and content without touching the status.
    ///
    /// # Errors
    /// `InvalidInput` on blank fields, `NotFound` when the note is not owned.
    #[instrument(skip(self, title, content))]
    pub async fn update(&self, owner: Uuid, id: Uuid, title: &str, content: &str) -> Result<Note> {
        let title = required(title, "Title")?;
        let content = required(content, "Content")?;
        self.notes
            .update_content(owner, id, &title, &content)
            .await?
            .ok_or_else(|| Error::not_found(NOTE_NOT_FOUND))
    }

    /// Apply `transition` if the note currently has one of its source statuses.
    ///
    /// # Errors
    /// `NotFound` when no owned note with an allowed source status exists.
    #[instrument(skip(self))]
    pub async fn transition(&self, owner: Uuid, id: Uuid, transition: Transition) -> Result<Note> {
        self.notes
            .update_status(owner, id, transition.sources(), transition.target())
            .await?
            .ok_or_else(|| Error::not_found(transition.not_found_message()))
    }

    /// # Errors
    /// See [`NoteService::transition`].
    pub async fn archive(&self, owner: Uuid, id: Uuid) -> Result<Note> {
        self.transition(owner, id, Transition::Archive).await
    }

    /// # Errors
    /// See [`NoteService::transition`].
    pub async fn unarchive(&self, owner: Uuid, id: Uuid) -> Result<Note> {
        self.transition(owner, id, Transition::Unarchive).await
    }

    /// # Errors
    /// See [`NoteService::transition`].
    pub async fn trash(&self, owner: Uuid, id: Uuid) -> Result<Note> {
        self.transition(owner, id, Transition::Trash).await
    }

    /// # Errors
    /// See [`NoteService::transition`].
    pub async fn restore(&self, owner: Uuid, id: Uuid) -> Result<Note> {
        self.transition(owner, id, Transition::Restore).await
    }

    /// Permanently remove a note in any status.
    ///
    /// # Errors
    /// `NotFound` when the note is not owned.
    #[instrument(skip(self))]
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<()> {
        if self.notes.delete(owner, id).await? {
            Ok(())
        } else {
            Err(Error::not_found(NOTE_NOT_FOUND))
        }
    }

    /// Newest-updated first. The search term is matched exactly as given,
    /// surrounding whitespace included; only an empty term is ignored.
    ///
    /// # Errors
    /// `Internal` when the store fails.
    pub async fn list(
        &self,
        owner: Uuid,
        status: NoteStatus,
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<NotePage> {
        let search = search
            .filter(|term| !term.is_empty())
            .map(ToString::to_string);
        let filter = NoteFilter::new(owner, status).with_search(search);

        let total = self.notes.count(&filter).await?;
        let notes = self
            .notes
            .find_many(&filter, page.offset(), page.limit)
            .await?;

        Ok(NotePage {
            notes,
            page: page.page,
            limit: page.limit,
            total,
        })
    }

    /// # Errors
    /// `Internal` when the store fails.
    pub async fn stats(&self, owner: Uuid) -> Result<StatusCounts> {
        Ok(self.notes.count_by_status(owner).await?)
    }

    /// # Errors
    /// `Internal` when the store is unreachable.
    pub async fn ping(&self) -> Result<()> {
        Ok(self.notes.ping().await?)
    }
}
