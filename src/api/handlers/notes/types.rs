//! Request/response types for note endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    notes::NotePage,
    store::{Note, NoteStatus, StatusCounts},
};

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(default)]
pub struct NoteRequest {
    pub title: String,
    pub content: String,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// 1-based page number (default 1).
    pub page: Option<i64>,
    /// Page size, 1 to 100 (default 10).
    pub limit: Option<i64>,
    /// Case-insensitive substring matched against title or content, as given
    /// (whitespace is not trimmed). Empty means no search.
    pub search: Option<String>,
}

#[derive(ToSchema, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NoteBody {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub status: NoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Note> for NoteBody {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            user_id: note.user_id,
            title: note.title,
            content: note.content,
            status: note.status,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

#[derive(ToSchema, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationBody {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct NoteListBody {
    pub notes: Vec<NoteBody>,
    pub pagination: PaginationBody,
}

impl From<NotePage> for NoteListBody {
    fn from(page: NotePage) -> Self {
        let pagination = PaginationBody {
            page: page.page,
            limit: page.limit,
            total: page.total,
            total_pages: page.total_pages(),
        };
        Self {
            notes: page.notes.into_iter().map(NoteBody::from).collect(),
            pagination,
        }
    }
}

/// Note counts per status, plus their sum.
#[derive(ToSchema, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsBody {
    pub active: i64,
    pub archived: i64,
    pub trash: i64,
    pub total: i64,
}

impl From<StatusCounts> for StatsBody {
    fn from(counts: StatusCounts) -> Self {
        Self {
            active: counts.active,
            archived: counts.archived,
            trash: counts.trash,
            total: counts.total(),
        }
    }
}
