//! API handlers and shared request helpers.

pub mod auth;
pub mod health;
pub mod notes;

use uuid::Uuid;

use crate::error::Error;

/// Malformed ids cannot name an owned note, so they read as "not found".
pub(crate) fn parse_note_id(id: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(id.trim()).map_err(|_| Error::not_found("Note not found"))
}

pub(crate) fn missing_payload() -> Error {
    Error::invalid_input("Missing or invalid JSON body")
}
