//! Note endpoints. All routes sit behind the bearer guard and act on the
//! notes of the authenticated principal only.

pub mod types;

use axum::{
    Json,
    extract::{Extension, Path, Query, rejection::QueryRejection},
    response::Response,
};
use tracing::debug;

use self::types::{ListQuery, NoteBody, NoteListBody, NoteRequest, StatsBody};
use super::{auth::Principal, missing_payload, parse_note_id};
use crate::{
    api::response::ApiResponse,
    error::{Error, Result},
    notes::{NoteService, PageRequest, Transition},
    store::NoteStatus,
};

async fn list_by_status(
    principal: &Principal,
    notes: &NoteService,
    status: NoteStatus,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|rejection| {
        debug!("invalid list query: {rejection}");
        Error::invalid_input("Invalid query parameters")
    })?;
    let page = PageRequest::new(query.page, query.limit);
    let listed = notes
        .list(principal.user_id, status, page, query.search.as_deref())
        .await?;
    Ok(ApiResponse::ok(NoteListBody::from(listed)).into_ok())
}

#[utoipa::path(
    get,
    path = "/notes",
    params(ListQuery),
    responses(
        (status = 200, description = "Active notes, newest updated first.", body = NoteListBody),
        (status = 400, description = "Invalid query parameters."),
        (status = 401, description = "Missing, expired or invalid token."),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn list_active(
    Extension(principal): Extension<Principal>,
    Extension(notes): Extension<NoteService>,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response> {
    list_by_status(&principal, &notes, NoteStatus::Active, query).await
}

#[utoipa::path(
    get,
    path = "/notes/archived",
    params(ListQuery),
    responses(
        (status = 200, description = "Archived notes, newest updated first.", body = NoteListBody),
        (status = 400, description = "Invalid query parameters."),
        (status = 401, description = "Missing, expired or invalid token."),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn list_archived(
    Extension(principal): Extension<Principal>,
    Extension(notes): Extension<NoteService>,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response> {
    list_by_status(&principal, &notes, NoteStatus::Archived, query).await
}

#[utoipa::path(
    get,
    path = "/notes/trash",
    params(ListQuery),
    responses(
        (status = 200, description = "Trashed notes, newest updated first.", body = NoteListBody),
        (status = 400, description = "Invalid query parameters."),
        (status = 401, description = "Missing, expired or invalid token."),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn list_trash(
    Extension(principal): Extension<Principal>,
    Extension(notes): Extension<NoteService>,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response> {
    list_by_status(&principal, &notes, NoteStatus::Trash, query).await
}

#[utoipa::path(
    get,
    path = "/notes/stats",
    responses(
        (status = 200, description = "Note counts per status.", body = StatsBody),
        (status = 401, description = "Missing, expired or invalid token."),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn stats(
    Extension(principal): Extension<Principal>,
    Extension(notes): Extension<NoteService>,
) -> Result<Response> {
    let counts = notes.stats(principal.user_id).await?;
    Ok(ApiResponse::ok(StatsBody::from(counts)).into_ok())
}

#[utoipa::path(
    post,
    path = "/notes",
    request_body = NoteRequest,
    responses(
        (status = 201, description = "Note created.", body = NoteBody),
        (status = 400, description = "Blank title or content, or missing body."),
        (status = 401, description = "Missing, expired or invalid token."),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn create_note(
    Extension(principal): Extension<Principal>,
    Extension(notes): Extension<NoteService>,
    payload: Option<Json<NoteRequest>>,
) -> Result<Response> {
    let Some(Json(request)) = payload else {
        return Err(missing_payload());
    };
    let note = notes
        .create(principal.user_id, &request.title, &request.content)
        .await?;
    Ok(ApiResponse::ok(NoteBody::from(note))
        .with_message("Note created successfully")
        .into_created())
}

#[utoipa::path(
    get,
    path = "/notes/{id}",
    params(("id" = String, Path, description = "Note id")),
    responses(
        (status = 200, description = "The note.", body = NoteBody),
        (status = 401, description = "Missing, expired or invalid token."),
        (status = 404, description = "Note not found."),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn get_note(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(notes): Extension<NoteService>,
) -> Result<Response> {
    let id = parse_note_id(&id)?;
    let note = notes.get(principal.user_id, id).await?;
    Ok(ApiResponse::ok(NoteBody::from(note)).into_ok())
}

#[utoipa::path(
    put,
    path = "/notes/{id}",
    params(("id" = String, Path, description = "Note id")),
    request_body = NoteRequest,
    responses(
        (status = 200, description = "Note updated; status unchanged.", body = NoteBody),
        (status = 400, description = "Blank title or content, or missing body."),
        (status = 401, description = "Missing, expired or invalid token."),
        (status = 404, description = "Note not found."),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn update_note(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(notes): Extension<NoteService>,
    payload: Option<Json<NoteRequest>>,
) -> Result<Response> {
    let id = parse_note_id(&id)?;
    let Some(Json(request)) = payload else {
        return Err(missing_payload());
    };
    let note = notes
        .update(principal.user_id, id, &request.title, &request.content)
        .await?;
    Ok(ApiResponse::ok(NoteBody::from(note))
        .with_message("Note updated successfully")
        .into_ok())
}

#[utoipa::path(
    delete,
    path = "/notes/{id}",
    params(("id" = String, Path, description = "Note id")),
    responses(
        (status = 200, description = "Note permanently deleted."),
        (status = 401, description = "Missing, expired or invalid token."),
        (status = 404, description = "Note not found."),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn delete_note(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(notes): Extension<NoteService>,
) -> Result<Response> {
    let id = parse_note_id(&id)?;
    notes.delete(principal.user_id, id).await?;
    Ok(ApiResponse::message("Note permanently deleted").into_ok())
}

async fn apply_transition(
    id: &str,
    principal: &Principal,
    notes: &NoteService,
    transition: Transition,
    message: &str,
) -> Result<Response> {
    let id = parse_note_id(id)?;
    let note = notes.transition(principal.user_id, id, transition).await?;
    Ok(ApiResponse::ok(NoteBody::from(note))
        .with_message(message)
        .into_ok())
}

#[utoipa::path(
    put,
    path = "/notes/{id}/archive",
    params(("id" = String, Path, description = "Note id")),
    responses(
        (status = 200, description = "Active note archived.", body = NoteBody),
        (status = 401, description = "Missing, expired or invalid token."),
        (status = 404, description = "No active note with this id."),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn archive_note(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(notes): Extension<NoteService>,
) -> Result<Response> {
    apply_transition(&id, &principal, &notes, Transition::Archive, "Note archived").await
}

#[utoipa::path(
    put,
    path = "/notes/{id}/unarchive",
    params(("id" = String, Path, description = "Note id")),
    responses(
        (status = 200, description = "Archived note made active again.", body = NoteBody),
        (status = 401, description = "Missing, expired or invalid token."),
        (status = 404, description = "No archived note with this id."),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn unarchive_note(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(notes): Extension<NoteService>,
) -> Result<Response> {
    apply_transition(&id, &principal, &notes, Transition::Unarchive, "Note unarchived").await
}

#[utoipa::path(
    put,
    path = "/notes/{id}/trash",
    params(("id" = String, Path, description = "Note id")),
    responses(
        (status = 200, description = "Active or archived note moved to trash.", body = NoteBody),
        (status = 401, description = "Missing, expired or invalid token."),
        (status = 404, description = "No active or archived note with this id."),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn trash_note(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(notes): Extension<NoteService>,
) -> Result<Response> {
    apply_transition(&id, &principal, &notes, Transition::Trash, "Note moved to trash").await
}

#[utoipa::path(
    put,
    path = "/notes/{id}/restore",
    params(("id" = String, Path, description = "Note id")),
    responses(
        (status = 200, description = "Trashed note restored to active.", body = NoteBody),
        (status = 401, description = "Missing, expired or invalid token."),
        (status = 404, description = "No trashed note with this id."),
    ),
    security(("bearer" = [])),
    tag = "notes"
)]
pub async fn restore_note(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(notes): Extension<NoteService>,
) -> Result<Response> {
    apply_transition(&id, &principal, &notes, Transition::Restore, "Note restored").await
}
