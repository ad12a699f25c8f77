//! Endpoints about the signed-in user. Tokens are stateless, so logout only
//! acknowledges; the client drops its token.

use axum::{extract::Extension, response::Response};

use super::types::{ProfileBody, UserBody};
use crate::{
    api::{handlers::notes::types::StatsBody, response::ApiResponse},
    error::Result,
    notes::NoteService,
    store::User,
};

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user.", body = UserBody),
        (status = 401, description = "Missing, expired or invalid token."),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(Extension(user): Extension<User>) -> Response {
    ApiResponse::ok(UserBody::from(user)).into_ok()
}

#[utoipa::path(
    get,
    path = "/auth/profile",
    responses(
        (status = 200, description = "Current user with note counts.", body = ProfileBody),
        (status = 401, description = "Missing, expired or invalid token."),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn profile(
    Extension(user): Extension<User>,
    Extension(notes): Extension<NoteService>,
) -> Result<Response> {
    let stats = notes.stats(user.id).await?;
    Ok(ApiResponse::ok(ProfileBody {
        user: user.into(),
        stats: StatsBody::from(stats),
    })
    .into_ok())
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout acknowledged."),
        (status = 401, description = "Missing, expired or invalid token."),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(Extension(_user): Extension<User>) -> Response {
    ApiResponse::message("Logged out successfully").into_ok()
}
