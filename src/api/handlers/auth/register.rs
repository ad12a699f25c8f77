use axum::{Json, extract::Extension, response::Response};
use std::sync::Arc;
use tracing::instrument;

use super::{
    state::AuthState,
    types::{AuthBody, RegisterRequest},
};
use crate::{
    api::{handlers::missing_payload, response::ApiResponse},
    error::Result,
    identity::IdentityService,
};

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; `data` holds the user and a bearer token.", body = AuthBody),
        (status = 400, description = "Invalid email, short password or missing body."),
        (status = 409, description = "User with the specified email already exists."),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    Extension(auth): Extension<Arc<AuthState>>,
    Extension(identity): Extension<IdentityService>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<Response> {
    let Some(Json(request)) = payload else {
        return Err(missing_payload());
    };

    let user = identity
        .register_with_password(&request.email, &request.password, request.name.as_deref())
        .await?;
    let token = auth.keys().issue(user.id, &user.email)?;

    Ok(ApiResponse::ok(AuthBody {
        user: user.into(),
        token,
    })
    .with_message("User registered successfully")
    .into_created())
}
