use axum::{Json, extract::Extension, response::Response};
use std::sync::Arc;
use tracing::instrument;

use super::{
    state::AuthState,
    types::{AuthBody, LoginRequest},
};
use crate::{
    api::{handlers::missing_payload, response::ApiResponse},
    error::Result,
    identity::IdentityService,
};

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted; `data` holds the user and a bearer token.", body = AuthBody),
        (status = 400, description = "Missing email, password or body."),
        (status = 401, description = "Invalid email or password."),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(auth): Extension<Arc<AuthState>>,
    Extension(identity): Extension<IdentityService>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Response> {
    let Some(Json(request)) = payload else {
        return Err(missing_payload());
    };

    let user = identity
        .login_with_password(&request.email, &request.password)
        .await?;
    let token = auth.keys().issue(user.id, &user.email)?;

    Ok(ApiResponse::ok(AuthBody {
        user: user.into(),
        token,
    })
    .with_message("Login successful")
    .into_ok())
}
