use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use scribe_core::NewUser;

use crate::auth::middleware::CurrentUser;
use crate::dto::*;
use crate::error::AppError;
use crate::extract::{ApiForm, ApiJson};
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = state.users.register(body).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Accepts a username or an email in the `username` field.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    issue_for_login(&state, body).await
}

/// Same as [`login`] for clients that post `application/x-www-form-urlencoded`.
pub async fn login_form(
    State(state): State<AppState>,
    ApiForm(body): ApiForm<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    issue_for_login(&state, body).await
}

async fn issue_for_login(
    state: &AppState,
    body: LoginRequest,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state.users.login(&body.username, &body.password).await?;
    let issued = state.access.tokens().issue_default(user.id)?;
    Ok(Json(TokenResponse::new(issued, user)))
}

pub async fn refresh(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<TokenResponse>, AppError> {
    let issued = state.access.tokens().issue_default(user.id)?;
    tracing::info!(user_id = user.id, "Token refreshed");
    Ok(Json(TokenResponse::new(issued, user)))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

/// Tokens are stateless; the client is expected to drop its copy.
pub async fn logout(CurrentUser(user): CurrentUser) -> Json<MessageResponse> {
    tracing::info!(user_id = user.id, "User logged out");
    Json(MessageResponse {
        message: "Successfully logged out",
        detail: "Please discard your access token",
    })
}

pub async fn verify_token(CurrentUser(user): CurrentUser) -> Json<VerifyTokenResponse> {
    Json(VerifyTokenResponse {
        valid: true,
        user_id: user.id,
        username: user.username,
        is_active: user.is_active,
        is_verified: user.is_verified,
    })
}
