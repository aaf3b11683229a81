use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use scribe_core::{Caller, Requirement, User};

use crate::error::AppError;
use crate::state::AppState;

fn authorization(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

async fn require(
    parts: &Parts,
    state: &AppState,
    requirement: Requirement,
) -> Result<User, AppError> {
    Ok(state
        .access
        .authorize(authorization(parts), requirement)
        .await?)
}

/// Any active, authenticated user.
pub struct CurrentUser(pub User);

/// An active user whose account has been verified.
pub struct VerifiedUser(pub User);

pub struct Superuser(pub User);

/// The caller if a valid token was presented, otherwise anonymous.
pub struct MaybeUser(pub Caller);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        require(parts, state, Requirement::Authenticated)
            .await
            .map(CurrentUser)
    }
}

impl FromRequestParts<AppState> for VerifiedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        require(parts, state, Requirement::ActiveVerified)
            .await
            .map(VerifiedUser)
    }
}

impl FromRequestParts<AppState> for Superuser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        require(parts, state, Requirement::Superuser)
            .await
            .map(Superuser)
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(state.access.optional(authorization(parts)).await))
    }
}
