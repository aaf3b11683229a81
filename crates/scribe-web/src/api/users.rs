use axum::extract::State;
use axum::Json;
use scribe_core::auth::access::check_user_access;
use scribe_core::pagination::normalize_search;
use scribe_core::store::UserFilter;
use scribe_core::{FieldError, PageRequest, PasswordChange, UserId, UserStats, UserUpdate};

use crate::auth::middleware::{CurrentUser, Superuser};
use crate::dto::*;
use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

const SEARCH_LIMIT_MAX: u64 = 50;

pub async fn list_users(
    State(state): State<AppState>,
    Superuser(admin): Superuser,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    let request = PageRequest::new(query.page, query.per_page);
    let filter = UserFilter {
        search: normalize_search(query.search.as_deref()),
        is_active: query.is_active,
    };
    let page = state.users.list(request, filter).await?;
    tracing::info!(
        admin_id = admin.id,
        returned = page.items.len(),
        "Users list requested"
    );
    Ok(Json(page.into()))
}

pub async fn my_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<UserProfileResponse>, AppError> {
    let (user, posts_count) = state.users.profile(user.id).await?;
    Ok(Json(UserProfileResponse::new(user, posts_count)))
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(update): ApiJson<UserUpdate>,
) -> Result<Json<UserResponse>, AppError> {
    let updated = state.users.update_profile(user.id, update).await?;
    Ok(Json(updated.into()))
}

pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(change): ApiJson<PasswordChange>,
) -> Result<Json<MessageResponse>, AppError> {
    state.users.change_password(user.id, change).await?;
    Ok(Json(MessageResponse {
        message: "Password updated successfully",
        detail: "Please use your new password for future logins",
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiPath(id): ApiPath<UserId>,
) -> Result<Json<UserResponse>, AppError> {
    check_user_access(id, &caller)?;
    Ok(Json(state.users.get(id).await?.into()))
}

pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiPath(id): ApiPath<UserId>,
) -> Result<Json<UserProfileResponse>, AppError> {
    check_user_access(id, &caller)?;
    let (user, posts_count) = state.users.profile(id).await?;
    Ok(Json(UserProfileResponse::new(user, posts_count)))
}

pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(update): ApiJson<UserUpdate>,
) -> Result<Json<UserResponse>, AppError> {
    check_user_access(id, &caller)?;
    let updated = state.users.update_profile(id, update).await?;
    tracing::info!(user_id = id, caller_id = caller.id, "User updated");
    Ok(Json(updated.into()))
}

pub async fn activate(
    State(state): State<AppState>,
    Superuser(admin): Superuser,
    ApiPath(id): ApiPath<UserId>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.users.set_active(&admin, id, true).await?.into()))
}

pub async fn deactivate(
    State(state): State<AppState>,
    Superuser(admin): Superuser,
    ApiPath(id): ApiPath<UserId>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.users.set_active(&admin, id, false).await?.into()))
}

pub async fn verify(
    State(state): State<AppState>,
    Superuser(_admin): Superuser,
    ApiPath(id): ApiPath<UserId>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.users.mark_verified(id).await?.into()))
}

pub async fn search(
    State(state): State<AppState>,
    Superuser(admin): Superuser,
    ApiPath(query): ApiPath<String>,
    ApiQuery(params): ApiQuery<SearchQuery>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    if !(1..=SEARCH_LIMIT_MAX).contains(&params.limit) {
        return Err(AppError::Validation(vec![FieldError::new(
            "limit",
            format!("must be between 1 and {SEARCH_LIMIT_MAX}"),
        )]));
    }
    let users = state.users.search(&query, params.limit).await?;
    tracing::info!(
        admin_id = admin.id,
        returned = users.len(),
        "User search"
    );
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn stats(
    State(state): State<AppState>,
    Superuser(_admin): Superuser,
) -> Result<Json<UserStats>, AppError> {
    Ok(Json(state.users.stats().await?))
}
