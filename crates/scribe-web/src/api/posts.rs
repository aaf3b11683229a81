use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use scribe_core::pagination::normalize_search;
use scribe_core::store::PostFilter;
use scribe_core::{NewPost, PageRequest, PostId, PostUpdate};

use crate::auth::middleware::{CurrentUser, MaybeUser, VerifiedUser};
use crate::dto::*;
use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

pub async fn list_posts(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    ApiQuery(query): ApiQuery<PostListQuery>,
) -> Result<Json<PostListResponse>, AppError> {
    let request = PageRequest::new(query.page, query.per_page);
    let filter = PostFilter {
        search: normalize_search(query.search.as_deref()),
        author_id: query.author_id,
        tag: normalize_search(query.tag.as_deref()),
        is_featured: query.is_featured,
        ..PostFilter::default()
    };
    let page = state.posts.list(request, filter, &caller).await?;
    Ok(Json(page.into()))
}

pub async fn create_post(
    State(state): State<AppState>,
    VerifiedUser(author): VerifiedUser,
    ApiJson(body): ApiJson<NewPost>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let post = state.posts.create(&author, body).await?;
    Ok((StatusCode::CREATED, Json(post.into())))
}

pub async fn get_post(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    ApiPath(id): ApiPath<PostId>,
) -> Result<Json<PostResponse>, AppError> {
    Ok(Json(state.posts.get_visible(id, &caller).await?.into()))
}

pub async fn update_post(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiPath(id): ApiPath<PostId>,
    ApiJson(update): ApiJson<PostUpdate>,
) -> Result<Json<PostResponse>, AppError> {
    Ok(Json(state.posts.update(id, update, &caller).await?.into()))
}

pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiPath(id): ApiPath<PostId>,
) -> Result<StatusCode, AppError> {
    state.posts.delete(id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn publish(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiPath(id): ApiPath<PostId>,
) -> Result<Json<PostResponse>, AppError> {
    Ok(Json(state.posts.set_published(id, true, &caller).await?.into()))
}

pub async fn unpublish(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiPath(id): ApiPath<PostId>,
) -> Result<Json<PostResponse>, AppError> {
    Ok(Json(state.posts.set_published(id, false, &caller).await?.into()))
}

pub async fn like(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiPath(id): ApiPath<PostId>,
) -> Result<Json<LikeResponse>, AppError> {
    let like_count = state.posts.like(id, &caller).await?;
    Ok(Json(LikeResponse { id, like_count }))
}
