mod auth_handlers;
pub mod health;
mod posts;
mod users;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Everything under `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_router())
        .nest("/users", users_router())
        .nest("/posts", posts_router())
}

fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login))
        .route("/login/oauth", post(auth_handlers::login_form))
        .route("/refresh", post(auth_handlers::refresh))
        .route("/me", get(auth_handlers::me))
        .route("/logout", post(auth_handlers::logout))
        .route("/verify-token", post(auth_handlers::verify_token))
}

fn users_router() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list_users))
        .route("/me", get(users::my_profile).put(users::update_me))
        .route("/me/password", axum::routing::put(users::change_password))
        .route("/search/{query}", get(users::search))
        .route("/stats/summary", get(users::stats))
        .route("/{id}", get(users::get_user).put(users::update_user))
        .route("/{id}/profile", get(users::get_profile))
        .route("/{id}/activate", post(users::activate))
        .route("/{id}/deactivate", post(users::deactivate))
        .route("/{id}/verify", post(users::verify))
}

fn posts_router() -> Router<AppState> {
    Router::new()
        .route("/", get(posts::list_posts).post(posts::create_post))
        .route(
            "/{id}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/{id}/publish", post(posts::publish))
        .route("/{id}/unpublish", post(posts::unpublish))
        .route("/{id}/like", post(posts::like))
}
