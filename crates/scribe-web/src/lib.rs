//! HTTP frontend for the Scribe blog backend.
//!
//! [`app`] builds the complete router: the versioned JSON API under
//! `/api/v1`, the unversioned health and info endpoints, and the middleware
//! stack (tracing, CORS, body limit, request ids, security headers and the
//! rate limiter).

pub mod api;
pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod state;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    let routes = Router::new()
        .route("/", get(api::health::root))
        .route("/health", get(api::health::health))
        .route("/api/info", get(api::health::api_info))
        .nest("/api/v1", api::router())
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ));

    let routes = if config.tls_enabled() {
        routes.layer(from_fn(middleware::security_headers::security_headers_with_hsts))
    } else {
        routes.layer(from_fn(middleware::security_headers::security_headers))
    };

    routes
        .layer(from_fn(middleware::request_id::request_context))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(cors_layer(&config.cors.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .expose_headers([
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-process-time"),
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderName::from_static("x-ratelimit-reset"),
            header::RETRY_AFTER,
        ])
}
