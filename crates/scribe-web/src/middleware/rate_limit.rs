//! Per-client sliding-window admission in front of every route.
//!
//! The client key is the token subject when the request carries a valid
//! bearer token (signature and expiry only, no store lookup), otherwise the
//! first `X-Forwarded-For` entry or the peer address. Admitted responses
//! carry the `X-RateLimit-*` headers; rejected requests never reach the
//! handler.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::header::{HeaderValue, AUTHORIZATION};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use scribe_core::{ClientKey, RateDecision, RateLimitInfo};

use crate::error::AppError;
use crate::state::AppState;

pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let path = req.uri().path().to_string();
    if state.limiter.is_exempt(&path) {
        return Ok(next.run(req).await);
    }

    let key = {
        let headers = req.headers();
        let identity = state
            .access
            .identify(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()));
        let forwarded_for = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok());
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        ClientKey::derive(identity, forwarded_for, peer)
    };

    match state.limiter.check(&path, &key).await {
        RateDecision::Exempt => Ok(next.run(req).await),
        RateDecision::Admitted(info) => {
            let mut response = next.run(req).await;
            add_quota_headers(&mut response, info);
            Ok(response)
        }
        RateDecision::Rejected { limit, retry_after } => {
            tracing::warn!(client = %key, path = %path, "Rate limit exceeded");
            Err(AppError::TooManyRequests { limit, retry_after })
        }
    }
}

fn add_quota_headers(response: &mut Response, info: RateLimitInfo) {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(info.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(info.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(info.reset));
}
