use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let now = chrono::Utc::now();
    let timestamp = now.timestamp_millis() as f64 / 1000.0;
    Json(json!({
        "status": "healthy",
        "service": state.config.project_name,
        "version": VERSION,
        "timestamp": timestamp,
    }))
}

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": format!("Welcome to {}", state.config.project_name),
        "version": VERSION,
        "health_url": "/health",
        "api_v1": "/api/v1",
        "features": [
            "JWT Authentication",
            "User Management",
            "Post Management",
            "Rate Limiting",
            "Input Validation",
            "Error Handling",
            "Structured Logging",
        ],
    }))
}

pub async fn api_info(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    let database = if config.database.is_memory() {
        "In-memory"
    } else {
        "SQLite"
    };
    Json(json!({
        "api_version": "v1",
        "project_name": config.project_name,
        "project_version": VERSION,
        "debug_mode": config.debug,
        "rate_limit": format!("{} requests/minute", config.rate_limit.requests_per_minute),
        "cors_origins": config.cors.allowed_origins,
        "features": {
            "authentication": "JWT Bearer tokens",
            "rate_limiting": format!("{} sliding window", state.limiter.backend_name()),
            "validation": "Typed request bodies with field-level errors",
            "logging": "Structured tracing with per-request ids",
            "database": database,
        },
    }))
}
