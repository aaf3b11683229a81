use axum::extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use scribe_core::{AccessError, CoreError, FieldError, StoreError};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Validation(Vec<FieldError>),
    TooManyRequests { limit: u32, retry_after: u64 },
    Unavailable(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_errors: Option<Vec<FieldError>>,
}

#[derive(Serialize)]
struct RateLimitBody {
    error: &'static str,
    detail: String,
    retry_after: u64,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error, detail, validation_errors) = match self {
            AppError::TooManyRequests { limit, retry_after } => {
                let body = RateLimitBody {
                    error: "Rate limit exceeded",
                    detail: format!("Maximum {limit} requests per minute allowed"),
                    retry_after,
                };
                let mut response = (status, axum::Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                return response;
            }
            AppError::Validation(fields) => (
                "Validation Error",
                "Request validation failed".to_string(),
                Some(fields),
            ),
            AppError::Unavailable(msg) => {
                // Log the real cause server-side, return generic message to client
                tracing::error!("Backend unavailable: {}", msg);
                (
                    "Service Unavailable",
                    "Service temporarily unavailable".to_string(),
                    None,
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    "Internal Server Error",
                    "An unexpected error occurred".to_string(),
                    None,
                )
            }
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg) => ("HTTP Error", msg, None),
        };

        let body = ErrorBody {
            error,
            detail,
            status_code: status.as_u16(),
            validation_errors,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<AccessError> for AppError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::AuthenticationFailed => AppError::Unauthorized(e.to_string()),
            AccessError::AuthorizationDenied(reason) => AppError::Forbidden(reason.to_string()),
            AccessError::RateLimitExceeded { limit, retry_after } => {
                AppError::TooManyRequests { limit, retry_after }
            }
            AccessError::BackendUnavailable(reason) => AppError::Unavailable(reason),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotFound(_) => AppError::NotFound(e.to_string()),
            CoreError::Conflict(msg) | CoreError::BadRequest(msg) => AppError::BadRequest(msg),
            CoreError::Validation(fields) => AppError::Validation(fields),
            CoreError::InvalidLogin => AppError::Unauthorized(e.to_string()),
            CoreError::Access(access) => access.into(),
            CoreError::Store(StoreError::Conflict { .. }) => AppError::BadRequest(e.to_string()),
            CoreError::Store(StoreError::Timeout(_)) => AppError::Unavailable(e.to_string()),
            CoreError::Store(_)
            | CoreError::InvalidConfig(_)
            | CoreError::Internal(_)
            | CoreError::Io(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(format!("{e:#}"))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(vec![FieldError::new("body", rejection.body_text())])
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::Validation(vec![FieldError::new("body", rejection.body_text())])
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(vec![FieldError::new("query", rejection.body_text())])
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(vec![FieldError::new("path", rejection.body_text())])
    }
}
