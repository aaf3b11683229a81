//! Use cases built on the repositories.
//!
//! Services own validation, uniqueness messages and permission predicates
//! that depend on stored state. They never see HTTP types.

pub mod posts;
pub mod users;

use crate::error::CoreError;
use crate::store::StoreError;

/// Turns a store uniqueness violation into the caller-facing message.
pub(crate) fn conflict_message(err: StoreError) -> CoreError {
    match err {
        StoreError::Conflict { field: "email" } => {
            CoreError::Conflict("Email already registered".to_string())
        }
        StoreError::Conflict { field: "username" } => {
            CoreError::Conflict("Username already taken".to_string())
        }
        StoreError::Conflict { field: "slug" } => {
            CoreError::Conflict("Slug already exists".to_string())
        }
        other => CoreError::Store(other),
    }
}

/// Reports a row that vanished mid-operation as `entity` not found.
pub(crate) fn not_found(entity: &'static str) -> impl FnOnce(StoreError) -> CoreError {
    move |err| match err {
        StoreError::Missing => CoreError::NotFound(entity),
        other => CoreError::Store(other),
    }
}

/// Runs a CPU-heavy closure (password hashing) off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, CoreError>
where
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoreError::Internal(format!("blocking task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_get_friendly_messages() {
        let err = conflict_message(StoreError::Conflict { field: "email" });
        assert_eq!(err.to_string(), "Email already registered");
        let err = conflict_message(StoreError::Conflict { field: "username" });
        assert_eq!(err.to_string(), "Username already taken");
        let err = conflict_message(StoreError::Missing);
        assert!(matches!(err, CoreError::Store(StoreError::Missing)));
    }

    #[test]
    fn missing_rows_become_not_found() {
        let err = not_found("Post")(StoreError::Missing);
        assert!(matches!(err, CoreError::NotFound("Post")));
        let err = not_found("Post")(StoreError::Database("locked".to_string()));
        assert!(matches!(err, CoreError::Store(StoreError::Database(_))));
    }

    #[tokio::test]
    async fn blocking_propagates_results() {
        assert_eq!(blocking(|| Ok(2 + 2)).await.unwrap(), 4);
        let err = blocking::<(), _>(|| Err(CoreError::Internal("boom".to_string())))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "internal error: boom");
    }
}
