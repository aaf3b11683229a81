use std::time::Duration;

use async_trait::async_trait;

/// Result of one admission attempt against a window store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub admitted: bool,
    /// Timestamps in the window after this attempt.
    pub count: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("no answer within {0:?}")]
    Timeout(Duration),
}

/// A windowed counter store.
///
/// `admit` must prune, count and conditionally record as one atomic step
/// per key: timestamps `<= now - window` are discarded, the request is
/// admitted iff fewer than `limit` remain, and `now` is recorded only on
/// admission.
#[async_trait]
pub trait WindowBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn admit(
        &self,
        key: &str,
        now: u64,
        limit: u32,
        window: u64,
    ) -> Result<WindowCount, BackendError>;

    /// Drops keys that have seen no traffic for a whole window. Stores with
    /// native expiry ignore this.
    fn sweep(&self, _now: u64, _window: u64) -> usize {
        0
    }
}
