use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::debug;

use super::backend::{BackendError, WindowBackend, WindowCount};

const KEY_PREFIX: &str = "ratelimit:";

/// Prune, count, conditionally record and refresh expiry in one round trip.
///
/// KEYS[1] = window key; ARGV = now, window, limit, unique member.
/// Returns `{admitted, count}`.
const ADMIT_SCRIPT: &str = r"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
local admitted = 0
if count < limit then
    redis.call('ZADD', key, now, ARGV[4])
    count = count + 1
    admitted = 1
end
redis.call('EXPIRE', key, window)
return {admitted, count}
";

/// Shared sorted-set backend. One sorted set per client key, scored by
/// epoch seconds. Clones share the managed connection.
#[derive(Clone)]
pub struct RedisWindowBackend {
    connection_manager: ConnectionManager,
    script: Script,
}

impl RedisWindowBackend {
    /// Opens a managed connection and probes it with `PING`. Both steps are
    /// bounded by `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = redis::Client::open(url)?;

        let connection_manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| BackendError::Timeout(timeout))??;

        let mut conn = connection_manager.clone();
        tokio::time::timeout(timeout, redis::cmd("PING").query_async::<String>(&mut conn))
            .await
            .map_err(|_| BackendError::Timeout(timeout))??;

        debug!(url, "connected to redis for rate limiting");

        Ok(Self {
            connection_manager,
            script: Script::new(ADMIT_SCRIPT),
        })
    }
}

#[async_trait]
impl WindowBackend for RedisWindowBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn admit(
        &self,
        key: &str,
        now: u64,
        limit: u32,
        window: u64,
    ) -> Result<WindowCount, BackendError> {
        let mut conn = self.connection_manager.clone();
        // Unique per request so same-second hits are all counted.
        let member = format!("{now}-{}", uuid::Uuid::new_v4());

        let (admitted, count): (i64, i64) = self
            .script
            .key(format!("{KEY_PREFIX}{key}"))
            .arg(now)
            .arg(window)
            .arg(limit)
            .arg(member)
            .invoke_async(&mut conn)
            .await?;

        Ok(WindowCount {
            admitted: admitted == 1,
            count: count.max(0) as u32,
        })
    }
}
