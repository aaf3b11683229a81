//! Sliding-window admission gate.
//!
//! Every request is keyed by the caller's identity when it is already known,
//! otherwise by network address. Each key owns a trailing 60-second window
//! of request timestamps; a request is admitted iff fewer than the configured
//! limit remain in the window after pruning.
//!
//! The counter store is picked once, when the limiter is built:
//!
//! - [`shared::RedisWindowBackend`] when the configured Redis answers a probe,
//! - [`window::LocalWindowBackend`] otherwise, for the life of the process.
//!
//! A store error during admission admits the request (fail-open).

pub mod backend;
pub mod shared;
pub mod window;

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, error, warn};

use self::backend::{BackendError, WindowBackend};
use self::shared::RedisWindowBackend;
use self::window::LocalWindowBackend;
use crate::config::settings::RateLimitSettings;
use crate::error::AccessError;
use crate::model::user::UserId;

/// Length of the trailing window in seconds.
pub const WINDOW_SECS: u64 = 60;

/// Whose window a request counts against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientKey {
    User(UserId),
    Ip(String),
}

impl ClientKey {
    /// Identity wins; otherwise the first `X-Forwarded-For` entry, then the
    /// peer address, then `"unknown"`.
    pub fn derive(identity: Option<UserId>, forwarded_for: Option<&str>, peer: Option<IpAddr>) -> Self {
        if let Some(id) = identity {
            return ClientKey::User(id);
        }
        let forwarded = forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        match (forwarded, peer) {
            (Some(addr), _) => ClientKey::Ip(addr.to_string()),
            (None, Some(ip)) => ClientKey::Ip(ip.to_string()),
            (None, None) => ClientKey::Ip("unknown".to_string()),
        }
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientKey::User(id) => write!(f, "user:{id}"),
            ClientKey::Ip(addr) => write!(f, "ip:{addr}"),
        }
    }
}

/// Quota state reported on admitted responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Epoch seconds at which the current window has fully rolled over.
    pub reset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The path bypasses the limiter, or limiting is disabled.
    Exempt,
    Admitted(RateLimitInfo),
    Rejected { limit: u32, retry_after: u64 },
}

impl RateDecision {
    pub fn into_result(self) -> Result<Option<RateLimitInfo>, AccessError> {
        match self {
            RateDecision::Exempt => Ok(None),
            RateDecision::Admitted(info) => Ok(Some(info)),
            RateDecision::Rejected { limit, retry_after } => {
                Err(AccessError::RateLimitExceeded { limit, retry_after })
            }
        }
    }
}

pub struct RateLimiter {
    backend: Arc<dyn WindowBackend>,
    enabled: bool,
    limit: u32,
    timeout: Duration,
    exempt_paths: Vec<String>,
}

impl RateLimiter {
    /// Probes the configured Redis once and falls back to the in-process
    /// store when it is absent or does not answer.
    pub async fn connect(settings: &RateLimitSettings) -> Self {
        let backend: Arc<dyn WindowBackend> = match settings.redis_url.as_deref() {
            Some(url) => match RedisWindowBackend::connect(url, settings.backend_timeout()).await {
                Ok(redis) => Arc::new(redis),
                Err(e) => {
                    warn!(error = %e, "redis unavailable, rate limiting falls back to in-process windows");
                    Arc::new(LocalWindowBackend::new())
                }
            },
            None => Arc::new(LocalWindowBackend::new()),
        };
        Self::with_backend(settings, backend)
    }

    /// In-process store only.
    pub fn local(settings: &RateLimitSettings) -> Self {
        Self::with_backend(settings, Arc::new(LocalWindowBackend::new()))
    }

    pub fn with_backend(settings: &RateLimitSettings, backend: Arc<dyn WindowBackend>) -> Self {
        debug!(
            backend = backend.name(),
            limit = settings.requests_per_minute,
            enabled = settings.enabled,
            "rate limiter ready"
        );
        Self {
            backend,
            enabled: settings.enabled,
            limit: settings.requests_per_minute,
            timeout: settings.backend_timeout(),
            exempt_paths: settings.exempt_paths.clone(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        !self.enabled || self.exempt_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub async fn check(&self, path: &str, key: &ClientKey) -> RateDecision {
        self.check_at(path, key, unix_now()).await
    }

    pub async fn check_at(&self, path: &str, key: &ClientKey, now: u64) -> RateDecision {
        if self.is_exempt(path) {
            return RateDecision::Exempt;
        }

        let key_str = key.to_string();
        let outcome = tokio::time::timeout(
            self.timeout,
            self.backend.admit(&key_str, now, self.limit, WINDOW_SECS),
        )
        .await
        .unwrap_or(Err(BackendError::Timeout(self.timeout)));

        match outcome {
            Ok(count) if count.admitted => RateDecision::Admitted(RateLimitInfo {
                limit: self.limit,
                remaining: self.limit.saturating_sub(count.count),
                reset: now + WINDOW_SECS,
            }),
            Ok(count) => {
                debug!(key = %key_str, count = count.count, "rate limit exceeded");
                RateDecision::Rejected {
                    limit: self.limit,
                    retry_after: WINDOW_SECS,
                }
            }
            Err(e) => {
                error!(key = %key_str, backend = self.backend.name(), error = %e, "rate limit check failed, admitting request");
                RateDecision::Admitted(RateLimitInfo {
                    limit: self.limit,
                    remaining: self.limit,
                    reset: now + WINDOW_SECS,
                })
            }
        }
    }

    /// Drops idle windows from the in-process store.
    pub fn sweep(&self) -> usize {
        self.backend.sweep(unix_now(), WINDOW_SECS)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::backend::WindowCount;
    use async_trait::async_trait;

    fn settings(limit: u32) -> RateLimitSettings {
        RateLimitSettings {
            requests_per_minute: limit,
            redis_url: None,
            ..RateLimitSettings::default()
        }
    }

    fn ip(addr: &str) -> ClientKey {
        ClientKey::Ip(addr.to_string())
    }

    struct BrokenBackend;

    #[async_trait]
    impl WindowBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn admit(&self, _: &str, _: u64, _: u32, _: u64) -> Result<WindowCount, BackendError> {
            Err(BackendError::Timeout(Duration::from_millis(1)))
        }
    }

    struct StalledBackend;

    #[async_trait]
    impl WindowBackend for StalledBackend {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn admit(&self, _: &str, _: u64, _: u32, _: u64) -> Result<WindowCount, BackendError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(WindowCount {
                admitted: false,
                count: 0,
            })
        }
    }

    #[test]
    fn key_prefers_identity() {
        let peer = Some("10.0.0.9".parse().unwrap());
        assert_eq!(ClientKey::derive(Some(7), Some("1.2.3.4"), peer).to_string(), "user:7");
        assert_eq!(
            ClientKey::derive(None, Some(" 1.2.3.4 , 5.6.7.8"), peer).to_string(),
            "ip:1.2.3.4"
        );
        assert_eq!(ClientKey::derive(None, None, peer).to_string(), "ip:10.0.0.9");
        assert_eq!(ClientKey::derive(None, Some(""), None).to_string(), "ip:unknown");
    }

    async fn assert_limit_three_sequence(limiter: &RateLimiter) {
        let key = ip("1.1.1.1");
        for expected in [2, 1, 0] {
            match limiter.check_at("/api/v1/posts", &key, 1_000).await {
                RateDecision::Admitted(info) => {
                    assert_eq!(info.limit, 3);
                    assert_eq!(info.remaining, expected);
                    assert_eq!(info.reset, 1_060);
                }
                other => panic!("expected admission, got {other:?}"),
            }
        }
        assert_eq!(
            limiter.check_at("/api/v1/posts", &key, 1_010).await,
            RateDecision::Rejected {
                limit: 3,
                retry_after: 60
            }
        );
        assert!(matches!(
            limiter.check_at("/api/v1/posts", &key, 1_060).await,
            RateDecision::Admitted(_)
        ));
    }

    #[tokio::test]
    async fn limit_three_sequence() {
        assert_limit_three_sequence(&RateLimiter::local(&settings(3))).await;
    }

    #[tokio::test]
    async fn fallback_backend_behaves_identically() {
        let settings = RateLimitSettings {
            redis_url: Some("redis://127.0.0.1:1/0".to_string()),
            ..settings(3)
        };
        let limiter = RateLimiter::connect(&settings).await;
        assert_eq!(limiter.backend_name(), "local");
        assert_limit_three_sequence(&limiter).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_admit_exactly_limit() {
        let limiter = Arc::new(RateLimiter::local(&settings(5)));
        let mut handles = Vec::new();
        for _ in 0..40 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.check_at("/api/v1/posts", &ip("9.9.9.9"), 500).await
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), RateDecision::Admitted(_)) {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }

    #[tokio::test]
    async fn exempt_paths_always_pass() {
        let limiter = RateLimiter::local(&settings(1));
        let key = ip("2.2.2.2");
        for _ in 0..5 {
            assert_eq!(limiter.check_at("/health", &key, 0).await, RateDecision::Exempt);
            assert_eq!(limiter.check_at("/docs/index", &key, 0).await, RateDecision::Exempt);
        }
        assert!(!limiter.is_exempt("/api/v1/health"));
        assert!(matches!(
            limiter.check_at("/api/v1/posts", &key, 0).await,
            RateDecision::Admitted(_)
        ));
    }

    #[tokio::test]
    async fn disabled_limiter_exempts_everything() {
        let limiter = RateLimiter::local(&RateLimitSettings {
            enabled: false,
            ..settings(1)
        });
        for _ in 0..3 {
            assert_eq!(
                limiter.check_at("/api/v1/posts", &ip("3.3.3.3"), 0).await,
                RateDecision::Exempt
            );
        }
    }

    #[tokio::test]
    async fn backend_error_fails_open() {
        let limiter = RateLimiter::with_backend(&settings(3), Arc::new(BrokenBackend));
        match limiter.check_at("/api/v1/posts", &ip("4.4.4.4"), 10).await {
            RateDecision::Admitted(info) => assert_eq!(info.remaining, 3),
            other => panic!("expected fail-open admission, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backend_times_out_open() {
        let limiter = RateLimiter::with_backend(&settings(3), Arc::new(StalledBackend));
        assert!(matches!(
            limiter.check_at("/api/v1/posts", &ip("5.5.5.5"), 10).await,
            RateDecision::Admitted(_)
        ));
    }

    #[test]
    fn rejection_maps_to_access_error() {
        let decision = RateDecision::Rejected {
            limit: 60,
            retry_after: 60,
        };
        assert_eq!(
            decision.into_result(),
            Err(AccessError::RateLimitExceeded {
                limit: 60,
                retry_after: 60
            })
        );
        assert_eq!(RateDecision::Exempt.into_result(), Ok(None));
    }
}
