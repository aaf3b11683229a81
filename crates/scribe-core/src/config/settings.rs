//! Configuration sections for the core components.
//!
//! Each component receives its section explicitly at construction time;
//! nothing here is read from process-wide state. All fields have defaults
//! so an empty TOML table is a valid section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Token signing and identity lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HMAC secret used to sign access tokens.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_minutes")]
    pub access_token_ttl_minutes: u64,
    /// Upper bound on a single identity lookup inside the access chain.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

impl AuthSettings {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_ttl_minutes * 60)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Rejects settings that would make every token unusable.
    pub fn validate(&self) -> CoreResult<()> {
        if self.jwt_secret.is_empty() {
            return Err(CoreError::InvalidConfig("auth.jwt_secret is empty".to_string()));
        }
        if self.access_token_ttl_minutes == 0 {
            return Err(CoreError::InvalidConfig(
                "auth.access_token_ttl_minutes must be greater than 0".to_string(),
            ));
        }
        if self.lookup_timeout_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "auth.lookup_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_ttl_minutes: default_token_ttl_minutes(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

/// Sliding-window rate limiting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Shared counter store. `None` selects the in-process backend directly.
    #[serde(default = "default_redis_url")]
    pub redis_url: Option<String>,
    /// Upper bound on the startup probe and on each admission round-trip.
    #[serde(default = "default_backend_timeout_ms")]
    pub backend_timeout_ms: u64,
    /// Path prefixes that bypass the limiter entirely.
    #[serde(default = "default_exempt_paths")]
    pub exempt_paths: Vec<String>,
    /// How often idle keys are swept from the in-process backend.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl RateLimitSettings {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.requests_per_minute == 0 {
            return Err(CoreError::InvalidConfig(
                "rate_limit.requests_per_minute must be greater than 0".to_string(),
            ));
        }
        if self.backend_timeout_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "rate_limit.backend_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: default_requests_per_minute(),
            redis_url: default_redis_url(),
            backend_timeout_ms: default_backend_timeout_ms(),
            exempt_paths: default_exempt_paths(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// `memory` for the in-process store, otherwise a `sqlite:` URL.
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn is_memory(&self) -> bool {
        self.url == "memory"
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_token_ttl_minutes() -> u64 {
    30
}

fn default_lookup_timeout_ms() -> u64 {
    2_000
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_redis_url() -> Option<String> {
    Some("redis://127.0.0.1:6379/0".to_string())
}

fn default_backend_timeout_ms() -> u64 {
    250
}

fn default_exempt_paths() -> Vec<String> {
    ["/health", "/docs", "/redoc", "/openapi.json"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_database_url() -> String {
    "sqlite://scribe.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sections {
        #[serde(default)]
        auth: AuthSettings,
        #[serde(default)]
        rate_limit: RateLimitSettings,
        #[serde(default)]
        database: DatabaseSettings,
    }

    #[test]
    fn empty_document_uses_defaults() {
        let sections: Sections = toml::from_str("").unwrap();
        assert_eq!(sections.auth.access_token_ttl_minutes, 30);
        assert_eq!(sections.rate_limit.requests_per_minute, 60);
        assert!(sections.rate_limit.enabled);
        assert_eq!(sections.database.url, "sqlite://scribe.db");
    }

    #[test]
    fn default_exempt_paths_cover_health_and_docs() {
        let settings = RateLimitSettings::default();
        assert_eq!(
            settings.exempt_paths,
            vec!["/health", "/docs", "/redoc", "/openapi.json"]
        );
    }

    #[test]
    fn partial_rate_limit_section_keeps_other_defaults() {
        let sections: Sections = toml::from_str(
            r#"
            [rate_limit]
            requests_per_minute = 5
            "#,
        )
        .unwrap();
        assert_eq!(sections.rate_limit.requests_per_minute, 5);
        assert_eq!(sections.rate_limit.backend_timeout_ms, 250);
        assert!(sections.rate_limit.redis_url.is_some());
    }

    #[test]
    fn zero_limit_is_rejected() {
        let settings = RateLimitSettings {
            requests_per_minute: 0,
            ..RateLimitSettings::default()
        };
        assert!(matches!(settings.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let limits = RateLimitSettings {
            backend_timeout_ms: 0,
            ..RateLimitSettings::default()
        };
        assert!(matches!(
            limits.validate(),
            Err(CoreError::InvalidConfig(msg)) if msg.contains("backend_timeout_ms")
        ));
        assert!(RateLimitSettings::default().validate().is_ok());

        let auth = AuthSettings {
            jwt_secret: "a-sufficiently-long-test-secret-value".to_string(),
            lookup_timeout_ms: 0,
            ..AuthSettings::default()
        };
        assert!(matches!(
            auth.validate(),
            Err(CoreError::InvalidConfig(msg)) if msg.contains("lookup_timeout_ms")
        ));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let settings = AuthSettings::default();
        assert!(settings.validate().is_err());

        let settings = AuthSettings {
            jwt_secret: "a-sufficiently-long-test-secret-value".to_string(),
            ..AuthSettings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn durations_derive_from_fields() {
        let auth = AuthSettings::default();
        assert_eq!(auth.token_ttl(), Duration::from_secs(30 * 60));
        assert_eq!(auth.lookup_timeout(), Duration::from_millis(2_000));
    }

    #[test]
    fn memory_database_is_detected() {
        let db = DatabaseSettings {
            url: "memory".to_string(),
            ..DatabaseSettings::default()
        };
        assert!(db.is_memory());
        assert!(!DatabaseSettings::default().is_memory());
    }
}
