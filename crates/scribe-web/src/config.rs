use std::net::SocketAddr;
use std::path::PathBuf;

use scribe_core::{AuthSettings, DatabaseSettings, RateLimitSettings};
use serde::Deserialize;

/// Secrets that ship in sample configs and must never reach production.
const WEAK_SECRETS: &[&str] = &[
    "change-me-to-a-random-secret",
    "secret",
    "password",
    "jwt-secret",
];

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_cors_origins(),
        }
    }
}

/// Administrator created or promoted at startup when all three fields are
/// set. `password_hash` comes from the `hash_password` binary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl AdminConfig {
    pub fn credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.username, &self.email, &self.password_hash) {
            (Some(u), Some(e), Some(h)) if !u.is_empty() && !e.is_empty() && !h.is_empty() => {
                Some((u, e, h))
            }
            _ => None,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_project_name() -> String {
    "Scribe".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:8080".to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            project_name: default_project_name(),
            debug: false,
            max_body_bytes: default_max_body_bytes(),
            tls: TlsConfig::default(),
            cors: CorsConfig::default(),
            database: DatabaseSettings::default(),
            auth: AuthSettings::default(),
            rate_limit: RateLimitSettings::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn tls_enabled(&self) -> bool {
        self.tls.cert_path.is_some() && self.tls.key_path.is_some()
    }

    /// Reads `SCRIBE_CONFIG` (if set), applies `SCRIBE_*` environment
    /// overrides and checks the result.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("SCRIBE_CONFIG").map(PathBuf::from).ok();

        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(&path)?;
            Self::from_toml_str(&contents)?
        } else {
            ServerConfig::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.finalize()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(secret) = var("SCRIBE_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(url) = var("SCRIBE_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(url) = var("SCRIBE_REDIS_URL") {
            self.rate_limit.redis_url = (!url.is_empty()).then_some(url);
        }
        if let Some(val) = var("SCRIBE_RATE_LIMIT_PER_MINUTE") {
            self.rate_limit.requests_per_minute = val.parse()?;
        }
        if let Some(addr) = var("SCRIBE_BIND_ADDR") {
            self.bind_addr = addr.parse()?;
        }
        if let Some(cert) = var("SCRIBE_TLS_CERT") {
            self.tls.cert_path = Some(cert);
        }
        if let Some(key) = var("SCRIBE_TLS_KEY") {
            self.tls.key_path = Some(key);
        }
        if let Some(hash) = var("SCRIBE_ADMIN_PASSWORD_HASH") {
            self.admin.password_hash = Some(hash);
        }
        Ok(())
    }

    /// Fills in a random secret when none is configured, rejects placeholder
    /// secrets and validates the core sections.
    pub fn finalize(&mut self) -> anyhow::Result<()> {
        if self.auth.jwt_secret.is_empty() {
            self.auth.jwt_secret = uuid::Uuid::new_v4().simple().to_string();
            tracing::warn!(
                "No JWT secret configured. Generated random secret (will change on restart)."
            );
        }
        if WEAK_SECRETS.iter().any(|&w| self.auth.jwt_secret == w) {
            anyhow::bail!(
                "JWT secret matches a known weak/placeholder value. \
                 Set a strong random secret via SCRIBE_JWT_SECRET environment variable."
            );
        }
        if self.auth.jwt_secret.len() < 32 {
            tracing::warn!(
                "JWT secret is shorter than 32 characters. \
                 Consider using a stronger secret via SCRIBE_JWT_SECRET."
            );
        }

        self.auth.validate()?;
        self.rate_limit.validate()?;
        Ok(())
    }
}
