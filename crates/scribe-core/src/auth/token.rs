//! Signed, time-limited identity tokens (HS256 JWT).
//!
//! Tokens are stateless. A token is valid iff its signature verifies under
//! the configured secret and its `exp` claim is strictly after the current
//! instant. There is no leeway, so a zero ttl yields a token that is already
//! expired.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::settings::AuthSettings;
use crate::error::{CoreError, CoreResult};
use crate::model::user::UserId;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: u64,
    iat: u64,
}

/// A freshly signed token and its absolute expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Lifetime in seconds, as reported to clients.
    pub expires_in: u64,
}

/// Why a token was refused. Callers collapse every variant into a single
/// authentication failure; the distinction only feeds logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token has expired")]
    Expired,
}

/// Issues and verifies access tokens with one HMAC secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    default_ttl: Duration,
}

impl TokenService {
    pub fn new(settings: &AuthSettings) -> Self {
        let secret = settings.jwt_secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by hand below so that `exp == now` is rejected.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            default_ttl: settings.token_ttl(),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Signs a token for `subject` that expires `ttl` from now.
    pub fn issue(&self, subject: UserId, ttl: Duration) -> CoreResult<IssuedToken> {
        let now = unix_now();
        let exp = now + ttl.as_secs();
        let claims = Claims {
            sub: subject.to_string(),
            exp,
            iat: now,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CoreError::Internal(format!("failed to sign token: {e}")))?;
        let expires_at = Utc
            .timestamp_opt(exp as i64, 0)
            .single()
            .ok_or_else(|| CoreError::Internal(format!("expiry {exp} out of range")))?;

        Ok(IssuedToken {
            token,
            expires_at,
            expires_in: ttl.as_secs(),
        })
    }

    /// Signs a token with the configured lifetime.
    pub fn issue_default(&self, subject: UserId) -> CoreResult<IssuedToken> {
        self.issue(subject, self.default_ttl)
    }

    /// Returns the subject of a valid token.
    pub fn verify(&self, token: &str) -> Result<UserId, TokenRejection> {
        self.verify_at(token, unix_now())
    }

    fn verify_at(&self, token: &str, now: u64) -> Result<UserId, TokenRejection> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                _ => TokenRejection::Malformed,
            }
        })?;

        if data.claims.exp <= now {
            return Err(TokenRejection::Expired);
        }

        data.claims
            .sub
            .parse::<UserId>()
            .map_err(|_| TokenRejection::Malformed)
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

    fn service(secret: &str) -> TokenService {
        TokenService::new(&AuthSettings {
            jwt_secret: secret.to_string(),
            ..AuthSettings::default()
        })
    }

    #[test]
    fn round_trip_returns_subject() {
        let tokens = service("test-secret");
        let issued = tokens.issue(42, Duration::from_secs(60)).unwrap();
        assert_eq!(tokens.verify(&issued.token), Ok(42));
        assert_eq!(issued.expires_in, 60);
    }

    #[test]
    fn default_ttl_comes_from_settings() {
        let tokens = service("test-secret");
        assert_eq!(tokens.default_ttl(), Duration::from_secs(30 * 60));
        let issued = tokens.issue_default(7).unwrap();
        assert_eq!(issued.expires_in, 1800);
        assert!(issued.expires_at > Utc::now());
    }

    #[test]
    fn zero_ttl_is_immediately_expired() {
        let tokens = service("test-secret");
        let issued = tokens.issue(1, Duration::ZERO).unwrap();
        assert_eq!(tokens.verify(&issued.token), Err(TokenRejection::Expired));
    }

    #[test]
    fn expiry_is_exclusive_of_now() {
        let tokens = service("test-secret");
        let issued = tokens.issue(1, Duration::from_secs(10)).unwrap();
        let exp = issued.expires_at.timestamp() as u64;
        assert_eq!(tokens.verify_at(&issued.token, exp - 1), Ok(1));
        assert_eq!(
            tokens.verify_at(&issued.token, exp),
            Err(TokenRejection::Expired)
        );
    }

    #[test]
    fn flipped_signature_is_rejected() {
        let tokens = service("test-secret");
        let issued = tokens.issue(5, Duration::from_secs(60)).unwrap();

        let (head, signature) = issued.token.rsplit_once('.').unwrap();
        let mut sig: Vec<char> = signature.chars().collect();
        sig[0] = if sig[0] == 'A' { 'B' } else { 'A' };
        let forged = format!("{head}.{}", sig.into_iter().collect::<String>());

        assert_eq!(tokens.verify(&forged), Err(TokenRejection::BadSignature));
    }

    #[test]
    fn other_secret_is_rejected() {
        let issued = service("secret-one")
            .issue(5, Duration::from_secs(60))
            .unwrap();
        assert_eq!(
            service("secret-two").verify(&issued.token),
            Err(TokenRejection::BadSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let tokens = service("test-secret");
        assert_eq!(tokens.verify(""), Err(TokenRejection::Malformed));
        assert_eq!(tokens.verify("not.a.jwt"), Err(TokenRejection::Malformed));
    }

    #[test]
    fn non_numeric_subject_is_malformed() {
        let secret = "test-secret";
        let claims = Claims {
            sub: "alice".to_string(),
            exp: unix_now() + 60,
            iat: unix_now(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        assert_eq!(service(secret).verify(&token), Err(TokenRejection::Malformed));
    }
}
