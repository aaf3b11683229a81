//! The per-request access control chain.
//!
//! Stages run in order and stop at the first failure:
//!
//! 1. extract the bearer credential from the `Authorization` header,
//! 2. verify the token and read its subject,
//! 3. resolve the subject to a stored user (bounded by a timeout),
//! 4. require the user to be active,
//! 5. require the capability named by the [`Requirement`].
//!
//! Stages 1–3 fail with [`AccessError::AuthenticationFailed`] and reveal
//! nothing about which stage refused. Stages 4–5 fail with
//! [`AccessError::AuthorizationDenied`]. A store that errors or does not
//! answer in time yields [`AccessError::BackendUnavailable`].
//!
//! [`AccessControl::optional`] runs the same chain but degrades every
//! failure to [`Caller::Anonymous`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::token::TokenService;
use crate::error::{AccessError, DenialReason};
use crate::model::user::{User, UserId};
use crate::store::UserRepository;

/// Capability a route demands beyond an active identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    ActiveVerified,
    Superuser,
}

/// Outcome of the optional chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Caller {
    Anonymous,
    User(User),
}

impl Caller {
    pub fn user(&self) -> Option<&User> {
        match self {
            Caller::User(user) => Some(user),
            Caller::Anonymous => None,
        }
    }

    pub fn id(&self) -> Option<UserId> {
        self.user().map(|u| u.id)
    }

    pub fn is_superuser(&self) -> bool {
        self.user().is_some_and(|u| u.is_superuser)
    }
}

/// Returns the token from a `Bearer <token>` header value. The scheme is
/// matched case-insensitively; an empty token is treated as absent.
pub fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Succeeds iff `caller` owns the resource or is a superuser.
pub fn check_ownership(owner_id: UserId, caller: &User) -> Result<(), AccessError> {
    if caller.id == owner_id || caller.is_superuser {
        Ok(())
    } else {
        Err(AccessError::AuthorizationDenied(DenialReason::NotOwner(
            "modify this post",
        )))
    }
}

/// Succeeds iff `caller` is the target user or a superuser.
pub fn check_user_access(target_id: UserId, caller: &User) -> Result<(), AccessError> {
    if caller.id == target_id || caller.is_superuser {
        Ok(())
    } else {
        Err(AccessError::AuthorizationDenied(DenialReason::NotOwner(
            "access this user's data",
        )))
    }
}

pub struct AccessControl {
    tokens: TokenService,
    users: Arc<dyn UserRepository>,
    lookup_timeout: Duration,
}

impl AccessControl {
    pub fn new(tokens: TokenService, users: Arc<dyn UserRepository>, lookup_timeout: Duration) -> Self {
        Self {
            tokens,
            users,
            lookup_timeout,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Stages 1–2 only: the subject of a valid bearer token, without
    /// touching the store. Used to key rate limiting by identity.
    pub fn identify(&self, header: Option<&str>) -> Option<UserId> {
        let token = header.and_then(extract_bearer)?;
        self.tokens.verify(token).ok()
    }

    /// Runs the full chain for a required-auth route.
    pub async fn authorize(
        &self,
        header: Option<&str>,
        requirement: Requirement,
    ) -> Result<User, AccessError> {
        let user = self.resolve(header).await?;

        if !user.is_active {
            debug!(user_id = user.id, "inactive user refused");
            return Err(AccessError::AuthorizationDenied(DenialReason::Inactive));
        }

        match requirement {
            Requirement::Authenticated => {}
            Requirement::ActiveVerified if !user.is_verified => {
                return Err(AccessError::AuthorizationDenied(DenialReason::Unverified));
            }
            Requirement::Superuser if !user.is_superuser => {
                return Err(AccessError::AuthorizationDenied(DenialReason::NotSuperuser));
            }
            Requirement::ActiveVerified | Requirement::Superuser => {}
        }

        Ok(user)
    }

    /// Runs stages 1–4 and degrades any failure to [`Caller::Anonymous`].
    /// Store outages are logged so they stay distinguishable from genuinely
    /// anonymous traffic.
    pub async fn optional(&self, header: Option<&str>) -> Caller {
        if header.is_none() {
            return Caller::Anonymous;
        }
        match self.authorize(header, Requirement::Authenticated).await {
            Ok(user) => Caller::User(user),
            Err(AccessError::BackendUnavailable(reason)) => {
                warn!(%reason, "identity lookup failed, treating caller as anonymous");
                Caller::Anonymous
            }
            Err(_) => Caller::Anonymous,
        }
    }

    /// Stages 1–3.
    async fn resolve(&self, header: Option<&str>) -> Result<User, AccessError> {
        let token = header
            .and_then(extract_bearer)
            .ok_or(AccessError::AuthenticationFailed)?;

        let user_id = self.tokens.verify(token).map_err(|rejection| {
            debug!(%rejection, "token refused");
            AccessError::AuthenticationFailed
        })?;

        let lookup = tokio::time::timeout(self.lookup_timeout, self.users.find_by_id(user_id))
            .await
            .map_err(|_| {
                AccessError::BackendUnavailable(format!(
                    "identity lookup exceeded {:?}",
                    self.lookup_timeout
                ))
            })?;

        match lookup {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                debug!(user_id, "token subject no longer exists");
                Err(AccessError::AuthenticationFailed)
            }
            Err(e) => Err(AccessError::BackendUnavailable(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::AuthSettings;
    use crate::model::user::fixtures;
    use crate::store::memory::MemoryStore;
    use crate::store::testing::UnavailableStore;

    fn tokens() -> TokenService {
        TokenService::new(&AuthSettings {
            jwt_secret: "access-test-secret".to_string(),
            ..AuthSettings::default()
        })
    }

    async fn chain_with(
        configure: impl FnOnce(&mut crate::model::user::UserDraft),
    ) -> (AccessControl, String) {
        let store = Arc::new(MemoryStore::new());
        let mut draft = fixtures::draft("alice");
        configure(&mut draft);
        let user = UserRepository::insert(store.as_ref(), draft).await.unwrap();

        let tokens = tokens();
        let token = tokens.issue(user.id, Duration::from_secs(60)).unwrap().token;
        let header = format!("Bearer {token}");
        (AccessControl::new(tokens, store, Duration::from_secs(1)), header)
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("Basic abc"), None);
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Bearer"), None);
    }

    #[tokio::test]
    async fn missing_or_bad_credentials_are_generic() {
        let (chain, _) = chain_with(|_| {}).await;
        for header in [None, Some("Basic xyz"), Some("Bearer not-a-token")] {
            assert_eq!(
                chain.authorize(header, Requirement::Authenticated).await,
                Err(AccessError::AuthenticationFailed)
            );
        }
    }

    #[tokio::test]
    async fn dangling_subject_is_unauthenticated() {
        let (chain, _) = chain_with(|_| {}).await;
        let token = chain.tokens().issue(999, Duration::from_secs(60)).unwrap().token;
        let header = format!("Bearer {token}");
        assert_eq!(
            chain.authorize(Some(&header), Requirement::Authenticated).await,
            Err(AccessError::AuthenticationFailed)
        );
    }

    #[tokio::test]
    async fn inactive_user_is_forbidden() {
        let (chain, header) = chain_with(|d| d.is_active = false).await;
        assert_eq!(
            chain.authorize(Some(&header), Requirement::Authenticated).await,
            Err(AccessError::AuthorizationDenied(DenialReason::Inactive))
        );
    }

    #[tokio::test]
    async fn unverified_user_passes_authenticated_only() {
        let (chain, header) = chain_with(|d| d.is_verified = false).await;
        assert!(chain
            .authorize(Some(&header), Requirement::Authenticated)
            .await
            .is_ok());
        assert_eq!(
            chain.authorize(Some(&header), Requirement::ActiveVerified).await,
            Err(AccessError::AuthorizationDenied(DenialReason::Unverified))
        );
    }

    #[tokio::test]
    async fn superuser_requirement() {
        let (chain, header) = chain_with(|d| d.is_verified = true).await;
        assert_eq!(
            chain.authorize(Some(&header), Requirement::Superuser).await,
            Err(AccessError::AuthorizationDenied(DenialReason::NotSuperuser))
        );

        let (chain, header) = chain_with(|d| d.is_superuser = true).await;
        assert!(chain
            .authorize(Some(&header), Requirement::Superuser)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn optional_degrades_to_anonymous() {
        let (chain, header) = chain_with(|_| {}).await;
        assert!(matches!(chain.optional(Some(&header)).await, Caller::User(_)));
        assert_eq!(chain.optional(None).await, Caller::Anonymous);
        assert_eq!(chain.optional(Some("Bearer junk")).await, Caller::Anonymous);

        let (inactive, header) = chain_with(|d| d.is_active = false).await;
        assert_eq!(inactive.optional(Some(&header)).await, Caller::Anonymous);
    }

    #[tokio::test]
    async fn store_outage_is_backend_unavailable() {
        let tokens = tokens();
        let token = tokens.issue(1, Duration::from_secs(60)).unwrap().token;
        let header = format!("Bearer {token}");
        let chain = AccessControl::new(tokens, Arc::new(UnavailableStore), Duration::from_secs(1));

        assert!(matches!(
            chain.authorize(Some(&header), Requirement::Authenticated).await,
            Err(AccessError::BackendUnavailable(_))
        ));
        assert_eq!(chain.optional(Some(&header)).await, Caller::Anonymous);
    }

    #[tokio::test]
    async fn identify_skips_the_store() {
        let tokens = tokens();
        let token = tokens.issue(42, Duration::from_secs(60)).unwrap().token;
        let chain = AccessControl::new(tokens, Arc::new(UnavailableStore), Duration::from_secs(1));
        assert_eq!(chain.identify(Some(&format!("Bearer {token}"))), Some(42));
        assert_eq!(chain.identify(Some("Bearer junk")), None);
        assert_eq!(chain.identify(None), None);
    }

    #[test]
    fn ownership_matrix() {
        let owner = fixtures::user(5, "owner");
        let other = fixtures::user(6, "other");
        let mut admin = fixtures::user(6, "admin");
        admin.is_superuser = true;

        assert!(check_ownership(5, &owner).is_ok());
        assert_eq!(
            check_ownership(5, &other),
            Err(AccessError::AuthorizationDenied(DenialReason::NotOwner(
                "modify this post"
            )))
        );
        assert!(check_ownership(5, &admin).is_ok());

        assert!(check_user_access(5, &owner).is_ok());
        assert!(check_user_access(5, &other).is_err());
        assert!(check_user_access(5, &admin).is_ok());
    }
}
