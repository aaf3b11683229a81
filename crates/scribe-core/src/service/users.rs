use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{blocking, conflict_message, not_found};
use crate::auth::password::{hash_password, verify_password};
use crate::error::{AccessError, CoreError, CoreResult, DenialReason};
use crate::model::user::{NewUser, PasswordChange, User, UserDraft, UserId, UserUpdate};
use crate::pagination::{Page, PageRequest};
use crate::store::{PostFilter, PostRepository, PostVisibility, UserFilter, UserRepository};

const MAX_SEARCH_RESULTS: u64 = 50;

/// Counts for the admin dashboard. `activation_rate` is a percentage
/// rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub total_users: u64,
    pub active_users: u64,
    pub inactive_users: u64,
    pub activation_rate: f64,
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    posts: Arc<dyn PostRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, posts: Arc<dyn PostRepository>) -> Self {
        Self { users, posts }
    }

    #[instrument(skip_all, fields(username = %new_user.username))]
    pub async fn register(&self, new_user: NewUser) -> CoreResult<User> {
        new_user.validate().map_err(CoreError::Validation)?;

        if self.users.find_by_email(&new_user.email).await?.is_some() {
            return Err(CoreError::Conflict("Email already registered".to_string()));
        }
        if self.users.find_by_username(&new_user.username).await?.is_some() {
            return Err(CoreError::Conflict("Username already taken".to_string()));
        }

        let password = new_user.password.clone();
        let digest = blocking(move || hash_password(&password)).await?;
        let user = self
            .users
            .insert(new_user.into_draft(digest))
            .await
            .map_err(conflict_message)?;

        info!(user_id = user.id, "user registered");
        Ok(user)
    }

    /// Checks credentials and stamps `last_login`. Unknown identifiers and
    /// wrong passwords are indistinguishable to the caller.
    #[instrument(skip(self, password))]
    pub async fn login(&self, identifier: &str, password: &str) -> CoreResult<User> {
        let Some(mut user) = self.users.find_by_login(identifier).await? else {
            warn!("login for unknown identifier");
            return Err(CoreError::InvalidLogin);
        };

        let digest = user.password_hash.clone();
        let password = password.to_string();
        if !blocking(move || verify_password(&digest, &password)).await? {
            warn!(user_id = user.id, "login with wrong password");
            return Err(CoreError::InvalidLogin);
        }

        if !user.is_active {
            warn!(user_id = user.id, "login for inactive user");
            return Err(AccessError::AuthorizationDenied(DenialReason::Inactive).into());
        }

        let now = Utc::now();
        self.users.record_login(user.id, now).await?;
        user.last_login = Some(now);

        info!(user_id = user.id, "user logged in");
        Ok(user)
    }

    pub async fn get(&self, id: UserId) -> CoreResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(CoreError::NotFound("User"))
    }

    /// The user plus the number of posts they have written.
    pub async fn profile(&self, id: UserId) -> CoreResult<(User, u64)> {
        let user = self.get(id).await?;
        let filter = PostFilter {
            author_id: Some(id),
            visibility: PostVisibility::All,
            ..PostFilter::default()
        };
        let posts_count = self.posts.count(&filter).await?;
        Ok((user, posts_count))
    }

    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, id: UserId, update: UserUpdate) -> CoreResult<User> {
        update.validate().map_err(CoreError::Validation)?;
        self.get(id).await?;

        if let Some(email) = &update.email {
            if let Some(existing) = self.users.find_by_email(email).await? {
                if existing.id != id {
                    return Err(CoreError::Conflict("Email already registered".to_string()));
                }
            }
        }
        if let Some(username) = &update.username {
            if let Some(existing) = self.users.find_by_username(username).await? {
                if existing.id != id {
                    return Err(CoreError::Conflict("Username already taken".to_string()));
                }
            }
        }

        let user = self
            .users
            .update_profile(id, &update)
            .await
            .map_err(conflict_message)?;
        info!(user_id = user.id, "user updated");
        Ok(user)
    }

    #[instrument(skip(self, change))]
    pub async fn change_password(&self, id: UserId, change: PasswordChange) -> CoreResult<()> {
        change.validate().map_err(CoreError::Validation)?;
        let user = self.get(id).await?;

        let digest = user.password_hash;
        let current = change.current_password;
        if !blocking(move || verify_password(&digest, &current)).await? {
            return Err(CoreError::BadRequest("Incorrect current password".to_string()));
        }

        let new_password = change.new_password;
        let new_digest = blocking(move || hash_password(&new_password)).await?;
        self.users.set_password_hash(id, &new_digest).await?;

        info!(user_id = id, "password updated");
        Ok(())
    }

    /// Activates or deactivates `id`. An actor may not deactivate itself.
    #[instrument(skip(self, actor), fields(actor_id = actor.id))]
    pub async fn set_active(&self, actor: &User, id: UserId, active: bool) -> CoreResult<User> {
        if !active && actor.id == id {
            return Err(CoreError::BadRequest(
                "Cannot deactivate your own account".to_string(),
            ));
        }
        let user = self
            .users
            .set_active(id, active)
            .await
            .map_err(not_found("User"))?;
        info!(user_id = id, active, "user activation changed");
        Ok(user)
    }

    pub async fn mark_verified(&self, id: UserId) -> CoreResult<User> {
        let user = self.users.set_verified(id).await.map_err(not_found("User"))?;
        info!(user_id = id, "user verified");
        Ok(user)
    }

    pub async fn list(&self, request: PageRequest, filter: UserFilter) -> CoreResult<Page<User>> {
        let total = self.users.count(&filter).await?;
        let items = self
            .users
            .list(&filter, request.skip(), request.limit())
            .await?;
        Ok(Page::new(items, total, request))
    }

    pub async fn search(&self, query: &str, limit: u64) -> CoreResult<Vec<User>> {
        let query = query.trim();
        if query.chars().count() < 2 {
            return Err(CoreError::BadRequest(
                "Search query must be at least 2 characters long".to_string(),
            ));
        }
        let filter = UserFilter {
            search: Some(query.to_string()),
            is_active: None,
        };
        let limit = limit.clamp(1, MAX_SEARCH_RESULTS);
        Ok(self.users.list(&filter, 0, limit).await?)
    }

    pub async fn stats(&self) -> CoreResult<UserStats> {
        let total_users = self.users.count(&UserFilter::default()).await?;
        let active_users = self
            .users
            .count(&UserFilter {
                is_active: Some(true),
                ..UserFilter::default()
            })
            .await?;
        let activation_rate = if total_users == 0 {
            0.0
        } else {
            (active_users as f64 / total_users as f64 * 10_000.0).round() / 100.0
        };
        Ok(UserStats {
            total_users,
            active_users,
            inactive_users: total_users - active_users,
            activation_rate,
        })
    }

    /// Makes sure the configured administrator exists as an active, verified
    /// superuser. An existing account with that username is promoted and
    /// keeps its password.
    pub async fn ensure_admin(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> CoreResult<User> {
        if let Some(user) = self.users.find_by_username(username).await? {
            if user.is_active && user.is_verified && user.is_superuser {
                return Ok(user);
            }
            let user = self.users.promote_admin(user.id).await?;
            info!(user_id = user.id, "existing account promoted to administrator");
            return Ok(user);
        }

        let user = self
            .users
            .insert(UserDraft {
                username: username.to_string(),
                email: email.to_string(),
                full_name: None,
                bio: None,
                phone: None,
                password_hash: password_hash.to_string(),
                is_active: true,
                is_verified: true,
                is_superuser: true,
            })
            .await
            .map_err(conflict_message)?;
        info!(user_id = user.id, "administrator account created");
        Ok(user)
    }
}
