//! Persistence traits and their implementations.
//!
//! Services depend on [`UserRepository`] and [`PostRepository`] trait
//! objects. Two implementations ship with the crate:
//!
//! - [`memory::MemoryStore`] keeps everything in process (tests, demos).
//! - [`sqlite::SqliteStore`] persists to SQLite through `sqlx`.
//!
//! Uniqueness of usernames, emails and slugs is enforced here and surfaces
//! as [`StoreError::Conflict`].
//!
//! Writes are column-scoped: each method touches only the columns it names,
//! so concurrent writers of different fields never overwrite each other
//! with stale copies.

pub mod memory;
pub mod sqlite;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::post::{Post, PostDraft, PostId, PostUpdate};
use crate::model::user::{User, UserDraft, UserId, UserUpdate};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A unique column already holds this value.
    #[error("{field} already exists")]
    Conflict { field: &'static str },

    /// The record to update does not exist.
    #[error("record not found")]
    Missing,

    #[error("database error: {0}")]
    Database(String),

    #[error("store did not answer within {0:?}")]
    Timeout(Duration),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                let message = db.message();
                let field = if message.contains("users.email") {
                    "email"
                } else if message.contains("users.username") {
                    "username"
                } else if message.contains("posts.slug") {
                    "slug"
                } else {
                    "record"
                };
                return StoreError::Conflict { field };
            }
        }
        if let sqlx::Error::RowNotFound = err {
            return StoreError::Missing;
        }
        StoreError::Database(err.to_string())
    }
}

/// Listing filter for users. `search` matches username, email or full name.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

/// Which unpublished posts a listing may include.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostVisibility {
    #[default]
    PublishedOnly,
    /// Published posts plus every post by this author.
    PublishedOrAuthoredBy(UserId),
    All,
}

/// Listing filter for posts. `search` matches title or content.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub search: Option<String>,
    pub author_id: Option<UserId>,
    pub tag: Option<String>,
    pub is_featured: Option<bool>,
    pub visibility: PostVisibility,
}

impl PostFilter {
    pub(crate) fn matches(&self, post: &Post) -> bool {
        let visible = match self.visibility {
            PostVisibility::PublishedOnly => post.is_published,
            PostVisibility::PublishedOrAuthoredBy(id) => post.is_published || post.author_id == id,
            PostVisibility::All => true,
        };
        visible
            && self.author_id.is_none_or(|id| post.author_id == id)
            && self.is_featured.is_none_or(|f| post.is_featured == f)
            && self
                .tag
                .as_ref()
                .is_none_or(|tag| post.tags.iter().any(|t| t == tag))
            && self.search.as_ref().is_none_or(|term| {
                let term = term.to_lowercase();
                post.title.to_lowercase().contains(&term)
                    || post.content.to_lowercase().contains(&term)
            })
    }
}

impl UserFilter {
    pub(crate) fn matches(&self, user: &User) -> bool {
        self.is_active.is_none_or(|a| user.is_active == a)
            && self.search.as_ref().is_none_or(|term| {
                let term = term.to_lowercase();
                user.username.to_lowercase().contains(&term)
                    || user.email.to_lowercase().contains(&term)
                    || user
                        .full_name
                        .as_ref()
                        .is_some_and(|n| n.to_lowercase().contains(&term))
            })
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Looks the identifier up as a username first, then as an email.
    async fn find_by_login(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        match self.find_by_username(identifier).await? {
            Some(user) => Ok(Some(user)),
            None => self.find_by_email(identifier).await,
        }
    }

    async fn insert(&self, draft: UserDraft) -> Result<User, StoreError>;

    /// Writes the profile fields present in `update` and bumps `updated_at`.
    async fn update_profile(&self, id: UserId, update: &UserUpdate) -> Result<User, StoreError>;

    async fn set_active(&self, id: UserId, active: bool) -> Result<User, StoreError>;

    async fn set_verified(&self, id: UserId) -> Result<User, StoreError>;

    async fn set_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), StoreError>;

    /// Makes `id` an active, verified superuser.
    async fn promote_admin(&self, id: UserId) -> Result<User, StoreError>;

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Matching users ordered by id.
    async fn list(&self, filter: &UserFilter, skip: u64, limit: u64)
        -> Result<Vec<User>, StoreError>;

    async fn count(&self, filter: &UserFilter) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, StoreError>;

    /// Whether a post other than `except` already uses `slug`.
    async fn slug_exists(&self, slug: &str, except: Option<PostId>) -> Result<bool, StoreError>;

    async fn insert(&self, draft: PostDraft) -> Result<Post, StoreError>;

    /// Writes the content fields present in `update` and bumps `updated_at`.
    /// `is_published` is ignored; see [`PostRepository::set_published`].
    async fn update(&self, id: PostId, update: &PostUpdate) -> Result<Post, StoreError>;

    /// Flips the published flag. `published_at` is stamped with `at` only
    /// the first time a post is published.
    async fn set_published(
        &self,
        id: PostId,
        published: bool,
        at: DateTime<Utc>,
    ) -> Result<Post, StoreError>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, id: PostId) -> Result<bool, StoreError>;

    /// Matching posts, newest first.
    async fn list(&self, filter: &PostFilter, skip: u64, limit: u64)
        -> Result<Vec<Post>, StoreError>;

    async fn count(&self, filter: &PostFilter) -> Result<u64, StoreError>;

    async fn increment_views(&self, id: PostId) -> Result<(), StoreError>;

    /// Returns the new like count.
    async fn increment_likes(&self, id: PostId) -> Result<i64, StoreError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! A user store whose every call fails, for exercising degraded paths.

    use super::*;

    pub struct UnavailableStore;

    fn down<T>() -> Result<T, StoreError> {
        Err(StoreError::Database("connection refused".to_string()))
    }

    #[async_trait]
    impl UserRepository for UnavailableStore {
        async fn find_by_id(&self, _id: UserId) -> Result<Option<User>, StoreError> {
            down()
        }
        async fn find_by_username(&self, _username: &str) -> Result<Option<User>, StoreError> {
            down()
        }
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            down()
        }
        async fn insert(&self, _draft: UserDraft) -> Result<User, StoreError> {
            down()
        }
        async fn update_profile(
            &self,
            _id: UserId,
            _update: &UserUpdate,
        ) -> Result<User, StoreError> {
            down()
        }
        async fn set_active(&self, _id: UserId, _active: bool) -> Result<User, StoreError> {
            down()
        }
        async fn set_verified(&self, _id: UserId) -> Result<User, StoreError> {
            down()
        }
        async fn set_password_hash(&self, _id: UserId, _hash: &str) -> Result<(), StoreError> {
            down()
        }
        async fn promote_admin(&self, _id: UserId) -> Result<User, StoreError> {
            down()
        }
        async fn record_login(&self, _id: UserId, _at: DateTime<Utc>) -> Result<(), StoreError> {
            down()
        }
        async fn list(
            &self,
            _filter: &UserFilter,
            _skip: u64,
            _limit: u64,
        ) -> Result<Vec<User>, StoreError> {
            down()
        }
        async fn count(&self, _filter: &UserFilter) -> Result<u64, StoreError> {
            down()
        }
    }
}
