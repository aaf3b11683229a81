use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{PostFilter, PostRepository, StoreError, UserFilter, UserRepository};
use crate::model::post::{set_published, Post, PostDraft, PostId, PostUpdate};
use crate::model::user::{User, UserDraft, UserId, UserUpdate};

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    posts: BTreeMap<PostId, Post>,
    next_user_id: UserId,
    next_post_id: PostId,
}

/// In-process store. Both tables sit behind one lock so uniqueness checks
/// and inserts are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, skip: u64, limit: u64) -> Vec<T> {
    items.skip(skip as usize).take(limit as usize).collect()
}

impl Tables {
    fn user_conflict(&self, user_id: Option<UserId>, username: &str, email: &str) -> Option<&'static str> {
        self.users
            .values()
            .filter(|u| Some(u.id) != user_id)
            .find_map(|u| {
                if u.email == email {
                    Some("email")
                } else if u.username == username {
                    Some("username")
                } else {
                    None
                }
            })
    }

    /// Applies `change` to the stored user and bumps `updated_at`.
    fn touch_user(&mut self, id: UserId, change: impl FnOnce(&mut User)) -> Result<User, StoreError> {
        let stored = self.users.get_mut(&id).ok_or(StoreError::Missing)?;
        change(stored);
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    fn slug_taken(&self, slug: &str, except: Option<PostId>) -> bool {
        self.posts
            .values()
            .any(|p| p.slug == slug && Some(p.id) != except)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, draft: UserDraft) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(field) = tables.user_conflict(None, &draft.username, &draft.email) {
            return Err(StoreError::Conflict { field });
        }

        tables.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: tables.next_user_id,
            username: draft.username,
            email: draft.email,
            full_name: draft.full_name,
            bio: draft.bio,
            phone: draft.phone,
            avatar_url: None,
            is_active: draft.is_active,
            is_verified: draft.is_verified,
            is_superuser: draft.is_superuser,
            password_hash: draft.password_hash,
            created_at: now,
            updated_at: now,
            last_login: None,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(&self, id: UserId, update: &UserUpdate) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        let mut merged = tables.users.get(&id).cloned().ok_or(StoreError::Missing)?;
        update.apply_to(&mut merged);
        if let Some(field) = tables.user_conflict(Some(id), &merged.username, &merged.email) {
            return Err(StoreError::Conflict { field });
        }
        tables.touch_user(id, |user| update.apply_to(user))
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        tables.touch_user(id, |user| user.is_active = active)
    }

    async fn set_verified(&self, id: UserId) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        tables.touch_user(id, |user| user.is_verified = true)
    }

    async fn set_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.touch_user(id, |user| user.password_hash = password_hash.to_string())?;
        Ok(())
    }

    async fn promote_admin(&self, id: UserId) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        tables.touch_user(id, |user| {
            user.is_active = true;
            user.is_verified = true;
            user.is_superuser = true;
        })
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let stored = tables.users.get_mut(&id).ok_or(StoreError::Missing)?;
        stored.last_login = Some(at);
        Ok(())
    }

    async fn list(
        &self,
        filter: &UserFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(page(
            tables.users.values().filter(|u| filter.matches(u)).cloned(),
            skip,
            limit,
        ))
    }

    async fn count(&self, filter: &UserFilter) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().filter(|u| filter.matches(u)).count() as u64)
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn slug_exists(&self, slug: &str, except: Option<PostId>) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.slug_taken(slug, except))
    }

    async fn insert(&self, draft: PostDraft) -> Result<Post, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.slug_taken(&draft.slug, None) {
            return Err(StoreError::Conflict { field: "slug" });
        }

        tables.next_post_id += 1;
        let now = Utc::now();
        let post = Post {
            id: tables.next_post_id,
            title: draft.title,
            content: draft.content,
            slug: draft.slug,
            excerpt: draft.excerpt,
            meta_title: draft.meta_title,
            meta_description: draft.meta_description,
            tags: draft.tags,
            is_published: false,
            is_featured: draft.is_featured,
            view_count: 0,
            like_count: 0,
            created_at: now,
            updated_at: now,
            published_at: None,
            author_id: draft.author_id,
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update(&self, id: PostId, update: &PostUpdate) -> Result<Post, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(slug) = &update.slug {
            if tables.slug_taken(slug, Some(id)) {
                return Err(StoreError::Conflict { field: "slug" });
            }
        }
        let stored = tables.posts.get_mut(&id).ok_or(StoreError::Missing)?;
        update.apply_to(stored);
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn set_published(
        &self,
        id: PostId,
        published: bool,
        at: DateTime<Utc>,
    ) -> Result<Post, StoreError> {
        let mut tables = self.tables.write().await;
        let stored = tables.posts.get_mut(&id).ok_or(StoreError::Missing)?;
        set_published(stored, published, at);
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, id: PostId) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.posts.remove(&id).is_some())
    }

    async fn list(
        &self,
        filter: &PostFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Post>, StoreError> {
        let tables = self.tables.read().await;
        Ok(page(
            tables
                .posts
                .values()
                .rev()
                .filter(|p| filter.matches(p))
                .cloned(),
            skip,
            limit,
        ))
    }

    async fn count(&self, filter: &PostFilter) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.values().filter(|p| filter.matches(p)).count() as u64)
    }

    async fn increment_views(&self, id: PostId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let post = tables.posts.get_mut(&id).ok_or(StoreError::Missing)?;
        post.view_count += 1;
        Ok(())
    }

    async fn increment_likes(&self, id: PostId) -> Result<i64, StoreError> {
        let mut tables = self.tables.write().await;
        let post = tables.posts.get_mut(&id).ok_or(StoreError::Missing)?;
        post.like_count += 1;
        Ok(post.like_count)
    }
}
