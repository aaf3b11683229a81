use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use super::{conflict_message, not_found};
use crate::auth::access::{check_ownership, Caller};
use crate::error::{CoreError, CoreResult};
use crate::model::post::{NewPost, Post, PostId, PostUpdate};
use crate::model::user::User;
use crate::pagination::{Page, PageRequest};
use crate::store::{PostFilter, PostRepository, PostVisibility, StoreError};

pub struct PostService {
    posts: Arc<dyn PostRepository>,
}

impl PostService {
    pub fn new(posts: Arc<dyn PostRepository>) -> Self {
        Self { posts }
    }

    /// Creates an unpublished post. A generated slug gets a numeric suffix
    /// when taken; an explicit slug must be free.
    #[instrument(skip(self, author, new_post), fields(author_id = author.id))]
    pub async fn create(&self, author: &User, new_post: NewPost) -> CoreResult<Post> {
        new_post.validate().map_err(CoreError::Validation)?;

        let explicit = new_post.slug.as_deref().is_some_and(|s| !s.is_empty());
        let base = new_post.slug_or_generated();
        let slug = if explicit {
            if self.posts.slug_exists(&base, None).await? {
                return Err(CoreError::Conflict("Slug already exists".to_string()));
            }
            base
        } else {
            self.free_slug(&base).await?
        };

        let post = self
            .posts
            .insert(new_post.into_draft(slug, author.id))
            .await
            .map_err(conflict_message)?;
        info!(post_id = post.id, slug = %post.slug, "post created");
        Ok(post)
    }

    async fn free_slug(&self, base: &str) -> CoreResult<String> {
        if !self.posts.slug_exists(base, None).await? {
            return Ok(base.to_string());
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !self.posts.slug_exists(&candidate, None).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    async fn load(&self, id: PostId) -> CoreResult<Post> {
        self.posts
            .find_by_id(id)
            .await?
            .ok_or(CoreError::NotFound("Post"))
    }

    /// Loads a post the caller may see and counts the view. Unpublished
    /// posts look missing to everyone but their author and superusers.
    pub async fn get_visible(&self, id: PostId, caller: &Caller) -> CoreResult<Post> {
        let mut post = self.load(id).await?;
        if !post.is_published && !can_see_draft(&post, caller) {
            debug!(post_id = id, "unpublished post hidden from caller");
            return Err(CoreError::NotFound("Post"));
        }
        self.posts.increment_views(id).await?;
        post.view_count += 1;
        Ok(post)
    }

    /// Lists posts visible to `caller`: published ones, plus the caller's
    /// own drafts, plus everything for superusers.
    pub async fn list(
        &self,
        request: PageRequest,
        mut filter: PostFilter,
        caller: &Caller,
    ) -> CoreResult<Page<Post>> {
        filter.visibility = match caller {
            Caller::User(user) if user.is_superuser => PostVisibility::All,
            Caller::User(user) => PostVisibility::PublishedOrAuthoredBy(user.id),
            Caller::Anonymous => PostVisibility::PublishedOnly,
        };
        let total = self.posts.count(&filter).await?;
        let items = self
            .posts
            .list(&filter, request.skip(), request.limit())
            .await?;
        Ok(Page::new(items, total, request))
    }

    #[instrument(skip(self, update, caller), fields(caller_id = caller.id))]
    pub async fn update(&self, id: PostId, update: PostUpdate, caller: &User) -> CoreResult<Post> {
        update.validate().map_err(CoreError::Validation)?;
        let post = self.load(id).await?;
        check_ownership(post.author_id, caller)?;

        if let Some(slug) = &update.slug {
            if self.posts.slug_exists(slug, Some(id)).await? {
                return Err(CoreError::Conflict("Slug already exists".to_string()));
            }
        }

        let mut post = self
            .posts
            .update(id, &update)
            .await
            .map_err(|e| match e {
                StoreError::Missing => CoreError::NotFound("Post"),
                other => conflict_message(other),
            })?;
        if let Some(published) = update.is_published {
            post = self
                .posts
                .set_published(id, published, Utc::now())
                .await
                .map_err(not_found("Post"))?;
        }
        info!(post_id = id, "post updated");
        Ok(post)
    }

    #[instrument(skip(self, caller), fields(caller_id = caller.id))]
    pub async fn delete(&self, id: PostId, caller: &User) -> CoreResult<()> {
        let post = self.load(id).await?;
        check_ownership(post.author_id, caller)?;
        if !self.posts.delete(id).await? {
            return Err(CoreError::NotFound("Post"));
        }
        info!(post_id = id, "post deleted");
        Ok(())
    }

    #[instrument(skip(self, caller), fields(caller_id = caller.id))]
    pub async fn set_published(&self, id: PostId, published: bool, caller: &User) -> CoreResult<Post> {
        let post = self.load(id).await?;
        check_ownership(post.author_id, caller)?;
        let post = self
            .posts
            .set_published(id, published, Utc::now())
            .await
            .map_err(not_found("Post"))?;
        info!(post_id = id, published, "post publication changed");
        Ok(post)
    }

    /// Adds a like to a post the caller can see and returns the new count.
    pub async fn like(&self, id: PostId, caller: &User) -> CoreResult<i64> {
        let post = self.load(id).await?;
        let caller = Caller::User(caller.clone());
        if !post.is_published && !can_see_draft(&post, &caller) {
            return Err(CoreError::NotFound("Post"));
        }
        Ok(self.posts.increment_likes(id).await?)
    }
}

fn can_see_draft(post: &Post, caller: &Caller) -> bool {
    caller
        .user()
        .is_some_and(|u| u.is_superuser || u.id == post.author_id)
}
