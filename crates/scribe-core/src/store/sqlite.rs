use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteQueryResult};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use super::{PostFilter, PostRepository, PostVisibility, StoreError, UserFilter, UserRepository};
use crate::config::settings::DatabaseSettings;
use crate::model::post::{Post, PostDraft, PostId, PostUpdate};
use crate::model::user::{User, UserDraft, UserId, UserUpdate};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        username      TEXT    NOT NULL UNIQUE,
        email         TEXT    NOT NULL UNIQUE,
        full_name     TEXT,
        bio           TEXT,
        phone         TEXT,
        avatar_url    TEXT,
        is_active     INTEGER NOT NULL DEFAULT 1,
        is_verified   INTEGER NOT NULL DEFAULT 0,
        is_superuser  INTEGER NOT NULL DEFAULT 0,
        password_hash TEXT    NOT NULL,
        created_at    TEXT    NOT NULL,
        updated_at    TEXT    NOT NULL,
        last_login    TEXT
    )",
    "CREATE TABLE IF NOT EXISTS posts (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        title            TEXT    NOT NULL,
        content          TEXT    NOT NULL,
        slug             TEXT    NOT NULL UNIQUE,
        excerpt          TEXT,
        meta_title       TEXT,
        meta_description TEXT,
        tags             TEXT    NOT NULL DEFAULT '',
        is_published     INTEGER NOT NULL DEFAULT 0,
        is_featured      INTEGER NOT NULL DEFAULT 0,
        view_count       INTEGER NOT NULL DEFAULT 0,
        like_count       INTEGER NOT NULL DEFAULT 0,
        created_at       TEXT    NOT NULL,
        updated_at       TEXT    NOT NULL,
        published_at     TEXT,
        author_id        INTEGER NOT NULL REFERENCES users(id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id)",
    "CREATE INDEX IF NOT EXISTS idx_posts_published ON posts(is_published)",
];

const USER_COLUMNS: &str = "id, username, email, full_name, bio, phone, avatar_url, \
    is_active, is_verified, is_superuser, password_hash, created_at, updated_at, last_login";

const POST_COLUMNS: &str = "id, title, content, slug, excerpt, meta_title, meta_description, \
    tags, is_published, is_featured, view_count, like_count, created_at, updated_at, \
    published_at, author_id";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    full_name: Option<String>,
    bio: Option<String>,
    phone: Option<String>,
    avatar_url: Option<String>,
    is_active: bool,
    is_verified: bool,
    is_superuser: bool,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            bio: row.bio,
            phone: row.phone,
            avatar_url: row.avatar_url,
            is_active: row.is_active,
            is_verified: row.is_verified,
            is_superuser: row.is_superuser,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login: row.last_login,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    title: String,
    content: String,
    slug: String,
    excerpt: Option<String>,
    meta_title: Option<String>,
    meta_description: Option<String>,
    tags: String,
    is_published: bool,
    is_featured: bool,
    view_count: i64,
    like_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
    author_id: i64,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            title: row.title,
            content: row.content,
            slug: row.slug,
            excerpt: row.excerpt,
            meta_title: row.meta_title,
            meta_description: row.meta_description,
            tags: split_tags(&row.tags),
            is_published: row.is_published,
            is_featured: row.is_featured,
            view_count: row.view_count,
            like_count: row.like_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
            published_at: row.published_at,
            author_id: row.author_id,
        }
    }
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_tags(tags: &[String]) -> String {
    tags.join(",")
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// SQLite-backed store. The schema is created on connect.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&settings.url)?.create_if_missing(true);

        // An in-memory database lives and dies with its connection.
        let pool = if is_in_memory(&settings.url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(settings.max_connections.max(1))
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.create_schema().await?;
        info!(url = %settings.url, "SQLite store ready");
        Ok(store)
    }

    async fn create_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        debug!("schema ensured");
        Ok(())
    }

    async fn fetch_user(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn fetch_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    /// Reads a user back after a single-row write.
    async fn reload_user(&self, result: SqliteQueryResult, id: UserId) -> Result<User, StoreError> {
        if result.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        self.fetch_user_by_id(id).await?.ok_or(StoreError::Missing)
    }

    async fn fetch_post_by_id(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Post::from))
    }
}

fn push_user_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &UserFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(active) = filter.is_active {
        qb.push(" AND is_active = ").push_bind(active);
    }
    if let Some(term) = &filter.search {
        let pattern = format!("%{term}%");
        qb.push(" AND (username LIKE ")
            .push_bind(pattern.clone())
            .push(" OR email LIKE ")
            .push_bind(pattern.clone())
            .push(" OR full_name LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_post_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PostFilter) {
    match filter.visibility {
        PostVisibility::PublishedOnly => {
            qb.push(" WHERE is_published = 1");
        }
        PostVisibility::PublishedOrAuthoredBy(id) => {
            qb.push(" WHERE (is_published = 1 OR author_id = ")
                .push_bind(id)
                .push(")");
        }
        PostVisibility::All => {
            qb.push(" WHERE 1 = 1");
        }
    }
    if let Some(author_id) = filter.author_id {
        qb.push(" AND author_id = ").push_bind(author_id);
    }
    if let Some(featured) = filter.is_featured {
        qb.push(" AND is_featured = ").push_bind(featured);
    }
    if let Some(tag) = &filter.tag {
        qb.push(" AND (',' || tags || ',') LIKE ")
            .push_bind(format!("%,{tag},%"));
    }
    if let Some(term) = &filter.search {
        let pattern = format!("%{term}%");
        qb.push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(" OR content LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.fetch_user_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user("email", email).await
    }

    async fn insert(&self, draft: UserDraft) -> Result<User, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (username, email, full_name, bio, phone, password_hash, \
             is_active, is_verified, is_superuser, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&draft.username)
        .bind(&draft.email)
        .bind(&draft.full_name)
        .bind(&draft.bio)
        .bind(&draft.phone)
        .bind(&draft.password_hash)
        .bind(draft.is_active)
        .bind(draft.is_verified)
        .bind(draft.is_superuser)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.fetch_user_by_id(result.last_insert_rowid())
            .await?
            .ok_or(StoreError::Missing)
    }

    async fn update_profile(&self, id: UserId, update: &UserUpdate) -> Result<User, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET email = COALESCE(?, email), username = COALESCE(?, username), \
             full_name = COALESCE(?, full_name), bio = COALESCE(?, bio), \
             phone = COALESCE(?, phone), avatar_url = COALESCE(?, avatar_url), \
             updated_at = ? WHERE id = ?",
        )
        .bind(&update.email)
        .bind(&update.username)
        .bind(&update.full_name)
        .bind(&update.bio)
        .bind(&update.phone)
        .bind(&update.avatar_url)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.reload_user(result, id).await
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<User, StoreError> {
        let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.reload_user(result, id).await
    }

    async fn set_verified(&self, id: UserId) -> Result<User, StoreError> {
        let result = sqlx::query("UPDATE users SET is_verified = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.reload_user(result, id).await
    }

    async fn set_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
                .bind(password_hash)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    async fn promote_admin(&self, id: UserId) -> Result<User, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET is_active = 1, is_verified = 1, is_superuser = 1, \
             updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.reload_user(result, id).await
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    async fn list(
        &self,
        filter: &UserFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<User>, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_user_filter(&mut qb, filter);
        qb.push(" ORDER BY id LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(skip as i64);

        let rows = qb.build_query_as::<UserRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn count(&self, filter: &UserFilter) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users");
        push_user_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl PostRepository for SqliteStore {
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        self.fetch_post_by_id(id).await
    }

    async fn slug_exists(&self, slug: &str, except: Option<PostId>) -> Result<bool, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE slug = ? AND id != ?")
                .bind(slug)
                .bind(except.unwrap_or(-1))
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    async fn insert(&self, draft: PostDraft) -> Result<Post, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO posts (title, content, slug, excerpt, meta_title, meta_description, \
             tags, is_featured, author_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&draft.slug)
        .bind(&draft.excerpt)
        .bind(&draft.meta_title)
        .bind(&draft.meta_description)
        .bind(join_tags(&draft.tags))
        .bind(draft.is_featured)
        .bind(draft.author_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.fetch_post_by_id(result.last_insert_rowid())
            .await?
            .ok_or(StoreError::Missing)
    }

    async fn update(&self, id: PostId, update: &PostUpdate) -> Result<Post, StoreError> {
        let result = sqlx::query(
            "UPDATE posts SET title = COALESCE(?, title), content = COALESCE(?, content), \
             slug = COALESCE(?, slug), excerpt = COALESCE(?, excerpt), \
             meta_title = COALESCE(?, meta_title), \
             meta_description = COALESCE(?, meta_description), tags = COALESCE(?, tags), \
             is_featured = COALESCE(?, is_featured), updated_at = ? WHERE id = ?",
        )
        .bind(&update.title)
        .bind(&update.content)
        .bind(&update.slug)
        .bind(&update.excerpt)
        .bind(&update.meta_title)
        .bind(&update.meta_description)
        .bind(update.normalized_tags().map(|tags| join_tags(&tags)))
        .bind(update.is_featured)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        self.fetch_post_by_id(id).await?.ok_or(StoreError::Missing)
    }

    async fn set_published(
        &self,
        id: PostId,
        published: bool,
        at: DateTime<Utc>,
    ) -> Result<Post, StoreError> {
        let result = sqlx::query(
            "UPDATE posts SET is_published = ?, \
             published_at = CASE WHEN ? AND published_at IS NULL THEN ? ELSE published_at END, \
             updated_at = ? WHERE id = ?",
        )
        .bind(published)
        .bind(published)
        .bind(at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        self.fetch_post_by_id(id).await?.ok_or(StoreError::Missing)
    }

    async fn delete(&self, id: PostId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        filter: &PostFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Post>, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {POST_COLUMNS} FROM posts"));
        push_post_filter(&mut qb, filter);
        qb.push(" ORDER BY id DESC LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(skip as i64);

        let rows = qb.build_query_as::<PostRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn count(&self, filter: &PostFilter) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts");
        push_post_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn increment_views(&self, id: PostId) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    async fn increment_likes(&self, id: PostId) -> Result<i64, StoreError> {
        let likes: Option<i64> = sqlx::query_scalar(
            "UPDATE posts SET like_count = like_count + 1 WHERE id = ? RETURNING like_count",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        likes.ok_or(StoreError::Missing)
    }
}
