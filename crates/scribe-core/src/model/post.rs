//! Blog posts, their creation and update requests, and the slug/excerpt
//! derivation rules.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::user::UserId;
use super::validate::{FieldError, Validator};

pub type PostId = i64;

const MAX_TAGS: usize = 10;
const MAX_SLUG_LEN: usize = 250;
const EXCERPT_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub tags: Vec<String>,
    pub is_published: bool,
    pub is_featured: bool,
    pub view_count: i64,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub author_id: UserId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub is_featured: bool,
}

impl NewPost {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.length("title", &self.title, 1, 200);
        v.length("content", &self.content, 1, usize::MAX);
        if let Some(slug) = &self.slug {
            check_slug(&mut v, slug);
        }
        v.optional_length("excerpt", self.excerpt.as_deref(), EXCERPT_LIMIT);
        v.optional_length("meta_title", self.meta_title.as_deref(), 200);
        v.optional_length("meta_description", self.meta_description.as_deref(), 300);
        if let Some(tags) = &self.tags {
            check_tags(&mut v, tags);
        }
        v.finish()
    }

    /// The explicit slug, or one derived from the title.
    pub fn slug_or_generated(&self) -> String {
        match &self.slug {
            Some(slug) if !slug.is_empty() => slug.clone(),
            _ => slugify(&self.title),
        }
    }

    /// The explicit excerpt, or one derived from the content.
    pub fn excerpt_or_generated(&self) -> String {
        match &self.excerpt {
            Some(excerpt) if !excerpt.is_empty() => excerpt.clone(),
            _ => generate_excerpt(&self.content),
        }
    }

    pub fn into_draft(self, slug: String, author_id: UserId) -> PostDraft {
        let excerpt = self.excerpt_or_generated();
        PostDraft {
            title: self.title,
            content: self.content,
            slug,
            excerpt: Some(excerpt),
            meta_title: self.meta_title,
            meta_description: self.meta_description,
            tags: normalize_tags(self.tags.unwrap_or_default()),
            is_featured: self.is_featured,
            author_id,
        }
    }
}

/// Insert record; the store assigns id, counters and timestamps. New posts
/// start unpublished.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub author_id: UserId,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub is_featured: Option<bool>,
    #[serde(default)]
    pub is_published: Option<bool>,
}

impl PostUpdate {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        if let Some(title) = &self.title {
            v.length("title", title, 1, 200);
        }
        if let Some(content) = &self.content {
            v.length("content", content, 1, usize::MAX);
        }
        if let Some(slug) = &self.slug {
            check_slug(&mut v, slug);
        }
        v.optional_length("excerpt", self.excerpt.as_deref(), EXCERPT_LIMIT);
        v.optional_length("meta_title", self.meta_title.as_deref(), 200);
        v.optional_length("meta_description", self.meta_description.as_deref(), 300);
        if let Some(tags) = &self.tags {
            check_tags(&mut v, tags);
        }
        v.finish()
    }

    /// Merges the present content fields into `post`. `is_published` is not
    /// applied here; publication goes through [`set_published`].
    pub fn apply_to(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(content) = &self.content {
            post.content = content.clone();
        }
        if let Some(excerpt) = &self.excerpt {
            post.excerpt = Some(excerpt.clone());
        }
        if let Some(slug) = &self.slug {
            post.slug = slug.clone();
        }
        if let Some(meta_title) = &self.meta_title {
            post.meta_title = Some(meta_title.clone());
        }
        if let Some(meta_description) = &self.meta_description {
            post.meta_description = Some(meta_description.clone());
        }
        if let Some(tags) = self.normalized_tags() {
            post.tags = tags;
        }
        if let Some(featured) = self.is_featured {
            post.is_featured = featured;
        }
    }

    pub fn normalized_tags(&self) -> Option<Vec<String>> {
        self.tags.clone().map(normalize_tags)
    }
}

/// Flips the published flag, stamping `published_at` on first publication.
pub fn set_published(post: &mut Post, published: bool, now: DateTime<Utc>) {
    if published && post.published_at.is_none() {
        post.published_at = Some(now);
    }
    post.is_published = published;
}

/// Lowercase ASCII alphanumerics joined by single hyphens.
pub fn slugify(title: &str) -> String {
    let mapped: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = mapped
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}

/// Plain-text excerpt: markup stripped, truncated to 497 characters plus
/// an ellipsis when longer than 500.
pub fn generate_excerpt(content: &str) -> String {
    let text = strip_tags(content);
    if text.chars().count() > EXCERPT_LIMIT {
        let head: String = text.chars().take(EXCERPT_LIMIT - 3).collect();
        format!("{head}...")
    } else {
        text
    }
}

/// Removes every non-empty `<...>` run.
fn strip_tags(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        match after.find('>') {
            Some(close) if close > 0 => {
                out.push_str(&rest[..open]);
                rest = &after[close + 1..];
            }
            _ => {
                out.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn check_slug(v: &mut Validator, slug: &str) {
    v.length("slug", slug, 1, MAX_SLUG_LEN);
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        v.push("slug", "may only contain lowercase letters, digits and hyphens");
    }
}

fn check_tags(v: &mut Validator, tags: &[String]) {
    if tags.len() > MAX_TAGS {
        v.push("tags", format!("at most {MAX_TAGS} tags are allowed"));
    }
    if tags.iter().any(|t| t.contains(',')) {
        v.push("tags", "tags must not contain commas");
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn new_post(title: &str, content: &str) -> NewPost {
        NewPost {
            title: title.to_string(),
            content: content.to_string(),
            slug: None,
            excerpt: None,
            meta_title: None,
            meta_description: None,
            tags: None,
            is_featured: false,
        }
    }

    fn stored(post_id: PostId) -> Post {
        let now = Utc::now();
        Post {
            id: post_id,
            title: "Title".to_string(),
            content: "Body".to_string(),
            slug: "title".to_string(),
            excerpt: None,
            meta_title: None,
            meta_description: None,
            tags: Vec::new(),
            is_published: false,
            is_featured: false,
            view_count: 0,
            like_count: 0,
            created_at: now,
            updated_at: now,
            published_at: None,
            author_id: 1,
        }
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Rust -- Ownership 101 "), "rust-ownership-101");
    }

    #[test]
    fn slugify_drops_non_ascii_and_falls_back() {
        assert_eq!(slugify("Café au lait"), "caf-au-lait");
        assert_eq!(slugify("!!!"), "post");
    }

    #[test]
    fn slugify_truncates_long_titles() {
        let slug = slugify(&"word ".repeat(100));
        assert!(slug.len() <= 250);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn excerpt_strips_markup() {
        assert_eq!(
            generate_excerpt("<p>Hello <b>there</b></p>"),
            "Hello there"
        );
        assert_eq!(generate_excerpt("1 <> 2 < 3"), "1 <> 2 < 3");
    }

    #[test]
    fn excerpt_truncates_long_content() {
        let excerpt = generate_excerpt(&"x".repeat(600));
        assert_eq!(excerpt.chars().count(), 500);
        assert!(excerpt.ends_with("..."));

        let exact = "y".repeat(500);
        assert_eq!(generate_excerpt(&exact), exact);
    }

    #[test]
    fn new_post_generates_slug_and_excerpt() {
        let post = new_post("My First Post", "<h1>Intro</h1>Text");
        assert_eq!(post.slug_or_generated(), "my-first-post");
        let draft = post.into_draft("my-first-post".to_string(), 7);
        assert_eq!(draft.excerpt.as_deref(), Some("IntroText"));
        assert_eq!(draft.author_id, 7);
    }

    #[test]
    fn new_post_validation() {
        assert!(new_post("Title", "Body").validate().is_ok());
        assert!(new_post("", "Body").validate().is_err());
        assert!(new_post("Title", "").validate().is_err());

        let mut bad_slug = new_post("Title", "Body");
        bad_slug.slug = Some("Not A Slug".to_string());
        assert!(bad_slug.validate().is_err());

        let mut many_tags = new_post("Title", "Body");
        many_tags.tags = Some((0..11).map(|i| format!("t{i}")).collect());
        assert!(many_tags.validate().is_err());
    }

    #[test]
    fn tags_are_trimmed_and_blank_ones_dropped() {
        let mut post = new_post("Title", "Body");
        post.tags = Some(vec![" rust ".to_string(), "".to_string(), "web".to_string()]);
        let draft = post.into_draft("title".to_string(), 1);
        assert_eq!(draft.tags, vec!["rust", "web"]);
    }

    #[test]
    fn publishing_stamps_once() {
        let mut post = stored(1);
        let first = Utc::now();
        set_published(&mut post, true, first);
        assert!(post.is_published);
        assert_eq!(post.published_at, Some(first));

        set_published(&mut post, false, first);
        let later = first + chrono::Duration::seconds(30);
        set_published(&mut post, true, later);
        assert_eq!(post.published_at, Some(first));
    }

    #[test]
    fn update_leaves_absent_fields() {
        let mut post = stored(1);
        let update = PostUpdate {
            title: Some("New title".to_string()),
            ..PostUpdate::default()
        };
        update.apply_to(&mut post);
        assert_eq!(post.title, "New title");
        assert_eq!(post.content, "Body");
        assert_eq!(post.slug, "title");
    }

    #[test]
    fn content_update_ignores_publication() {
        let mut post = stored(1);
        let update = PostUpdate {
            is_published: Some(true),
            tags: Some(vec![" rust ".to_string(), " ".to_string()]),
            ..PostUpdate::default()
        };
        update.apply_to(&mut post);
        assert!(!post.is_published);
        assert!(post.published_at.is_none());
        assert_eq!(post.tags, vec!["rust"]);
    }
}
