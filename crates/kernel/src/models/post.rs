//! Post model: the primary content entity.
//!
//! Posts carry visibility tiers, draft/pinned/archived/deleted state,
//! scheduling, a content hash for duplicate surfacing, and AI-enhancement
//! tracking. State transitions (publish, archive, soft delete) are
//! single-purpose UPDATEs that touch only their own columns.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::settings::Settings;
use crate::slug::slugify;
use crate::viewer::Viewer;

/// Post visibility tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    Public,
    Private,
    Unlisted,
    Friends,
    Custom,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "PUBLIC",
            Visibility::Private => "PRIVATE",
            Visibility::Unlisted => "UNLISTED",
            Visibility::Friends => "FRIENDS",
            Visibility::Custom => "CUSTOM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PUBLIC" => Some(Visibility::Public),
            "PRIVATE" => Some(Visibility::Private),
            "UNLISTED" => Some(Visibility::Unlisted),
            "FRIENDS" => Some(Visibility::Friends),
            "CUSTOM" => Some(Visibility::Custom),
            _ => None,
        }
    }
}

/// A post.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Optional title (micro-posts have none).
    pub title: Option<String>,

    /// URL slug, unique when present. Absent for untitled posts.
    pub slug: Option<String>,

    /// Post body (markdown).
    pub body: String,

    /// Optional manual excerpt.
    pub excerpt: Option<String>,

    /// Optional free-text location.
    pub location: Option<String>,

    /// Author user ID.
    pub author_id: Uuid,

    /// Category (NULL for uncategorized).
    pub category_id: Option<Uuid>,

    /// Visibility tier.
    pub visibility: Visibility,

    pub is_draft: bool,
    pub is_pinned: bool,
    pub is_archived: bool,
    pub archived_at: Option<i64>,
    pub is_deleted: bool,
    pub deleted_at: Option<i64>,

    /// Whether commenting is open on this post.
    pub allow_comments: bool,

    /// Requested future publication time.
    pub scheduled_at: Option<i64>,

    /// When the post first left draft state. Set exactly once.
    pub published_at: Option<i64>,

    /// SHA-256 of the normalized body; duplicate-content surfacing only,
    /// never a uniqueness key.
    pub content_hash: String,

    pub ai_enhanced: bool,
    pub ai_instructions: String,

    /// Body as it was before AI enhancement.
    pub original_content: String,

    pub view_count: i64,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

/// Database row for post.
#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    title: Option<String>,
    slug: Option<String>,
    body: String,
    excerpt: Option<String>,
    location: Option<String>,
    author_id: Uuid,
    category_id: Option<Uuid>,
    visibility: String,
    is_draft: bool,
    is_pinned: bool,
    is_archived: bool,
    archived_at: Option<i64>,
    is_deleted: bool,
    deleted_at: Option<i64>,
    allow_comments: bool,
    scheduled_at: Option<i64>,
    published_at: Option<i64>,
    content_hash: String,
    ai_enhanced: bool,
    ai_instructions: String,
    original_content: String,
    view_count: i64,
    created: i64,
    changed: i64,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            body: row.body,
            excerpt: row.excerpt,
            location: row.location,
            author_id: row.author_id,
            category_id: row.category_id,
            // An unrecognized tier in storage denies by default.
            visibility: Visibility::parse(&row.visibility).unwrap_or(Visibility::Private),
            is_draft: row.is_draft,
            is_pinned: row.is_pinned,
            is_archived: row.is_archived,
            archived_at: row.archived_at,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
            allow_comments: row.allow_comments,
            scheduled_at: row.scheduled_at,
            published_at: row.published_at,
            content_hash: row.content_hash,
            ai_enhanced: row.ai_enhanced,
            ai_instructions: row.ai_instructions,
            original_content: row.original_content,
            view_count: row.view_count,
            created: row.created,
            changed: row.changed,
        }
    }
}

/// Input for creating a post.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePost {
    pub author_id: Uuid,
    pub title: Option<String>,
    pub body: String,
    pub excerpt: Option<String>,
    pub location: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
    pub visibility: Option<Visibility>,
    pub is_draft: Option<bool>,
    pub allow_comments: Option<bool>,
    pub scheduled_at: Option<i64>,
    #[serde(default)]
    pub allowed_user_ids: Vec<Uuid>,
}

/// Input for updating a post.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePost {
    /// Send `null` to clear, omit to leave unchanged (same for the other
    /// double-optioned fields below).
    #[serde(default, deserialize_with = "super::double_option")]
    pub title: Option<Option<String>>,
    pub body: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub excerpt: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub category_id: Option<Option<Uuid>>,
    pub tag_ids: Option<Vec<Uuid>>,
    pub visibility: Option<Visibility>,
    pub is_draft: Option<bool>,
    pub is_pinned: Option<bool>,
    pub allow_comments: Option<bool>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub scheduled_at: Option<Option<i64>>,
    pub ai_enhanced: Option<bool>,
    pub ai_instructions: Option<String>,
    pub allowed_user_ids: Option<Vec<Uuid>>,
}

/// Compute the content hash of a post body.
///
/// SHA-256 over the lowercased, trimmed body. Recomputed on every save.
pub fn content_hash(body: &str) -> String {
    let normalized = body.to_lowercase();
    hex::encode(Sha256::digest(normalized.trim().as_bytes()))
}

const COLS: &str = "id, title, slug, body, excerpt, location, author_id, category_id, visibility, \
                    is_draft, is_pinned, is_archived, archived_at, is_deleted, deleted_at, \
                    allow_comments, scheduled_at, published_at, content_hash, ai_enhanced, \
                    ai_instructions, original_content, view_count, created, changed";

/// Shared visibility filter for list queries. `$1` is the viewer's user id
/// (NULL for anonymous). Must match [`Post::can_view`] exactly: list
/// filtering and detail gating diverging would leak content through lists.
const VISIBLE_FILTER: &str = "p.is_draft = FALSE AND p.is_deleted = FALSE AND (\
    p.visibility IN ('PUBLIC', 'UNLISTED') \
    OR ($1::uuid IS NOT NULL AND (\
        p.author_id = $1 \
        OR (p.visibility = 'CUSTOM' AND EXISTS (\
            SELECT 1 FROM post_allowed_user pau WHERE pau.post_id = p.id AND pau.user_id = $1\
        ))\
    ))\
)";

impl Post {
    /// Whether the post is published (not draft, not deleted).
    pub fn is_published(&self) -> bool {
        !self.is_draft && !self.is_deleted
    }

    /// Whether the post is a draft scheduled for future publication.
    pub fn is_scheduled(&self, now: i64) -> bool {
        self.is_draft && self.scheduled_at.is_some_and(|t| t > now)
    }

    /// Short preview text for feed display.
    pub fn preview(&self) -> String {
        if let Some(excerpt) = &self.excerpt
            && !excerpt.is_empty()
        {
            return excerpt.clone();
        }
        if self.body.chars().count() > 280 {
            let truncated: String = self.body.chars().take(280).collect();
            return format!("{truncated}...");
        }
        self.body.clone()
    }

    /// Check whether a viewer may see this post.
    ///
    /// Pure predicate over post state and viewer identity; `allowed_users`
    /// is the post's explicit allow list (consulted only under CUSTOM).
    /// Evaluated fresh on every read path — see [`VISIBLE_FILTER`] for the
    /// list-query mirror.
    pub fn can_view(&self, viewer: &Viewer, allowed_users: &[Uuid]) -> bool {
        // Deleted posts are visible to nobody, drafts included.
        if self.is_deleted {
            return false;
        }

        // Drafts only visible to their author.
        if self.is_draft {
            return viewer.is(self.author_id);
        }

        // Public posts visible to all; unlisted rely on obscurity of the
        // link, not access control.
        if matches!(self.visibility, Visibility::Public | Visibility::Unlisted) {
            return true;
        }

        // Every remaining tier requires an authenticated viewer.
        let Some(user_id) = viewer.user_id() else {
            return false;
        };

        // The author can always view.
        if user_id == self.author_id {
            return true;
        }

        match self.visibility {
            Visibility::Private => false,
            Visibility::Custom => allowed_users.contains(&user_id),
            // Friendship lives outside this module; hosts override this
            // extension point. Deny by default.
            Visibility::Friends => false,
            Visibility::Public | Visibility::Unlisted => true,
        }
    }

    /// Find a post by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, PostRow>(&format!("SELECT {COLS} FROM post WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch post by id")?;

        Ok(row.map(Post::from))
    }

    /// Find a post by slug.
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>> {
        let row =
            sqlx::query_as::<_, PostRow>(&format!("SELECT {COLS} FROM post WHERE slug = $1"))
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("failed to fetch post by slug")?;

        Ok(row.map(Post::from))
    }

    /// The post's explicit allow list (effective under CUSTOM visibility).
    pub async fn allowed_user_ids(pool: &PgPool, id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM post_allowed_user WHERE post_id = $1")
                .bind(id)
                .fetch_all(pool)
                .await
                .context("failed to fetch allowed users")?;

        Ok(ids)
    }

    /// List posts visible to the viewer, pinned first, newest first.
    pub async fn list_visible(
        pool: &PgPool,
        viewer: &Viewer,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {COLS} FROM post p WHERE {VISIBLE_FILTER} \
             ORDER BY p.is_pinned DESC, p.created DESC LIMIT $2 OFFSET $3"
        ))
        .bind(viewer.user_id())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("failed to list visible posts")?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// List visible posts in a category.
    pub async fn list_visible_in_category(
        pool: &PgPool,
        viewer: &Viewer,
        category_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {COLS} FROM post p WHERE {VISIBLE_FILTER} AND p.category_id = $4 \
             ORDER BY p.is_pinned DESC, p.created DESC LIMIT $2 OFFSET $3"
        ))
        .bind(viewer.user_id())
        .bind(limit)
        .bind(offset)
        .bind(category_id)
        .fetch_all(pool)
        .await
        .context("failed to list posts in category")?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// List visible posts carrying a tag.
    pub async fn list_visible_with_tag(
        pool: &PgPool,
        viewer: &Viewer,
        tag_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {COLS} FROM post p \
             INNER JOIN post_tag pt ON pt.post_id = p.id AND pt.tag_id = $4 \
             WHERE {VISIBLE_FILTER} \
             ORDER BY p.is_pinned DESC, p.created DESC LIMIT $2 OFFSET $3"
        ))
        .bind(viewer.user_id())
        .bind(limit)
        .bind(offset)
        .bind(tag_id)
        .fetch_all(pool)
        .await
        .context("failed to list posts with tag")?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// List visible posts by an author.
    pub async fn list_visible_by_author(
        pool: &PgPool,
        viewer: &Viewer,
        author_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {COLS} FROM post p WHERE {VISIBLE_FILTER} AND p.author_id = $4 \
             ORDER BY p.is_pinned DESC, p.created DESC LIMIT $2 OFFSET $3"
        ))
        .bind(viewer.user_id())
        .bind(limit)
        .bind(offset)
        .bind(author_id)
        .fetch_all(pool)
        .await
        .context("failed to list posts by author")?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Create a new post.
    ///
    /// Derives a unique slug from the title when slug generation is on,
    /// computes the content hash, and stamps `published_at` when created
    /// live (non-draft).
    pub async fn create(pool: &PgPool, settings: &Settings, input: CreatePost) -> Result<Self> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now().timestamp();

        let visibility = match input.visibility {
            Some(v) => v,
            None => {
                let name = settings.default_visibility()?;
                Visibility::parse(&name).ok_or_else(|| {
                    anyhow::anyhow!("default_visibility setting is not a known tier: {name}")
                })?
            }
        };

        let is_draft = input.is_draft.unwrap_or(false);
        let slug = Self::derive_slug(pool, settings, input.title.as_deref(), None).await?;
        let hash = content_hash(&input.body);
        let published_at = (!is_draft).then_some(now);

        let mut tx = pool.begin().await.context("failed to start transaction")?;

        sqlx::query(
            r#"
            INSERT INTO post (id, title, slug, body, excerpt, location, author_id, category_id,
                              visibility, is_draft, allow_comments, scheduled_at, published_at,
                              content_hash, view_count, created, changed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 0, $15, $15)
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&slug)
        .bind(&input.body)
        .bind(&input.excerpt)
        .bind(&input.location)
        .bind(input.author_id)
        .bind(input.category_id)
        .bind(visibility.as_str())
        .bind(is_draft)
        .bind(input.allow_comments.unwrap_or(true))
        .bind(input.scheduled_at)
        .bind(published_at)
        .bind(&hash)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("failed to insert post")?;

        for tag_id in &input.tag_ids {
            sqlx::query("INSERT INTO post_tag (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .context("failed to attach tag")?;
        }

        for user_id in &input.allowed_user_ids {
            sqlx::query(
                "INSERT INTO post_allowed_user (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("failed to add allowed user")?;
        }

        tx.commit().await.context("failed to commit transaction")?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("failed to fetch created post"))
    }

    /// Update a post.
    ///
    /// Recomputes the content hash from the new body, derives a slug if one
    /// is still missing, and stamps `published_at` on the first transition
    /// out of draft (first publish wins).
    pub async fn update(
        pool: &PgPool,
        settings: &Settings,
        id: Uuid,
        input: UpdatePost,
    ) -> Result<Option<Self>> {
        let Some(current) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let now = chrono::Utc::now().timestamp();
        let previous_body = current.body.clone();

        let title = input.title.unwrap_or(current.title);
        let body = input.body.unwrap_or(current.body);
        let excerpt = input.excerpt.unwrap_or(current.excerpt);
        let location = input.location.unwrap_or(current.location);
        let category_id = input.category_id.unwrap_or(current.category_id);
        let visibility = input.visibility.unwrap_or(current.visibility);
        let is_draft = input.is_draft.unwrap_or(current.is_draft);
        let is_pinned = input.is_pinned.unwrap_or(current.is_pinned);
        let allow_comments = input.allow_comments.unwrap_or(current.allow_comments);
        let scheduled_at = input.scheduled_at.unwrap_or(current.scheduled_at);

        let slug = match current.slug {
            Some(slug) => Some(slug),
            None => Self::derive_slug(pool, settings, title.as_deref(), Some(id)).await?,
        };

        let hash = content_hash(&body);

        // First publish wins: only stamp when leaving draft with no
        // recorded publication time.
        let published_at = if current.is_draft && !is_draft && current.published_at.is_none() {
            Some(now)
        } else {
            current.published_at
        };

        // AI-enhancement tracking snapshots the pre-enhancement body once.
        let track_ai = settings.track_ai_enhancements()?;
        let ai_enhanced = if track_ai {
            input.ai_enhanced.unwrap_or(current.ai_enhanced)
        } else {
            current.ai_enhanced
        };
        let ai_instructions = if track_ai {
            input.ai_instructions.unwrap_or(current.ai_instructions)
        } else {
            current.ai_instructions
        };
        let original_content = if track_ai
            && ai_enhanced
            && !current.ai_enhanced
            && current.original_content.is_empty()
        {
            previous_body
        } else {
            current.original_content
        };

        let mut tx = pool.begin().await.context("failed to start transaction")?;

        sqlx::query(
            r#"
            UPDATE post
            SET title = $1, slug = $2, body = $3, excerpt = $4, location = $5, category_id = $6,
                visibility = $7, is_draft = $8, is_pinned = $9, allow_comments = $10,
                scheduled_at = $11, published_at = $12, content_hash = $13, ai_enhanced = $14,
                ai_instructions = $15, original_content = $16, changed = $17
            WHERE id = $18
            "#,
        )
        .bind(&title)
        .bind(&slug)
        .bind(&body)
        .bind(&excerpt)
        .bind(&location)
        .bind(category_id)
        .bind(visibility.as_str())
        .bind(is_draft)
        .bind(is_pinned)
        .bind(allow_comments)
        .bind(scheduled_at)
        .bind(published_at)
        .bind(&hash)
        .bind(ai_enhanced)
        .bind(&ai_instructions)
        .bind(&original_content)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("failed to update post")?;

        if let Some(tag_ids) = &input.tag_ids {
            sqlx::query("DELETE FROM post_tag WHERE post_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("failed to clear tags")?;
            for tag_id in tag_ids {
                sqlx::query(
                    "INSERT INTO post_tag (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                )
                .bind(id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .context("failed to attach tag")?;
            }
        }

        if let Some(allowed) = &input.allowed_user_ids {
            sqlx::query("DELETE FROM post_allowed_user WHERE post_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("failed to clear allowed users")?;
            for user_id in allowed {
                sqlx::query(
                    "INSERT INTO post_allowed_user (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                )
                .bind(id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .context("failed to add allowed user")?;
            }
        }

        tx.commit().await.context("failed to commit transaction")?;

        Self::find_by_id(pool, id).await
    }

    /// Publish the post immediately.
    ///
    /// `published_at` is set only if it was never recorded; repeat calls
    /// clear the draft flag but leave the timestamp alone.
    pub async fn publish(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let now = chrono::Utc::now().timestamp();
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE post SET is_draft = FALSE, published_at = COALESCE(published_at, $1), changed = $1 \
             WHERE id = $2 RETURNING {COLS}"
        ))
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to publish post")?;

        Ok(row.map(Post::from))
    }

    /// Archive the post. Orthogonal to publication and visibility.
    pub async fn archive(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let now = chrono::Utc::now().timestamp();
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE post SET is_archived = TRUE, archived_at = $1, changed = $1 \
             WHERE id = $2 RETURNING {COLS}"
        ))
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to archive post")?;

        Ok(row.map(Post::from))
    }

    /// Soft-delete the post. The row is retained; every read path filters
    /// deleted posts explicitly.
    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let now = chrono::Utc::now().timestamp();
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE post SET is_deleted = TRUE, deleted_at = $1, changed = $1 \
             WHERE id = $2 RETURNING {COLS}"
        ))
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to soft-delete post")?;

        Ok(row.map(Post::from))
    }

    /// Increment the view counter in place.
    ///
    /// A read-modify-write here would lose updates under concurrent
    /// viewers; the increment happens in the storage layer.
    pub async fn increment_view_count(pool: &PgPool, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE post SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to increment view count")?;

        Ok(())
    }

    /// Groups of non-deleted posts sharing a content hash.
    pub async fn duplicate_groups(pool: &PgPool) -> Result<Vec<(String, Vec<Uuid>)>> {
        let groups: Vec<(String, Vec<Uuid>)> = sqlx::query_as(
            r#"
            SELECT content_hash, array_agg(id ORDER BY created) AS post_ids
            FROM post
            WHERE is_deleted = FALSE AND content_hash <> ''
            GROUP BY content_hash
            HAVING COUNT(*) > 1
            ORDER BY content_hash
            "#,
        )
        .fetch_all(pool)
        .await
        .context("failed to fetch duplicate content groups")?;

        Ok(groups)
    }

    /// Derive a unique slug from a title, or `None` when generation is off
    /// or the title yields nothing slug-worthy.
    async fn derive_slug(
        pool: &PgPool,
        settings: &Settings,
        title: Option<&str>,
        exclude: Option<Uuid>,
    ) -> Result<Option<String>> {
        if !settings.auto_generate_slugs()? {
            return Ok(None);
        }
        let Some(title) = title else {
            return Ok(None);
        };
        let base = slugify(title, settings.slug_max_length()?);
        if base.is_empty() {
            return Ok(None);
        }
        Ok(Some(generate_unique_slug(pool, &base, exclude).await?))
    }
}

/// Generate a unique slug, handling collisions with numeric suffixes.
///
/// If `my-post` is taken, tries `my-post-1`, `my-post-2`, etc. A single
/// prefix query replaces sequential lookups; the partial unique index on
/// `post.slug` is the backstop for the probe-then-insert race.
async fn generate_unique_slug(
    pool: &PgPool,
    base: &str,
    exclude: Option<Uuid>,
) -> Result<String> {
    // Escape LIKE wildcards in the base before building the pattern
    let escaped_base = base
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let like_pattern = format!("{escaped_base}%");
    let existing: Vec<(String,)> = sqlx::query_as(
        "SELECT slug FROM post WHERE slug LIKE $1 AND ($2::uuid IS NULL OR id <> $2) LIMIT 200",
    )
    .bind(&like_pattern)
    .bind(exclude)
    .fetch_all(pool)
    .await
    .context("failed to check slug uniqueness")?;

    let existing_set: HashSet<&str> = existing.iter().map(|(s,)| s.as_str()).collect();

    if !existing_set.contains(base) {
        return Ok(base.to_string());
    }

    for i in 1..100 {
        let candidate = format!("{base}-{i}");
        if !existing_set.contains(candidate.as_str()) {
            return Ok(candidate);
        }
    }

    // Fallback: append UUID fragment for guaranteed uniqueness
    let fragment = &Uuid::now_v7().simple().to_string()[..8];
    Ok(format!("{base}-{fragment}"))
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_post() -> Post {
        Post {
            id: Uuid::now_v7(),
            title: Some("Hello".to_string()),
            slug: Some("hello".to_string()),
            body: "Hello world".to_string(),
            excerpt: None,
            location: None,
            author_id: Uuid::now_v7(),
            category_id: None,
            visibility: Visibility::Public,
            is_draft: false,
            is_pinned: false,
            is_archived: false,
            archived_at: None,
            is_deleted: false,
            deleted_at: None,
            allow_comments: true,
            scheduled_at: None,
            published_at: Some(1000),
            content_hash: content_hash("Hello world"),
            ai_enhanced: false,
            ai_instructions: String::new(),
            original_content: String::new(),
            view_count: 0,
            created: 1000,
            changed: 1000,
        }
    }

    #[test]
    fn author_sees_everything_but_deleted() {
        let mut post = sample_post();
        let author = Viewer::user(post.author_id);

        for visibility in [
            Visibility::Public,
            Visibility::Private,
            Visibility::Unlisted,
            Visibility::Friends,
            Visibility::Custom,
        ] {
            post.visibility = visibility;
            post.is_draft = false;
            assert!(post.can_view(&author, &[]), "{visibility:?} denied author");
            post.is_draft = true;
            assert!(
                post.can_view(&author, &[]),
                "{visibility:?} draft denied author"
            );
        }

        post.is_deleted = true;
        post.is_draft = false;
        assert!(!post.can_view(&author, &[]));
        post.is_draft = true;
        assert!(!post.can_view(&author, &[]), "deleted draft leaked to author");
    }

    #[test]
    fn public_and_unlisted_visible_to_anyone() {
        let mut post = sample_post();
        let stranger = Viewer::user(Uuid::now_v7());

        for visibility in [Visibility::Public, Visibility::Unlisted] {
            post.visibility = visibility;
            assert!(post.can_view(&Viewer::Anonymous, &[]));
            assert!(post.can_view(&stranger, &[]));
        }
    }

    #[test]
    fn private_denies_everyone_but_author() {
        let mut post = sample_post();
        post.visibility = Visibility::Private;

        assert!(!post.can_view(&Viewer::Anonymous, &[]));
        assert!(!post.can_view(&Viewer::user(Uuid::now_v7()), &[]));
        assert!(post.can_view(&Viewer::user(post.author_id), &[]));
    }

    #[test]
    fn custom_grants_only_listed_users() {
        let mut post = sample_post();
        post.visibility = Visibility::Custom;
        let invited = Uuid::now_v7();

        assert!(post.can_view(&Viewer::user(invited), &[invited]));
        assert!(!post.can_view(&Viewer::user(Uuid::now_v7()), &[invited]));
        assert!(!post.can_view(&Viewer::Anonymous, &[invited]));
    }

    #[test]
    fn friends_is_a_deny_by_default_stub() {
        let mut post = sample_post();
        post.visibility = Visibility::Friends;

        assert!(!post.can_view(&Viewer::user(Uuid::now_v7()), &[]));
        assert!(post.can_view(&Viewer::user(post.author_id), &[]));
    }

    #[test]
    fn drafts_hidden_from_non_authors() {
        let mut post = sample_post();
        post.is_draft = true;

        assert!(!post.can_view(&Viewer::Anonymous, &[]));
        assert!(!post.can_view(&Viewer::user(Uuid::now_v7()), &[]));
    }

    #[test]
    fn content_hash_normalizes_case_and_whitespace() {
        assert_eq!(content_hash("Same content"), content_hash("same content"));
        assert_eq!(content_hash("  padded  "), content_hash("padded"));
        assert_ne!(content_hash("Same content"), content_hash("Same content!"));
    }

    #[test]
    fn visibility_round_trips_through_storage_form() {
        for v in [
            Visibility::Public,
            Visibility::Private,
            Visibility::Unlisted,
            Visibility::Friends,
            Visibility::Custom,
        ] {
            assert_eq!(Visibility::parse(v.as_str()), Some(v));
        }
        assert_eq!(Visibility::parse("INTERNAL"), None);
    }

    #[test]
    fn unknown_stored_tier_denies_by_default() {
        assert_eq!(
            Visibility::parse("BOGUS").unwrap_or(Visibility::Private),
            Visibility::Private
        );
    }

    #[test]
    fn is_published_requires_not_draft_and_not_deleted() {
        let mut post = sample_post();
        assert!(post.is_published());
        post.is_draft = true;
        assert!(!post.is_published());
        post.is_draft = false;
        post.is_deleted = true;
        assert!(!post.is_published());
    }

    #[test]
    fn archiving_is_orthogonal_to_publication() {
        let mut post = sample_post();
        post.is_archived = true;
        post.archived_at = Some(2000);
        assert!(post.is_published());
        assert!(post.can_view(&Viewer::Anonymous, &[]));
    }

    #[test]
    fn scheduling_applies_only_to_drafts() {
        let mut post = sample_post();
        post.scheduled_at = Some(5000);
        assert!(!post.is_scheduled(1000), "live post is not scheduled");
        post.is_draft = true;
        assert!(post.is_scheduled(1000));
        assert!(!post.is_scheduled(6000), "past schedule is not pending");
    }

    #[test]
    fn preview_prefers_excerpt_then_truncates() {
        let mut post = sample_post();
        post.excerpt = Some("short".to_string());
        assert_eq!(post.preview(), "short");

        post.excerpt = None;
        post.body = "x".repeat(300);
        let preview = post.preview();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 283);
    }
}
