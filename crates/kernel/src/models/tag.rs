//! Flat tags for posts and media.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::settings::Settings;
use crate::slug::slugify;

/// A tag.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Human-readable name, unique.
    pub name: String,

    /// URL slug, unique.
    pub slug: String,

    /// Optional description.
    pub description: String,

    /// Unix timestamp when created.
    pub created: i64,
}

/// Input for creating a tag.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTag {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
}

/// Input for updating a tag.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTag {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
}

const COLS: &str = "id, name, slug, description, created";

impl Tag {
    /// Find a tag by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let tag = sqlx::query_as::<_, Self>(&format!("SELECT {COLS} FROM tag WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch tag")?;

        Ok(tag)
    }

    /// Find a tag by slug.
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>> {
        let tag = sqlx::query_as::<_, Self>(&format!("SELECT {COLS} FROM tag WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(pool)
            .await
            .context("failed to fetch tag by slug")?;

        Ok(tag)
    }

    /// List all tags ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let tags = sqlx::query_as::<_, Self>(&format!("SELECT {COLS} FROM tag ORDER BY name"))
            .fetch_all(pool)
            .await
            .context("failed to list tags")?;

        Ok(tags)
    }

    /// Create a new tag.
    ///
    /// Both name and slug are unique; duplicates surface as errors from the
    /// constraints.
    pub async fn create(pool: &PgPool, settings: &Settings, input: CreateTag) -> Result<Self> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now().timestamp();
        let max_len = settings.slug_max_length()?;
        let slug = match input.slug {
            Some(slug) if !slug.trim().is_empty() => slug,
            _ => slugify(&input.name, max_len),
        };

        sqlx::query(
            "INSERT INTO tag (id, name, slug, description, created) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&slug)
        .bind(input.description.unwrap_or_default())
        .bind(now)
        .execute(pool)
        .await
        .context("failed to create tag")?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("failed to fetch created tag"))
    }

    /// Update a tag.
    pub async fn update(pool: &PgPool, id: Uuid, input: UpdateTag) -> Result<Option<Self>> {
        let Some(current) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let name = input.name.unwrap_or(current.name);
        let slug = input.slug.unwrap_or(current.slug);
        let description = input.description.unwrap_or(current.description);

        sqlx::query("UPDATE tag SET name = $1, slug = $2, description = $3 WHERE id = $4")
            .bind(&name)
            .bind(&slug)
            .bind(&description)
            .bind(id)
            .execute(pool)
            .await
            .context("failed to update tag")?;

        Self::find_by_id(pool, id).await
    }

    /// Delete a tag (junction rows cascade).
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tag WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete tag")?;

        Ok(result.rows_affected() > 0)
    }

    /// List tags attached to a post.
    pub async fn list_for_post(pool: &PgPool, post_id: Uuid) -> Result<Vec<Self>> {
        let tags = sqlx::query_as::<_, Self>(
            r#"
            SELECT t.id, t.name, t.slug, t.description, t.created
            FROM tag t
            INNER JOIN post_tag pt ON t.id = pt.tag_id
            WHERE pt.post_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("failed to list tags for post")?;

        Ok(tags)
    }

    /// Count published posts carrying this tag.
    pub async fn post_count(pool: &PgPool, id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM post p
            INNER JOIN post_tag pt ON p.id = pt.post_id
            WHERE pt.tag_id = $1 AND p.is_draft = FALSE AND p.is_deleted = FALSE
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .context("failed to count posts for tag")?;

        Ok(count)
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn tag_serialization_round_trips() {
        let tag = Tag {
            id: Uuid::nil(),
            name: "Rust".to_string(),
            slug: "rust".to_string(),
            description: String::new(),
            created: 1000,
        };

        let json = serde_json::to_string(&tag).unwrap();
        let parsed: Tag = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, "Rust");
    }

    #[test]
    fn create_input_accepts_missing_slug() {
        let input: CreateTag = serde_json::from_str(r#"{"name":"Street Photography"}"#).unwrap();
        assert!(input.slug.is_none());
        assert!(input.description.is_none());
    }
}
