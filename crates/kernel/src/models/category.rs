//! Hierarchical categories for organizing posts.
//!
//! Categories form a tree via `parent_id`. Deleting a parent clears the
//! children's parent reference (FK `ON DELETE SET NULL`) rather than
//! cascading. Tree walks are recursive CTEs with a depth cap so an
//! accidentally cyclic parent chain cannot hang a request.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::settings::Settings;
use crate::slug::slugify;

/// Maximum tree depth considered by ancestor/descendant walks.
///
/// The data model assumes a tree by convention; the cap is the guard
/// against a parent chain that loops.
pub const MAX_TREE_DEPTH: i32 = 64;

/// A category.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Human-readable name.
    pub name: String,

    /// URL slug, unique across categories.
    pub slug: String,

    /// Optional description.
    pub description: String,

    /// Parent category (NULL for roots).
    pub parent_id: Option<Uuid>,

    /// Sort weight within the parent.
    pub weight: i32,

    /// Whether the category is shown to readers.
    pub is_active: bool,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

/// Category with depth information (for tree queries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryWithDepth {
    pub category: Category,
    pub depth: i32,
}

/// Input for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategory {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub weight: Option<i32>,
}

/// Input for updating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    /// Send `null` to clear the parent, omit to leave it unchanged.
    #[serde(default, deserialize_with = "super::double_option")]
    pub parent_id: Option<Option<Uuid>>,
    pub weight: Option<i32>,
    pub is_active: Option<bool>,
}

const COLS: &str = "id, name, slug, description, parent_id, weight, is_active, created, changed";

impl Category {
    /// Find a category by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let category = sqlx::query_as::<_, Self>(&format!(
            "SELECT {COLS} FROM category WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch category")?;

        Ok(category)
    }

    /// Find a category by slug.
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>> {
        let category = sqlx::query_as::<_, Self>(&format!(
            "SELECT {COLS} FROM category WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("failed to fetch category by slug")?;

        Ok(category)
    }

    /// List all categories ordered by weight.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let categories = sqlx::query_as::<_, Self>(&format!(
            "SELECT {COLS} FROM category ORDER BY weight, name"
        ))
        .fetch_all(pool)
        .await
        .context("failed to list categories")?;

        Ok(categories)
    }

    /// List active categories ordered by weight.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>> {
        let categories = sqlx::query_as::<_, Self>(&format!(
            "SELECT {COLS} FROM category WHERE is_active = TRUE ORDER BY weight, name"
        ))
        .fetch_all(pool)
        .await
        .context("failed to list active categories")?;

        Ok(categories)
    }

    /// Create a new category.
    ///
    /// Derives the slug from the name when none is supplied. The unique
    /// constraint on `slug` surfaces duplicates as an error.
    pub async fn create(pool: &PgPool, settings: &Settings, input: CreateCategory) -> Result<Self> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now().timestamp();
        let max_len = settings.slug_max_length()?;
        let slug = match input.slug {
            Some(slug) if !slug.trim().is_empty() => slug,
            _ => slugify(&input.name, max_len),
        };

        sqlx::query(
            r#"
            INSERT INTO category (id, name, slug, description, parent_id, weight, is_active, created, changed)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $8)
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&slug)
        .bind(input.description.unwrap_or_default())
        .bind(input.parent_id)
        .bind(input.weight.unwrap_or(0))
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("failed to create category")?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("failed to fetch created category"))
    }

    /// Update a category.
    pub async fn update(pool: &PgPool, id: Uuid, input: UpdateCategory) -> Result<Option<Self>> {
        let Some(current) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let now = chrono::Utc::now().timestamp();
        let name = input.name.unwrap_or(current.name);
        let slug = input.slug.unwrap_or(current.slug);
        let description = input.description.unwrap_or(current.description);
        let parent_id = input.parent_id.unwrap_or(current.parent_id);
        let weight = input.weight.unwrap_or(current.weight);
        let is_active = input.is_active.unwrap_or(current.is_active);

        sqlx::query(
            r#"
            UPDATE category
            SET name = $1, slug = $2, description = $3, parent_id = $4, weight = $5, is_active = $6, changed = $7
            WHERE id = $8
            "#,
        )
        .bind(&name)
        .bind(&slug)
        .bind(&description)
        .bind(parent_id)
        .bind(weight)
        .bind(is_active)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update category")?;

        Self::find_by_id(pool, id).await
    }

    /// Delete a category.
    ///
    /// Children keep existing with their parent reference cleared; posts in
    /// the category keep existing with their category reference cleared
    /// (both via `ON DELETE SET NULL`).
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM category WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete category")?;

        Ok(result.rows_affected() > 0)
    }

    /// Get all ancestors of a category, nearest parent first.
    pub async fn ancestors(pool: &PgPool, id: Uuid) -> Result<Vec<CategoryWithDepth>> {
        #[derive(sqlx::FromRow)]
        struct AncestorRow {
            id: Uuid,
            name: String,
            slug: String,
            description: String,
            parent_id: Option<Uuid>,
            weight: i32,
            is_active: bool,
            created: i64,
            changed: i64,
            depth: i32,
        }

        let rows = sqlx::query_as::<_, AncestorRow>(
            r#"
            WITH RECURSIVE ancestors AS (
                SELECT c.id, c.name, c.slug, c.description, c.parent_id, c.weight, c.is_active,
                       c.created, c.changed, 1 AS depth
                FROM category c
                WHERE c.id = (SELECT parent_id FROM category WHERE id = $1)

                UNION ALL

                SELECT c.id, c.name, c.slug, c.description, c.parent_id, c.weight, c.is_active,
                       c.created, c.changed, a.depth + 1
                FROM category c
                INNER JOIN ancestors a ON c.id = a.parent_id
                WHERE a.depth < $2
            )
            SELECT DISTINCT id, name, slug, description, parent_id, weight, is_active, created, changed, depth
            FROM ancestors
            ORDER BY depth
            "#,
        )
        .bind(id)
        .bind(MAX_TREE_DEPTH)
        .fetch_all(pool)
        .await
        .context("failed to fetch category ancestors")?;

        Ok(rows
            .into_iter()
            .map(|r| CategoryWithDepth {
                category: Category {
                    id: r.id,
                    name: r.name,
                    slug: r.slug,
                    description: r.description,
                    parent_id: r.parent_id,
                    weight: r.weight,
                    is_active: r.is_active,
                    created: r.created,
                    changed: r.changed,
                },
                depth: r.depth,
            })
            .collect())
    }

    /// Get all descendants of a category.
    pub async fn descendants(pool: &PgPool, id: Uuid) -> Result<Vec<CategoryWithDepth>> {
        #[derive(sqlx::FromRow)]
        struct DescendantRow {
            id: Uuid,
            name: String,
            slug: String,
            description: String,
            parent_id: Option<Uuid>,
            weight: i32,
            is_active: bool,
            created: i64,
            changed: i64,
            depth: i32,
        }

        let rows = sqlx::query_as::<_, DescendantRow>(
            r#"
            WITH RECURSIVE descendants AS (
                SELECT c.id, c.name, c.slug, c.description, c.parent_id, c.weight, c.is_active,
                       c.created, c.changed, 1 AS depth
                FROM category c
                WHERE c.parent_id = $1

                UNION ALL

                SELECT c.id, c.name, c.slug, c.description, c.parent_id, c.weight, c.is_active,
                       c.created, c.changed, d.depth + 1
                FROM category c
                INNER JOIN descendants d ON c.parent_id = d.id
                WHERE d.depth < $2
            )
            SELECT DISTINCT id, name, slug, description, parent_id, weight, is_active, created, changed, depth
            FROM descendants
            ORDER BY depth, weight, name
            "#,
        )
        .bind(id)
        .bind(MAX_TREE_DEPTH)
        .fetch_all(pool)
        .await
        .context("failed to fetch category descendants")?;

        Ok(rows
            .into_iter()
            .map(|r| CategoryWithDepth {
                category: Category {
                    id: r.id,
                    name: r.name,
                    slug: r.slug,
                    description: r.description,
                    parent_id: r.parent_id,
                    weight: r.weight,
                    is_active: r.is_active,
                    created: r.created,
                    changed: r.changed,
                },
                depth: r.depth,
            })
            .collect())
    }

    /// Count published posts in this category.
    pub async fn post_count(pool: &PgPool, id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM post WHERE category_id = $1 AND is_draft = FALSE AND is_deleted = FALSE",
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .context("failed to count posts in category")?;

        Ok(count)
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn category_serialization_round_trips() {
        let category = Category {
            id: Uuid::nil(),
            name: "Travel".to_string(),
            slug: "travel".to_string(),
            description: String::new(),
            parent_id: None,
            weight: 0,
            is_active: true,
            created: 1000,
            changed: 1000,
        };

        let json = serde_json::to_string(&category).unwrap();
        let parsed: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.slug, "travel");
        assert!(parsed.parent_id.is_none());
    }

    #[test]
    fn update_input_distinguishes_clearing_the_parent() {
        // `parent_id: None` leaves the parent untouched; `Some(None)` clears it.
        let keep: UpdateCategory = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert!(keep.parent_id.is_none());

        let clear: UpdateCategory = serde_json::from_str(r#"{"parent_id":null}"#).unwrap();
        assert_eq!(clear.parent_id, Some(None));
    }

    #[test]
    fn tree_depth_cap_is_sane() {
        assert!(MAX_TREE_DEPTH >= 16);
    }
}
