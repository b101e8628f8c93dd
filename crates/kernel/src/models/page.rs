//! Static pages (about, contact, etc.).
//!
//! Pages are the simpler sibling of posts: no visibility tiers, no
//! comments, no feeds. They can appear in the navigation menu.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::settings::Settings;
use crate::slug::slugify;

/// A static page.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Page {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub title: String,

    /// URL slug, unique across pages.
    pub slug: String,

    /// Page body (markdown).
    pub body: String,

    /// Author user ID.
    pub author_id: Uuid,

    pub is_published: bool,

    /// Whether the page appears in the navigation menu.
    pub show_in_nav: bool,

    /// Sort weight in the navigation menu.
    pub nav_weight: i32,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

/// Input for creating a page.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePage {
    pub title: String,
    pub slug: Option<String>,
    pub body: String,
    pub author_id: Uuid,
    pub is_published: Option<bool>,
    pub show_in_nav: Option<bool>,
    pub nav_weight: Option<i32>,
}

/// Input for updating a page.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePage {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub body: Option<String>,
    pub is_published: Option<bool>,
    pub show_in_nav: Option<bool>,
    pub nav_weight: Option<i32>,
}

const COLS: &str =
    "id, title, slug, body, author_id, is_published, show_in_nav, nav_weight, created, changed";

impl Page {
    /// Find a page by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let page = sqlx::query_as::<_, Self>(&format!("SELECT {COLS} FROM page WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch page")?;

        Ok(page)
    }

    /// Find a page by slug.
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>> {
        let page = sqlx::query_as::<_, Self>(&format!("SELECT {COLS} FROM page WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(pool)
            .await
            .context("failed to fetch page by slug")?;

        Ok(page)
    }

    /// List published pages in navigation order.
    pub async fn list_published(pool: &PgPool) -> Result<Vec<Self>> {
        let pages = sqlx::query_as::<_, Self>(&format!(
            "SELECT {COLS} FROM page WHERE is_published = TRUE ORDER BY nav_weight, title"
        ))
        .fetch_all(pool)
        .await
        .context("failed to list pages")?;

        Ok(pages)
    }

    /// List published pages marked for the navigation menu.
    pub async fn list_nav(pool: &PgPool) -> Result<Vec<Self>> {
        let pages = sqlx::query_as::<_, Self>(&format!(
            "SELECT {COLS} FROM page \
             WHERE is_published = TRUE AND show_in_nav = TRUE ORDER BY nav_weight, title"
        ))
        .fetch_all(pool)
        .await
        .context("failed to list nav pages")?;

        Ok(pages)
    }

    /// Create a new page. The slug is derived from the title when absent;
    /// the unique constraint surfaces duplicates.
    pub async fn create(pool: &PgPool, settings: &Settings, input: CreatePage) -> Result<Self> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now().timestamp();
        let max_len = settings.slug_max_length()?;
        let slug = match input.slug {
            Some(slug) if !slug.trim().is_empty() => slug,
            _ => slugify(&input.title, max_len),
        };

        sqlx::query(
            r#"
            INSERT INTO page (id, title, slug, body, author_id, is_published, show_in_nav, nav_weight, created, changed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&slug)
        .bind(&input.body)
        .bind(input.author_id)
        .bind(input.is_published.unwrap_or(true))
        .bind(input.show_in_nav.unwrap_or(false))
        .bind(input.nav_weight.unwrap_or(0))
        .bind(now)
        .execute(pool)
        .await
        .context("failed to create page")?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("failed to fetch created page"))
    }

    /// Update a page.
    pub async fn update(pool: &PgPool, id: Uuid, input: UpdatePage) -> Result<Option<Self>> {
        let Some(current) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let now = chrono::Utc::now().timestamp();
        let title = input.title.unwrap_or(current.title);
        let slug = input.slug.unwrap_or(current.slug);
        let body = input.body.unwrap_or(current.body);
        let is_published = input.is_published.unwrap_or(current.is_published);
        let show_in_nav = input.show_in_nav.unwrap_or(current.show_in_nav);
        let nav_weight = input.nav_weight.unwrap_or(current.nav_weight);

        sqlx::query(
            r#"
            UPDATE page
            SET title = $1, slug = $2, body = $3, is_published = $4, show_in_nav = $5, nav_weight = $6, changed = $7
            WHERE id = $8
            "#,
        )
        .bind(&title)
        .bind(&slug)
        .bind(&body)
        .bind(is_published)
        .bind(show_in_nav)
        .bind(nav_weight)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update page")?;

        Self::find_by_id(pool, id).await
    }

    /// Delete a page.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM page WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete page")?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn page_serialization_round_trips() {
        let page = Page {
            id: Uuid::nil(),
            title: "About".to_string(),
            slug: "about".to_string(),
            body: "Hello".to_string(),
            author_id: Uuid::nil(),
            is_published: true,
            show_in_nav: true,
            nav_weight: 5,
            created: 1000,
            changed: 1000,
        };

        let json = serde_json::to_string(&page).unwrap();
        let parsed: Page = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.slug, "about");
        assert!(parsed.show_in_nav);
    }

    #[test]
    fn create_input_defaults_to_published() {
        let input: CreatePage = serde_json::from_value(serde_json::json!({
            "title": "Contact",
            "body": "Write us",
            "author_id": Uuid::nil(),
        }))
        .unwrap();
        assert!(input.is_published.is_none());
        assert!(input.slug.is_none());
    }
}
