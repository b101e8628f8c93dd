//! Database connection pool management and schema migration.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Check if the database connection is healthy.
pub async fn check_health(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// Idempotent schema DDL, executed in order at startup.
///
/// The unique constraints here are the correctness backstop for every
/// check-then-act sequence in the application layer: post slugs, media
/// content hashes, the (post, user) reaction pair, and the (post, media)
/// attachment pair must all fail loudly on duplicate insert.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS category (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        parent_id UUID REFERENCES category(id) ON DELETE SET NULL,
        weight INT NOT NULL DEFAULT 0,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created BIGINT NOT NULL,
        changed BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tag (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        slug TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        created BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post (
        id UUID PRIMARY KEY,
        title TEXT,
        slug TEXT,
        body TEXT NOT NULL,
        excerpt TEXT,
        location TEXT,
        author_id UUID NOT NULL,
        category_id UUID REFERENCES category(id) ON DELETE SET NULL,
        visibility TEXT NOT NULL DEFAULT 'PUBLIC',
        is_draft BOOLEAN NOT NULL DEFAULT FALSE,
        is_pinned BOOLEAN NOT NULL DEFAULT FALSE,
        is_archived BOOLEAN NOT NULL DEFAULT FALSE,
        archived_at BIGINT,
        is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
        deleted_at BIGINT,
        allow_comments BOOLEAN NOT NULL DEFAULT TRUE,
        scheduled_at BIGINT,
        published_at BIGINT,
        content_hash TEXT NOT NULL DEFAULT '',
        ai_enhanced BOOLEAN NOT NULL DEFAULT FALSE,
        ai_instructions TEXT NOT NULL DEFAULT '',
        original_content TEXT NOT NULL DEFAULT '',
        view_count BIGINT NOT NULL DEFAULT 0,
        created BIGINT NOT NULL,
        changed BIGINT NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS post_slug_key ON post (slug) WHERE slug IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS post_visibility_idx ON post (visibility, is_draft, created DESC)",
    "CREATE INDEX IF NOT EXISTS post_author_idx ON post (author_id, created DESC)",
    "CREATE INDEX IF NOT EXISTS post_content_hash_idx ON post (content_hash)",
    r#"
    CREATE TABLE IF NOT EXISTS post_tag (
        post_id UUID NOT NULL REFERENCES post(id) ON DELETE CASCADE,
        tag_id UUID NOT NULL REFERENCES tag(id) ON DELETE CASCADE,
        PRIMARY KEY (post_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post_allowed_user (
        post_id UUID NOT NULL REFERENCES post(id) ON DELETE CASCADE,
        user_id UUID NOT NULL,
        PRIMARY KEY (post_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS page (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        body TEXT NOT NULL,
        author_id UUID NOT NULL,
        is_published BOOLEAN NOT NULL DEFAULT TRUE,
        show_in_nav BOOLEAN NOT NULL DEFAULT FALSE,
        nav_weight INT NOT NULL DEFAULT 0,
        created BIGINT NOT NULL,
        changed BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS media_item (
        id UUID PRIMARY KEY,
        uri TEXT NOT NULL,
        content_hash TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL,
        original_filename TEXT NOT NULL,
        file_size BIGINT NOT NULL,
        width INT,
        height INT,
        mime_type TEXT NOT NULL DEFAULT '',
        duration DOUBLE PRECISION,
        exif_data JSONB NOT NULL DEFAULT '{}'::jsonb,
        camera_make TEXT NOT NULL DEFAULT '',
        camera_model TEXT NOT NULL DEFAULT '',
        focal_length TEXT NOT NULL DEFAULT '',
        aperture TEXT NOT NULL DEFAULT '',
        shutter_speed TEXT NOT NULL DEFAULT '',
        iso INT,
        gps_latitude DOUBLE PRECISION,
        gps_longitude DOUBLE PRECISION,
        capture_date BIGINT,
        alt_text TEXT NOT NULL DEFAULT '',
        caption TEXT NOT NULL DEFAULT '',
        ai_tags JSONB NOT NULL DEFAULT '[]'::jsonb,
        ai_description TEXT NOT NULL DEFAULT '',
        uploaded_by UUID,
        created BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS media_tag (
        media_id UUID NOT NULL REFERENCES media_item(id) ON DELETE CASCADE,
        tag_id UUID NOT NULL REFERENCES tag(id) ON DELETE CASCADE,
        PRIMARY KEY (media_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post_media (
        post_id UUID NOT NULL REFERENCES post(id) ON DELETE CASCADE,
        media_id UUID NOT NULL REFERENCES media_item(id) ON DELETE CASCADE,
        weight INT NOT NULL DEFAULT 0,
        custom_alt_text TEXT NOT NULL DEFAULT '',
        custom_caption TEXT NOT NULL DEFAULT '',
        created BIGINT NOT NULL,
        PRIMARY KEY (post_id, media_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comment (
        id UUID PRIMARY KEY,
        post_id UUID NOT NULL REFERENCES post(id) ON DELETE CASCADE,
        author_id UUID NOT NULL,
        parent_id UUID REFERENCES comment(id) ON DELETE CASCADE,
        body TEXT NOT NULL,
        is_approved BOOLEAN NOT NULL,
        is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
        deleted_at BIGINT,
        is_edited BOOLEAN NOT NULL DEFAULT FALSE,
        edit_count INT NOT NULL DEFAULT 0,
        created BIGINT NOT NULL,
        changed BIGINT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS comment_post_idx ON comment (post_id, is_approved, created)",
    r#"
    CREATE TABLE IF NOT EXISTS pending_comment (
        id UUID PRIMARY KEY,
        post_id UUID NOT NULL REFERENCES post(id) ON DELETE CASCADE,
        author_id UUID,
        author_name TEXT NOT NULL DEFAULT '',
        author_email TEXT NOT NULL DEFAULT '',
        author_url TEXT NOT NULL DEFAULT '',
        parent_id UUID REFERENCES comment(id) ON DELETE CASCADE,
        body TEXT NOT NULL,
        ip_address TEXT,
        user_agent TEXT NOT NULL DEFAULT '',
        created BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comment_history (
        id UUID PRIMARY KEY,
        comment_id UUID NOT NULL REFERENCES comment(id) ON DELETE CASCADE,
        body TEXT NOT NULL,
        edited_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reaction (
        id UUID PRIMARY KEY,
        post_id UUID NOT NULL REFERENCES post(id) ON DELETE CASCADE,
        user_id UUID NOT NULL,
        kind TEXT NOT NULL,
        created BIGINT NOT NULL,
        UNIQUE (post_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS moderation_log (
        id UUID PRIMARY KEY,
        pending_id UUID NOT NULL,
        post_id UUID NOT NULL,
        action TEXT NOT NULL,
        reviewer_id UUID NOT NULL,
        reason TEXT NOT NULL DEFAULT '',
        comment_id UUID,
        created BIGINT NOT NULL
    )
    "#,
];

/// Create the schema if it does not exist yet.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    for statement in MIGRATIONS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("failed migration statement: {}", first_line(statement)))?;
    }

    Ok(())
}

fn first_line(statement: &str) -> &str {
    statement
        .trim()
        .lines()
        .next()
        .unwrap_or_default()
        .trim_end()
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn migration_statements_are_single_statements() {
        // sqlx prepared queries cannot carry multiple statements, so none of
        // the DDL entries may contain a top-level semicolon.
        for statement in MIGRATIONS {
            assert!(
                !statement.trim().trim_end_matches(';').contains(';'),
                "multi-statement migration: {}",
                first_line(statement)
            );
        }
    }

    #[test]
    fn first_line_reports_table_name() {
        assert_eq!(
            first_line("\n    CREATE TABLE IF NOT EXISTS tag (\n..."),
            "CREATE TABLE IF NOT EXISTS tag ("
        );
    }
}
