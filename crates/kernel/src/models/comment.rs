//! Comment model for threaded, moderated discussions on posts.
//!
//! Comments thread via `parent_id`. Edits snapshot the prior body into an
//! append-only history table before overwriting. Deletion is a soft flag;
//! the row is retained.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Maximum thread depth considered by the tree walks.
///
/// Nesting is unbounded by design; the cap only guards a parent chain that
/// accidentally loops.
pub const MAX_THREAD_DEPTH: i32 = 64;

/// Comment record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Post this comment belongs to.
    pub post_id: Uuid,

    /// Author user ID.
    pub author_id: Uuid,

    /// Parent comment ID (NULL for top-level comments).
    pub parent_id: Option<Uuid>,

    /// Comment body.
    pub body: String,

    /// Whether the comment is approved and visible.
    pub is_approved: bool,

    pub is_deleted: bool,
    pub deleted_at: Option<i64>,

    pub is_edited: bool,
    pub edit_count: i32,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

/// Snapshot of a comment body prior to an edit. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentHistory {
    pub id: Uuid,
    pub comment_id: Uuid,
    pub body: String,
    pub edited_at: i64,
}

/// Input for creating a comment.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateComment {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub body: String,
    pub is_approved: bool,
}

const COLS: &str = "id, post_id, author_id, parent_id, body, is_approved, is_deleted, \
                    deleted_at, is_edited, edit_count, created, changed";

impl Comment {
    /// Whether this is a reply to another comment.
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Short preview of the body for moderation lists.
    pub fn preview(&self) -> String {
        if self.body.chars().count() > 100 {
            let truncated: String = self.body.chars().take(100).collect();
            return format!("{truncated}...");
        }
        self.body.clone()
    }

    /// Create a new comment.
    pub async fn create(pool: &PgPool, input: CreateComment) -> Result<Self> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now().timestamp();

        let comment = sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO comment (id, post_id, author_id, parent_id, body, is_approved, created, changed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {COLS}
            "#
        ))
        .bind(id)
        .bind(input.post_id)
        .bind(input.author_id)
        .bind(input.parent_id)
        .bind(&input.body)
        .bind(input.is_approved)
        .bind(now)
        .fetch_one(pool)
        .await
        .context("failed to create comment")?;

        Ok(comment)
    }

    /// Find a comment by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COLS} FROM comment WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch comment by id")?;

        Ok(comment)
    }

    /// List approved, non-deleted comments for a post in threaded order.
    ///
    /// Top-level comments oldest first, each followed by its replies. The
    /// depth guard stops a cyclic parent chain from recursing forever.
    pub async fn list_for_post(pool: &PgPool, post_id: Uuid) -> Result<Vec<Self>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            WITH RECURSIVE thread AS (
                SELECT id, post_id, author_id, parent_id, body, is_approved, is_deleted,
                       deleted_at, is_edited, edit_count, created, changed,
                       ARRAY[created] AS sort_path, 0 AS depth
                FROM comment
                WHERE post_id = $1 AND parent_id IS NULL
                  AND is_approved = TRUE AND is_deleted = FALSE

                UNION ALL

                SELECT c.id, c.post_id, c.author_id, c.parent_id, c.body, c.is_approved,
                       c.is_deleted, c.deleted_at, c.is_edited, c.edit_count, c.created, c.changed,
                       t.sort_path || c.created, t.depth + 1
                FROM comment c
                INNER JOIN thread t ON c.parent_id = t.id
                WHERE c.is_approved = TRUE AND c.is_deleted = FALSE AND t.depth < $2
            )
            SELECT id, post_id, author_id, parent_id, body, is_approved, is_deleted,
                   deleted_at, is_edited, edit_count, created, changed
            FROM thread
            ORDER BY sort_path
            "#,
        )
        .bind(post_id)
        .bind(MAX_THREAD_DEPTH)
        .fetch_all(pool)
        .await
        .context("failed to list comments for post")?;

        Ok(comments)
    }

    /// Count approved, non-deleted comments on a post.
    pub async fn count_for_post(pool: &PgPool, post_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comment WHERE post_id = $1 AND is_approved = TRUE AND is_deleted = FALSE",
        )
        .bind(post_id)
        .fetch_one(pool)
        .await
        .context("failed to count comments for post")?;

        Ok(count)
    }

    /// List all comments (for admin moderation), newest first.
    pub async fn list_all(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COLS} FROM comment ORDER BY created DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("failed to list all comments")?;

        Ok(comments)
    }

    /// Direct replies to a comment (approved, not deleted), oldest first.
    pub async fn replies(pool: &PgPool, id: Uuid) -> Result<Vec<Self>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COLS} FROM comment \
             WHERE parent_id = $1 AND is_approved = TRUE AND is_deleted = FALSE \
             ORDER BY created ASC"
        ))
        .bind(id)
        .fetch_all(pool)
        .await
        .context("failed to fetch replies")?;

        Ok(comments)
    }

    /// Nesting depth of a comment: hops to the root of its thread.
    ///
    /// Walks parent references with a recursive CTE; the depth cap bounds
    /// the walk instead of trusting the no-cycles invariant unconditionally.
    pub async fn thread_depth(pool: &PgPool, id: Uuid) -> Result<i32> {
        let depth: Option<i32> = sqlx::query_scalar(
            r#"
            WITH RECURSIVE chain AS (
                SELECT parent_id, 0 AS depth FROM comment WHERE id = $1

                UNION ALL

                SELECT c.parent_id, chain.depth + 1
                FROM comment c
                INNER JOIN chain ON c.id = chain.parent_id
                WHERE chain.depth < $2
            )
            SELECT MAX(depth) FROM chain
            "#,
        )
        .bind(id)
        .bind(MAX_THREAD_DEPTH)
        .fetch_one(pool)
        .await
        .context("failed to compute thread depth")?;

        Ok(depth.unwrap_or(0))
    }

    /// Approve the comment for display.
    pub async fn approve(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        Self::set_approval(pool, id, true).await
    }

    /// Reject (unapprove) the comment. The row is kept.
    pub async fn reject(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        Self::set_approval(pool, id, false).await
    }

    async fn set_approval(pool: &PgPool, id: Uuid, approved: bool) -> Result<Option<Self>> {
        let now = chrono::Utc::now().timestamp();
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comment SET is_approved = $1, changed = $2 WHERE id = $3 RETURNING {COLS}"
        ))
        .bind(approved)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to set comment approval")?;

        Ok(comment)
    }

    /// Soft-delete the comment.
    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let now = chrono::Utc::now().timestamp();
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comment SET is_deleted = TRUE, deleted_at = $1, changed = $1 \
             WHERE id = $2 RETURNING {COLS}"
        ))
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to soft-delete comment")?;

        Ok(comment)
    }

    /// Edit the comment body.
    ///
    /// Snapshots the current body into `comment_history`, then overwrites
    /// the body, marks the comment edited, and increments the edit counter.
    /// Snapshot and overwrite share a transaction so history can never miss
    /// an edit.
    pub async fn edit(pool: &PgPool, id: Uuid, new_body: &str) -> Result<Option<Self>> {
        let now = chrono::Utc::now().timestamp();

        let mut tx = pool.begin().await.context("failed to start transaction")?;

        let current_body: Option<String> =
            sqlx::query_scalar("SELECT body FROM comment WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("failed to lock comment for edit")?;

        let Some(current_body) = current_body else {
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO comment_history (id, comment_id, body, edited_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::now_v7())
        .bind(id)
        .bind(&current_body)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("failed to record comment history")?;

        let comment = sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comment \
             SET body = $1, is_edited = TRUE, edit_count = edit_count + 1, changed = $2 \
             WHERE id = $3 RETURNING {COLS}"
        ))
        .bind(new_body)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("failed to update comment body")?;

        tx.commit().await.context("failed to commit transaction")?;

        Ok(Some(comment))
    }

    /// Edit history for a comment, most recent first.
    pub async fn history(pool: &PgPool, id: Uuid) -> Result<Vec<CommentHistory>> {
        let entries = sqlx::query_as::<_, CommentHistory>(
            "SELECT id, comment_id, body, edited_at FROM comment_history \
             WHERE comment_id = $1 ORDER BY edited_at DESC, id DESC",
        )
        .bind(id)
        .fetch_all(pool)
        .await
        .context("failed to fetch comment history")?;

        Ok(entries)
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_comment() -> Comment {
        Comment {
            id: Uuid::now_v7(),
            post_id: Uuid::now_v7(),
            author_id: Uuid::now_v7(),
            parent_id: None,
            body: "Nice!".to_string(),
            is_approved: true,
            is_deleted: false,
            deleted_at: None,
            is_edited: false,
            edit_count: 0,
            created: 1000,
            changed: 1000,
        }
    }

    #[test]
    fn top_level_comment_is_not_a_reply() {
        let mut comment = sample_comment();
        assert!(!comment.is_reply());
        comment.parent_id = Some(Uuid::now_v7());
        assert!(comment.is_reply());
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let mut comment = sample_comment();
        assert_eq!(comment.preview(), "Nice!");

        comment.body = "y".repeat(150);
        let preview = comment.preview();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 103);
    }

    #[test]
    fn comment_serialization_round_trips() {
        let comment = sample_comment();
        let json = serde_json::to_string(&comment).unwrap();
        let parsed: Comment = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.body, "Nice!");
        assert!(parsed.is_approved);
        assert_eq!(parsed.edit_count, 0);
    }

    #[test]
    fn thread_depth_cap_is_sane() {
        assert!(MAX_THREAD_DEPTH >= 16);
    }
}
