//! Pending comments awaiting moderation.
//!
//! Submissions from anonymous visitors, or from authenticated users while
//! moderation is on, are staged here. A pending comment is resolved by
//! exactly one of two terminal operations: approve (materializes a live,
//! pre-approved comment) or reject (discards with a reason). Review
//! metadata outlives the pending row in `moderation_log`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::comment::Comment;

/// A comment submission awaiting review.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PendingComment {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Post the submission targets.
    pub post_id: Uuid,

    /// Author user ID for authenticated submissions awaiting moderation.
    pub author_id: Option<Uuid>,

    /// Anonymous submitter identity.
    pub author_name: String,
    pub author_email: String,
    pub author_url: String,

    /// Parent comment for replies.
    pub parent_id: Option<Uuid>,

    /// Submitted body.
    pub body: String,

    /// Submission metadata.
    pub ip_address: Option<String>,
    pub user_agent: String,

    /// Unix timestamp when submitted.
    pub created: i64,
}

/// Input for staging a pending comment.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePendingComment {
    pub post_id: Uuid,
    pub author_id: Option<Uuid>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub author_url: Option<String>,
    pub parent_id: Option<Uuid>,
    pub body: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Review decision recorded when a pending comment is resolved.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModerationLog {
    pub id: Uuid,
    pub pending_id: Uuid,
    pub post_id: Uuid,
    /// "approve" or "reject".
    pub action: String,
    pub reviewer_id: Uuid,
    pub reason: String,
    /// The live comment created by an approval.
    pub comment_id: Option<Uuid>,
    pub created: i64,
}

const COLS: &str = "id, post_id, author_id, author_name, author_email, author_url, parent_id, \
                    body, ip_address, user_agent, created";

impl PendingComment {
    /// Whether the submission came from an anonymous visitor.
    pub fn is_anonymous(&self) -> bool {
        self.author_id.is_none()
    }

    /// Display name for moderation lists.
    pub fn submitter_label(&self) -> String {
        match self.author_id {
            Some(id) => id.to_string(),
            None if !self.author_name.is_empty() => self.author_name.clone(),
            None => "anonymous".to_string(),
        }
    }

    /// Stage a new pending comment.
    pub async fn create(pool: &PgPool, input: CreatePendingComment) -> Result<Self> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now().timestamp();

        let pending = sqlx::query_as::<_, PendingComment>(&format!(
            r#"
            INSERT INTO pending_comment (id, post_id, author_id, author_name, author_email,
                                         author_url, parent_id, body, ip_address, user_agent, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {COLS}
            "#
        ))
        .bind(id)
        .bind(input.post_id)
        .bind(input.author_id)
        .bind(input.author_name.unwrap_or_default())
        .bind(input.author_email.unwrap_or_default())
        .bind(input.author_url.unwrap_or_default())
        .bind(input.parent_id)
        .bind(&input.body)
        .bind(&input.ip_address)
        .bind(input.user_agent.unwrap_or_default())
        .bind(now)
        .fetch_one(pool)
        .await
        .context("failed to create pending comment")?;

        Ok(pending)
    }

    /// Find a pending comment by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let pending = sqlx::query_as::<_, PendingComment>(&format!(
            "SELECT {COLS} FROM pending_comment WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch pending comment")?;

        Ok(pending)
    }

    /// List pending comments, newest first.
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>> {
        let pending = sqlx::query_as::<_, PendingComment>(&format!(
            "SELECT {COLS} FROM pending_comment ORDER BY created DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("failed to list pending comments")?;

        Ok(pending)
    }

    /// Count pending comments.
    pub async fn count(pool: &PgPool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_comment")
            .fetch_one(pool)
            .await
            .context("failed to count pending comments")?;

        Ok(count)
    }

    /// Approve the pending comment: create a live, pre-approved comment
    /// and remove the pending row.
    ///
    /// The delete-with-returning makes this terminal operation atomic: a
    /// second approve of the same id finds no row and returns `None`
    /// instead of double-creating. Returns an error for anonymous
    /// submissions — there is no host account to own the live comment.
    pub async fn approve(pool: &PgPool, id: Uuid, reviewer_id: Uuid) -> Result<Option<Comment>> {
        let now = chrono::Utc::now().timestamp();

        let mut tx = pool.begin().await.context("failed to start transaction")?;

        let pending = sqlx::query_as::<_, PendingComment>(&format!(
            "DELETE FROM pending_comment WHERE id = $1 RETURNING {COLS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to claim pending comment")?;

        let Some(pending) = pending else {
            return Ok(None);
        };

        let Some(author_id) = pending.author_id else {
            anyhow::bail!("pending comment {id} has no authenticated author");
        };

        let comment_id = Uuid::now_v7();
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comment (id, post_id, author_id, parent_id, body, is_approved, created, changed)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6, $6)
            RETURNING id, post_id, author_id, parent_id, body, is_approved, is_deleted,
                      deleted_at, is_edited, edit_count, created, changed
            "#,
        )
        .bind(comment_id)
        .bind(pending.post_id)
        .bind(author_id)
        .bind(pending.parent_id)
        .bind(&pending.body)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .context("failed to materialize approved comment")?;

        ModerationLog::record(
            &mut tx,
            &pending,
            "approve",
            reviewer_id,
            "",
            Some(comment_id),
            now,
        )
        .await?;

        tx.commit().await.context("failed to commit transaction")?;

        tracing::info!(
            pending_id = %id,
            comment_id = %comment_id,
            reviewer_id = %reviewer_id,
            "pending comment approved"
        );

        Ok(Some(comment))
    }

    /// Reject the pending comment with a reason and remove it. No comment
    /// is created. Returns false when the row was already resolved.
    pub async fn reject(
        pool: &PgPool,
        id: Uuid,
        reviewer_id: Uuid,
        reason: &str,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let mut tx = pool.begin().await.context("failed to start transaction")?;

        let pending = sqlx::query_as::<_, PendingComment>(&format!(
            "DELETE FROM pending_comment WHERE id = $1 RETURNING {COLS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to claim pending comment")?;

        let Some(pending) = pending else {
            return Ok(false);
        };

        ModerationLog::record(&mut tx, &pending, "reject", reviewer_id, reason, None, now).await?;

        tx.commit().await.context("failed to commit transaction")?;

        tracing::info!(
            pending_id = %id,
            reviewer_id = %reviewer_id,
            "pending comment rejected"
        );

        Ok(true)
    }
}

impl ModerationLog {
    async fn record(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        pending: &PendingComment,
        action: &str,
        reviewer_id: Uuid,
        reason: &str,
        comment_id: Option<Uuid>,
        now: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO moderation_log (id, pending_id, post_id, action, reviewer_id, reason, comment_id, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(pending.id)
        .bind(pending.post_id)
        .bind(action)
        .bind(reviewer_id)
        .bind(reason)
        .bind(comment_id)
        .bind(now)
        .execute(&mut **tx)
        .await
        .context("failed to record moderation decision")?;

        Ok(())
    }

    /// List review decisions, newest first.
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>> {
        let entries = sqlx::query_as::<_, ModerationLog>(
            "SELECT id, pending_id, post_id, action, reviewer_id, reason, comment_id, created \
             FROM moderation_log ORDER BY created DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("failed to list moderation log")?;

        Ok(entries)
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_pending() -> PendingComment {
        PendingComment {
            id: Uuid::now_v7(),
            post_id: Uuid::now_v7(),
            author_id: None,
            author_name: "Visitor".to_string(),
            author_email: "visitor@example.com".to_string(),
            author_url: String::new(),
            parent_id: None,
            body: "First!".to_string(),
            ip_address: Some("203.0.113.9".to_string()),
            user_agent: "curl/8".to_string(),
            created: 1000,
        }
    }

    #[test]
    fn anonymous_submissions_keep_submitter_identity() {
        let pending = sample_pending();
        assert!(pending.is_anonymous());
        assert_eq!(pending.submitter_label(), "Visitor");
        assert_eq!(pending.author_email, "visitor@example.com");
    }

    #[test]
    fn authenticated_submissions_label_by_user_id() {
        let mut pending = sample_pending();
        let user = Uuid::now_v7();
        pending.author_id = Some(user);
        assert!(!pending.is_anonymous());
        assert_eq!(pending.submitter_label(), user.to_string());
    }

    #[test]
    fn nameless_anonymous_submissions_fall_back() {
        let mut pending = sample_pending();
        pending.author_name = String::new();
        assert_eq!(pending.submitter_label(), "anonymous");
    }

    #[test]
    fn create_input_defaults_anonymous_fields() {
        let input: CreatePendingComment = serde_json::from_value(serde_json::json!({
            "post_id": Uuid::nil(),
            "body": "hello",
        }))
        .unwrap();
        assert!(input.author_id.is_none());
        assert!(input.author_name.is_none());
        assert!(input.ip_address.is_none());
    }
}
