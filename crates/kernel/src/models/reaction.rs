//! Per-user, per-post reactions.
//!
//! A (post, user) pair holds at most one reaction at any time, enforced by
//! a unique constraint. Toggling is the only write path.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A reaction.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reaction {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Post reacted to.
    pub post_id: Uuid,

    /// Reacting user.
    pub user_id: Uuid,

    /// Reaction kind (one of the configured kinds, e.g. "LIKE").
    pub kind: String,

    /// Unix timestamp when created.
    pub created: i64,
}

/// What a toggle call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleOutcome {
    Created,
    Removed,
    Changed,
}

const COLS: &str = "id, post_id, user_id, kind, created";

impl Reaction {
    /// Toggle a reaction on a post.
    ///
    /// Three-way transition on the unique (post, user) pair: no reaction →
    /// create; same kind → remove; different kind → change in place. Runs
    /// in a transaction with the existing row locked, so concurrent toggles
    /// serialize; a racing duplicate insert still trips the unique
    /// constraint and surfaces to the caller rather than being swallowed.
    pub async fn toggle(
        pool: &PgPool,
        post_id: Uuid,
        user_id: Uuid,
        kind: &str,
    ) -> Result<(Option<Self>, ToggleOutcome)> {
        let mut tx = pool.begin().await.context("failed to start transaction")?;

        let existing = sqlx::query_as::<_, Reaction>(&format!(
            "SELECT {COLS} FROM reaction WHERE post_id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to fetch existing reaction")?;

        let result = match existing {
            None => {
                let reaction = sqlx::query_as::<_, Reaction>(&format!(
                    "INSERT INTO reaction (id, post_id, user_id, kind, created) \
                     VALUES ($1, $2, $3, $4, $5) RETURNING {COLS}"
                ))
                .bind(Uuid::now_v7())
                .bind(post_id)
                .bind(user_id)
                .bind(kind)
                .bind(chrono::Utc::now().timestamp())
                .fetch_one(&mut *tx)
                .await
                .context("failed to create reaction")?;

                (Some(reaction), ToggleOutcome::Created)
            }
            Some(reaction) if reaction.kind == kind => {
                sqlx::query("DELETE FROM reaction WHERE id = $1")
                    .bind(reaction.id)
                    .execute(&mut *tx)
                    .await
                    .context("failed to remove reaction")?;

                (None, ToggleOutcome::Removed)
            }
            Some(reaction) => {
                let updated = sqlx::query_as::<_, Reaction>(&format!(
                    "UPDATE reaction SET kind = $1 WHERE id = $2 RETURNING {COLS}"
                ))
                .bind(kind)
                .bind(reaction.id)
                .fetch_one(&mut *tx)
                .await
                .context("failed to change reaction")?;

                (Some(updated), ToggleOutcome::Changed)
            }
        };

        tx.commit().await.context("failed to commit transaction")?;

        Ok(result)
    }

    /// The viewer's reaction on a post, if any.
    pub async fn for_user(pool: &PgPool, post_id: Uuid, user_id: Uuid) -> Result<Option<Self>> {
        let reaction = sqlx::query_as::<_, Reaction>(&format!(
            "SELECT {COLS} FROM reaction WHERE post_id = $1 AND user_id = $2"
        ))
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch reaction")?;

        Ok(reaction)
    }

    /// Total reactions on a post.
    pub async fn count_for_post(pool: &PgPool, post_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reaction WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(pool)
            .await
            .context("failed to count reactions")?;

        Ok(count)
    }

    /// Reaction counts per kind on a post, largest first.
    pub async fn counts_by_kind(pool: &PgPool, post_id: Uuid) -> Result<Vec<(String, i64)>> {
        let counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT kind, COUNT(*) FROM reaction WHERE post_id = $1 \
             GROUP BY kind ORDER BY COUNT(*) DESC, kind",
        )
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("failed to count reactions by kind")?;

        Ok(counts)
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn toggle_outcome_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ToggleOutcome::Created).unwrap(),
            r#""created""#
        );
        assert_eq!(
            serde_json::to_string(&ToggleOutcome::Removed).unwrap(),
            r#""removed""#
        );
        assert_eq!(
            serde_json::to_string(&ToggleOutcome::Changed).unwrap(),
            r#""changed""#
        );
    }

    #[test]
    fn reaction_serialization_round_trips() {
        let reaction = Reaction {
            id: Uuid::nil(),
            post_id: Uuid::nil(),
            user_id: Uuid::nil(),
            kind: "LOVE".to_string(),
            created: 1000,
        };

        let json = serde_json::to_string(&reaction).unwrap();
        let parsed: Reaction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.kind, "LOVE");
    }
}
