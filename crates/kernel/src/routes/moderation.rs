//! Staff moderation routes: the pending-comment review queue, live-comment
//! approval flips, the review audit log, and duplicate-content surfacing.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Comment, ModerationLog, PendingComment, Post};
use crate::routes::comment::CommentResponse;
use crate::routes::helpers::{PageQuery, paginate};
use crate::state::AppState;
use crate::viewer::Viewer;

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct PendingCommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub submitter: String,
    pub is_anonymous: bool,
    pub author_email: String,
    pub author_url: String,
    pub body: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub created: i64,
}

impl From<PendingComment> for PendingCommentResponse {
    fn from(pending: PendingComment) -> Self {
        let submitter = pending.submitter_label();
        let is_anonymous = pending.is_anonymous();
        Self {
            id: pending.id,
            post_id: pending.post_id,
            parent_id: pending.parent_id,
            submitter,
            is_anonymous,
            author_email: pending.author_email,
            author_url: pending.author_url,
            body: pending.body,
            ip_address: pending.ip_address,
            user_agent: pending.user_agent,
            created: pending.created,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PendingListResponse {
    pub pending: Vec<PendingCommentResponse>,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct DuplicateGroup {
    pub content_hash: String,
    pub post_ids: Vec<Uuid>,
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// The review queue, newest first.
///
/// GET /api/admin/pending-comments
async fn list_pending(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PendingListResponse>> {
    viewer.require_staff()?;

    let (limit, offset) = paginate(&query, 50);
    let pending = PendingComment::list(state.db(), limit, offset)
        .await
        .map_err(AppError::Internal)?;
    let total = PendingComment::count(state.db())
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(PendingListResponse {
        pending: pending
            .into_iter()
            .map(PendingCommentResponse::from)
            .collect(),
        total,
    }))
}

/// Approve a pending comment, materializing a live pre-approved comment.
///
/// Approving an already-resolved submission is a not-found, never a
/// double-create. Anonymous submissions cannot be approved into a comment
/// without a host account.
///
/// POST /api/admin/pending-comments/{id}/approve
async fn approve_pending(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CommentResponse>> {
    let reviewer_id = viewer.require_staff()?;

    // Pending rows never mutate, so this pre-check cannot race with the
    // atomic claim below; it only turns the anonymous case into a clean
    // validation error instead of an internal one.
    let pending = PendingComment::find_by_id(state.db(), id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;
    if pending.is_anonymous() {
        return Err(AppError::Validation(
            "anonymous submissions cannot become comments without a host account".to_string(),
        ));
    }

    let comment = PendingComment::approve(state.db(), id, reviewer_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    Ok(Json(CommentResponse::from(comment)))
}

/// Reject a pending comment with an optional reason.
///
/// POST /api/admin/pending-comments/{id}/reject
async fn reject_pending(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let reviewer_id = viewer.require_staff()?;

    let reason = request.reason.unwrap_or_default();
    let rejected = PendingComment::reject(state.db(), id, reviewer_id, &reason)
        .await
        .map_err(AppError::Internal)?;
    if !rejected {
        return Err(AppError::NotFound);
    }

    Ok(Json(serde_json::json!({ "rejected": true })))
}

/// Approve a live comment (flips the approval flag).
///
/// POST /api/admin/comments/{id}/approve
async fn approve_comment(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CommentResponse>> {
    viewer.require_staff()?;

    let comment = Comment::approve(state.db(), id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    Ok(Json(CommentResponse::from(comment)))
}

/// Unapprove a live comment. The row is kept, just hidden.
///
/// POST /api/admin/comments/{id}/reject
async fn reject_comment(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CommentResponse>> {
    viewer.require_staff()?;

    let comment = Comment::reject(state.db(), id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    Ok(Json(CommentResponse::from(comment)))
}

/// All comments, for the moderation overview.
///
/// GET /api/admin/comments
async fn list_comments(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Vec<CommentResponse>>> {
    viewer.require_staff()?;

    let (limit, offset) = paginate(&query, 50);
    let comments = Comment::list_all(state.db(), limit, offset)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(
        comments.into_iter().map(CommentResponse::from).collect(),
    ))
}

/// Review decisions, newest first.
///
/// GET /api/admin/moderation-log
async fn moderation_log(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Vec<ModerationLog>>> {
    viewer.require_staff()?;

    let (limit, offset) = paginate(&query, 50);
    let entries = ModerationLog::list(state.db(), limit, offset)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(entries))
}

/// Groups of posts sharing a content hash (duplicate-content surfacing).
///
/// GET /api/admin/duplicate-posts
async fn duplicate_posts(
    State(state): State<AppState>,
    viewer: Viewer,
) -> AppResult<Json<Vec<DuplicateGroup>>> {
    viewer.require_staff()?;

    let groups = Post::duplicate_groups(state.db())
        .await
        .map_err(AppError::Internal)?
        .into_iter()
        .map(|(content_hash, post_ids)| DuplicateGroup {
            content_hash,
            post_ids,
        })
        .collect();

    Ok(Json(groups))
}

// =============================================================================
// Router
// =============================================================================

/// Create the moderation router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/pending-comments", get(list_pending))
        .route("/api/admin/pending-comments/{id}/approve", post(approve_pending))
        .route("/api/admin/pending-comments/{id}/reject", post(reject_pending))
        .route("/api/admin/comments", get(list_comments))
        .route("/api/admin/comments/{id}/approve", post(approve_comment))
        .route("/api/admin/comments/{id}/reject", post(reject_comment))
        .route("/api/admin/moderation-log", get(moderation_log))
        .route("/api/admin/duplicate-posts", get(duplicate_posts))
}
