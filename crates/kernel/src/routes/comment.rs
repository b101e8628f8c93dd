//! Comment routes: threaded listing, submission through the moderation
//! pipeline, editing with history, soft deletion.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Comment, CommentHistory, CreateComment, CreatePendingComment, PendingComment, Post};
use crate::render::markdown_to_html;
use crate::routes::helpers::{client_ip, require_visible, user_agent};
use crate::state::AppState;
use crate::viewer::Viewer;

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub body: String,
    pub body_html: String,
    pub is_approved: bool,
    pub is_edited: bool,
    pub edit_count: i32,
    pub created: i64,
    pub changed: i64,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        let body_html = markdown_to_html(&comment.body);
        Self {
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            author_id: comment.author_id,
            body: comment.body,
            body_html,
            is_approved: comment.is_approved,
            is_edited: comment.is_edited,
            edit_count: comment.edit_count,
            created: comment.created,
            changed: comment.changed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentResponse>,
    pub total: i64,
}

/// Response for a submission that was staged for moderation.
#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub status: &'static str,
    pub pending_id: Uuid,
}

/// Either a live comment or a staged submission.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SubmissionResponse {
    Live(CommentResponse),
    Pending(PendingResponse),
}

/// A comment with its position in the thread.
#[derive(Debug, Serialize)]
pub struct CommentDetailResponse {
    #[serde(flatten)]
    pub comment: CommentResponse,
    pub depth: i32,
    pub replies: Vec<CommentResponse>,
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub body: String,
    pub parent_id: Option<Uuid>,
    /// Anonymous submitter identity (required name when unauthenticated).
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub author_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditCommentRequest {
    pub body: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// List approved comments for a post in threaded order.
///
/// GET /api/post/{id}/comments
async fn list_post_comments(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(post_id): Path<Uuid>,
) -> AppResult<Json<CommentListResponse>> {
    let post = Post::find_by_id(state.db(), post_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;
    let post = require_visible(state.db(), post, &viewer).await?;

    let comments = Comment::list_for_post(state.db(), post.id)
        .await
        .map_err(AppError::Internal)?;
    let total = comments.len() as i64;

    Ok(Json(CommentListResponse {
        comments: comments.into_iter().map(CommentResponse::from).collect(),
        total,
    }))
}

/// Submit a comment on a post.
///
/// Routed through the moderation pipeline: anonymous submissions (allowed
/// only when the host permits them) and authenticated submissions under
/// moderation are staged as pending; everything else becomes a live
/// comment immediately.
///
/// POST /api/post/{id}/comments
async fn create_comment(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(post_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<CreateCommentRequest>,
) -> AppResult<Json<SubmissionResponse>> {
    let post = Post::find_by_id(state.db(), post_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;
    let post = require_visible(state.db(), post, &viewer).await?;

    if !post.allow_comments {
        return Err(AppError::Permission(
            "commenting is disabled on this post".to_string(),
        ));
    }

    let body = request.body.trim().to_string();
    if body.is_empty() {
        return Err(AppError::Validation(
            "comment body cannot be empty".to_string(),
        ));
    }
    let max_length = state.settings().comment_max_length()?;
    if body.chars().count() > max_length {
        return Err(AppError::Validation(format!(
            "comment body exceeds {max_length} characters"
        )));
    }

    // Replies must target a live comment on the same post.
    if let Some(parent_id) = request.parent_id {
        let parent = Comment::find_by_id(state.db(), parent_id)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| AppError::Validation("parent comment not found".to_string()))?;
        if parent.post_id != post.id {
            return Err(AppError::Validation(
                "parent comment is on a different post".to_string(),
            ));
        }
        if parent.is_deleted {
            return Err(AppError::Validation(
                "parent comment was deleted".to_string(),
            ));
        }
    }

    let moderate = state.settings().moderate_comments()?;

    match viewer.user_id() {
        None => {
            if !state.settings().allow_anonymous_comments()? {
                return Err(AppError::Unauthorized);
            }
            let author_name = request.author_name.unwrap_or_default();
            if author_name.trim().is_empty() {
                return Err(AppError::Validation(
                    "anonymous comments require a name".to_string(),
                ));
            }

            // Anonymous submissions always await review.
            let pending = PendingComment::create(
                state.db(),
                CreatePendingComment {
                    post_id: post.id,
                    author_id: None,
                    author_name: Some(author_name),
                    author_email: request.author_email,
                    author_url: request.author_url,
                    parent_id: request.parent_id,
                    body,
                    ip_address: client_ip(&headers),
                    user_agent: user_agent(&headers),
                },
            )
            .await
            .map_err(AppError::Internal)?;

            Ok(Json(SubmissionResponse::Pending(PendingResponse {
                status: "pending",
                pending_id: pending.id,
            })))
        }
        Some(author_id) if moderate => {
            let pending = PendingComment::create(
                state.db(),
                CreatePendingComment {
                    post_id: post.id,
                    author_id: Some(author_id),
                    author_name: None,
                    author_email: None,
                    author_url: None,
                    parent_id: request.parent_id,
                    body,
                    ip_address: client_ip(&headers),
                    user_agent: user_agent(&headers),
                },
            )
            .await
            .map_err(AppError::Internal)?;

            Ok(Json(SubmissionResponse::Pending(PendingResponse {
                status: "pending",
                pending_id: pending.id,
            })))
        }
        Some(author_id) => {
            let comment = Comment::create(
                state.db(),
                CreateComment {
                    post_id: post.id,
                    author_id,
                    parent_id: request.parent_id,
                    body,
                    // Approval defaults to the inverse of the moderation
                    // setting at creation time.
                    is_approved: !moderate,
                },
            )
            .await
            .map_err(AppError::Internal)?;

            Ok(Json(SubmissionResponse::Live(CommentResponse::from(
                comment,
            ))))
        }
    }
}

/// Fetch a single comment with its nesting depth and direct replies.
///
/// GET /api/comment/{id}
async fn get_comment(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CommentDetailResponse>> {
    let comment = Comment::find_by_id(state.db(), id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    if comment.is_deleted || !comment.is_approved {
        return Err(AppError::NotFound);
    }

    // The comment is only as visible as the post it hangs off.
    let post = Post::find_by_id(state.db(), comment.post_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;
    require_visible(state.db(), post, &viewer).await?;

    let depth = Comment::thread_depth(state.db(), id)
        .await
        .map_err(AppError::Internal)?;
    let replies = Comment::replies(state.db(), id)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(CommentDetailResponse {
        comment: CommentResponse::from(comment),
        depth,
        replies: replies.into_iter().map(CommentResponse::from).collect(),
    }))
}

/// Edit a comment (author only). The previous body is snapshotted into
/// the edit history.
///
/// PUT /api/comment/{id}
async fn edit_comment(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
    Json(request): Json<EditCommentRequest>,
) -> AppResult<Json<CommentResponse>> {
    let user_id = viewer.require_user()?;

    let existing = Comment::find_by_id(state.db(), id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    if existing.is_deleted {
        return Err(AppError::NotFound);
    }
    if existing.author_id != user_id {
        return Err(AppError::Permission(
            "you can only edit your own comments".to_string(),
        ));
    }

    let body = request.body.trim().to_string();
    if body.is_empty() {
        return Err(AppError::Validation(
            "comment body cannot be empty".to_string(),
        ));
    }
    let max_length = state.settings().comment_max_length()?;
    if body.chars().count() > max_length {
        return Err(AppError::Validation(format!(
            "comment body exceeds {max_length} characters"
        )));
    }

    let comment = Comment::edit(state.db(), id, &body)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    Ok(Json(CommentResponse::from(comment)))
}

/// Soft-delete a comment (author or staff).
///
/// DELETE /api/comment/{id}
async fn delete_comment(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = viewer.require_user()?;

    let existing = Comment::find_by_id(state.db(), id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    if existing.author_id != user_id && !viewer.is_staff() {
        return Err(AppError::Permission(
            "you can only delete your own comments".to_string(),
        ));
    }

    Comment::soft_delete(state.db(), id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Edit history of a comment (author or staff), newest first.
///
/// GET /api/comment/{id}/history
async fn comment_history(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<CommentHistory>>> {
    let user_id = viewer.require_user()?;

    let comment = Comment::find_by_id(state.db(), id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    if comment.author_id != user_id && !viewer.is_staff() {
        return Err(AppError::Permission(
            "comment history is restricted to its author".to_string(),
        ));
    }

    let history = Comment::history(state.db(), id)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(history))
}

// =============================================================================
// Router
// =============================================================================

/// Create the comment router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/post/{id}/comments", get(list_post_comments))
        .route("/api/post/{id}/comments", post(create_comment))
        .route("/api/comment/{id}", get(get_comment))
        .route("/api/comment/{id}", put(edit_comment))
        .route("/api/comment/{id}", delete(delete_comment))
        .route("/api/comment/{id}/history", get(comment_history))
}
