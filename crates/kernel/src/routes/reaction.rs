//! Reaction routes: toggling and counts.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Post, Reaction, ToggleOutcome};
use crate::routes::helpers::require_visible;
use crate::state::AppState;
use crate::viewer::Viewer;

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    /// Defaults to the first configured kind (conventionally LIKE).
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub outcome: ToggleOutcome,
    /// The viewer's reaction after the toggle (absent when removed).
    pub kind: Option<String>,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct ReactionSummary {
    pub counts: Vec<KindCount>,
    pub total: i64,
    /// The viewer's own reaction, if any.
    pub viewer_kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct KindCount {
    pub kind: String,
    pub count: i64,
}

// =============================================================================
// Handlers
// =============================================================================

/// Toggle the viewer's reaction on a post.
///
/// Same kind removes, different kind changes, no reaction creates.
///
/// POST /api/post/{id}/reactions
async fn toggle_reaction(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(post_id): Path<Uuid>,
    Json(request): Json<ToggleRequest>,
) -> AppResult<Json<ToggleResponse>> {
    let user_id = viewer.require_user()?;

    let post = Post::find_by_id(state.db(), post_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;
    let post = require_visible(state.db(), post, &viewer).await?;

    let kind = match request.kind {
        Some(kind) => kind,
        None => state
            .settings()
            .reaction_kinds()?
            .first()
            .map(|r| r.kind.clone())
            .ok_or_else(|| AppError::Configuration("no reaction kinds configured".to_string()))?,
    };

    if !state.settings().is_valid_reaction_kind(&kind)? {
        return Err(AppError::Validation(format!(
            "unknown reaction kind: {kind}"
        )));
    }

    let (reaction, outcome) = Reaction::toggle(state.db(), post.id, user_id, &kind)
        .await
        .map_err(|e| AppError::from_write(e, "reaction"))?;

    let total = Reaction::count_for_post(state.db(), post.id)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(ToggleResponse {
        outcome,
        kind: reaction.map(|r| r.kind),
        total,
    }))
}

/// Reaction counts on a post, with the viewer's own reaction when
/// authenticated.
///
/// GET /api/post/{id}/reactions
async fn list_reactions(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(post_id): Path<Uuid>,
) -> AppResult<Json<ReactionSummary>> {
    let post = Post::find_by_id(state.db(), post_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;
    let post = require_visible(state.db(), post, &viewer).await?;

    let counts: Vec<KindCount> = Reaction::counts_by_kind(state.db(), post.id)
        .await
        .map_err(AppError::Internal)?
        .into_iter()
        .map(|(kind, count)| KindCount { kind, count })
        .collect();
    let total = counts.iter().map(|c| c.count).sum();

    let viewer_kind = match viewer.user_id() {
        Some(user_id) => Reaction::for_user(state.db(), post.id, user_id)
            .await
            .map_err(AppError::Internal)?
            .map(|r| r.kind),
        None => None,
    };

    Ok(Json(ReactionSummary {
        counts,
        total,
        viewer_kind,
    }))
}

// =============================================================================
// Router
// =============================================================================

/// Create the reaction router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/post/{id}/reactions", post(toggle_reaction))
        .route("/api/post/{id}/reactions", get(list_reactions))
}
