//! Taxonomy routes: categories (hierarchical) and tags (flat).
//!
//! Reads are public; writes are staff operations.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Category, CategoryWithDepth, CreateCategory, CreateTag, Tag, UpdateCategory, UpdateTag,
};
use crate::state::AppState;
use crate::viewer::Viewer;

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub ancestors: Vec<CategoryWithDepth>,
    pub post_count: i64,
}

#[derive(Debug, Serialize)]
pub struct TagDetail {
    #[serde(flatten)]
    pub tag: Tag,
    pub post_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListCategoriesQuery {
    /// Include inactive categories (staff only).
    pub all: Option<bool>,
}

// =============================================================================
// Category Handlers
// =============================================================================

/// List categories. Readers see active ones; staff may request all.
///
/// GET /api/categories
async fn list_categories(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<ListCategoriesQuery>,
) -> AppResult<Json<Vec<Category>>> {
    let categories = if query.all.unwrap_or(false) && viewer.is_staff() {
        Category::list(state.db()).await.map_err(AppError::Internal)?
    } else {
        Category::list_active(state.db())
            .await
            .map_err(AppError::Internal)?
    };

    Ok(Json(categories))
}

/// Create a category (staff).
///
/// POST /api/categories
async fn create_category(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(input): Json<CreateCategory>,
) -> AppResult<Json<Category>> {
    viewer.require_staff()?;

    if input.name.trim().is_empty() {
        return Err(AppError::Validation(
            "category name cannot be empty".to_string(),
        ));
    }

    let category = Category::create(state.db(), state.settings(), input)
        .await
        .map_err(|e| AppError::from_write(e, "category slug"))?;

    Ok(Json(category))
}

/// Category detail by slug, with its ancestor chain.
///
/// GET /api/category/{slug}
async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<CategoryDetail>> {
    let category = Category::find_by_slug(state.db(), &slug)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    let ancestors = Category::ancestors(state.db(), category.id)
        .await
        .map_err(AppError::Internal)?;
    let post_count = Category::post_count(state.db(), category.id)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(CategoryDetail {
        category,
        ancestors,
        post_count,
    }))
}

/// Subtree of a category.
///
/// GET /api/category/{slug}/descendants
async fn get_category_descendants(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Vec<CategoryWithDepth>>> {
    let category = Category::find_by_slug(state.db(), &slug)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    let descendants = Category::descendants(state.db(), category.id)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(descendants))
}

/// Update a category (staff).
///
/// PUT /api/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCategory>,
) -> AppResult<Json<Category>> {
    viewer.require_staff()?;

    let category = Category::update(state.db(), id, input)
        .await
        .map_err(|e| AppError::from_write(e, "category slug"))?
        .ok_or(AppError::NotFound)?;

    Ok(Json(category))
}

/// Delete a category (staff). Children and posts keep existing with their
/// references cleared.
///
/// DELETE /api/categories/{id}
async fn delete_category(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    viewer.require_staff()?;

    let deleted = Category::delete(state.db(), id)
        .await
        .map_err(AppError::Internal)?;
    if !deleted {
        return Err(AppError::NotFound);
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

// =============================================================================
// Tag Handlers
// =============================================================================

/// List all tags.
///
/// GET /api/tags
async fn list_tags(State(state): State<AppState>) -> AppResult<Json<Vec<Tag>>> {
    let tags = Tag::list(state.db()).await.map_err(AppError::Internal)?;
    Ok(Json(tags))
}

/// Create a tag (staff).
///
/// POST /api/tags
async fn create_tag(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(input): Json<CreateTag>,
) -> AppResult<Json<Tag>> {
    viewer.require_staff()?;

    if input.name.trim().is_empty() {
        return Err(AppError::Validation("tag name cannot be empty".to_string()));
    }

    let tag = Tag::create(state.db(), state.settings(), input)
        .await
        .map_err(|e| AppError::from_write(e, "tag"))?;

    Ok(Json(tag))
}

/// Tag detail by slug.
///
/// GET /api/tag/{slug}
async fn get_tag(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<TagDetail>> {
    let tag = Tag::find_by_slug(state.db(), &slug)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    let post_count = Tag::post_count(state.db(), tag.id)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(TagDetail { tag, post_count }))
}

/// Update a tag (staff).
///
/// PUT /api/tags/{id}
async fn update_tag(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTag>,
) -> AppResult<Json<Tag>> {
    viewer.require_staff()?;

    let tag = Tag::update(state.db(), id, input)
        .await
        .map_err(|e| AppError::from_write(e, "tag"))?
        .ok_or(AppError::NotFound)?;

    Ok(Json(tag))
}

/// Delete a tag (staff). Junction rows cascade; posts and media keep
/// existing.
///
/// DELETE /api/tags/{id}
async fn delete_tag(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    viewer.require_staff()?;

    let deleted = Tag::delete(state.db(), id)
        .await
        .map_err(AppError::Internal)?;
    if !deleted {
        return Err(AppError::NotFound);
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

// =============================================================================
// Router
// =============================================================================

/// Create the taxonomy router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list_categories))
        .route("/api/categories", post(create_category))
        .route("/api/category/{slug}", get(get_category))
        .route(
            "/api/category/{slug}/descendants",
            get(get_category_descendants),
        )
        .route("/api/categories/{id}", put(update_category))
        .route("/api/categories/{id}", delete(delete_category))
        .route("/api/tags", get(list_tags))
        .route("/api/tags", post(create_tag))
        .route("/api/tag/{slug}", get(get_tag))
        .route("/api/tags/{id}", put(update_tag))
        .route("/api/tags/{id}", delete(delete_tag))
}
