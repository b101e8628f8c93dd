//! Static page routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{CreatePage, Page, UpdatePage};
use crate::render::markdown_to_html;
use crate::state::AppState;
use crate::viewer::Viewer;

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub body_html: String,
    pub author_id: Uuid,
    pub is_published: bool,
    pub show_in_nav: bool,
    pub nav_weight: i32,
    pub created: i64,
    pub changed: i64,
}

impl From<Page> for PageResponse {
    fn from(page: Page) -> Self {
        let body_html = markdown_to_html(&page.body);
        Self {
            id: page.id,
            title: page.title,
            slug: page.slug,
            body: page.body,
            body_html,
            author_id: page.author_id,
            is_published: page.is_published,
            show_in_nav: page.show_in_nav,
            nav_weight: page.nav_weight,
            created: page.created,
            changed: page.changed,
        }
    }
}

/// Compact shape for navigation menus.
#[derive(Debug, Serialize)]
pub struct NavEntry {
    pub title: String,
    pub slug: String,
    pub nav_weight: i32,
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreatePageRequest {
    pub title: String,
    pub slug: Option<String>,
    pub body: String,
    pub is_published: Option<bool>,
    pub show_in_nav: Option<bool>,
    pub nav_weight: Option<i32>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List published pages.
///
/// GET /api/pages
async fn list_pages(State(state): State<AppState>) -> AppResult<Json<Vec<PageResponse>>> {
    let pages = Page::list_published(state.db())
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(pages.into_iter().map(PageResponse::from).collect()))
}

/// Navigation menu entries.
///
/// GET /api/pages/nav
async fn list_nav(State(state): State<AppState>) -> AppResult<Json<Vec<NavEntry>>> {
    let pages = Page::list_nav(state.db()).await.map_err(AppError::Internal)?;

    Ok(Json(
        pages
            .into_iter()
            .map(|p| NavEntry {
                title: p.title,
                slug: p.slug,
                nav_weight: p.nav_weight,
            })
            .collect(),
    ))
}

/// Fetch a page by slug. Unpublished pages are visible only to their
/// author and staff, indistinguishable from missing otherwise.
///
/// GET /api/page/{slug}
async fn get_page(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
) -> AppResult<Json<PageResponse>> {
    let page = Page::find_by_slug(state.db(), &slug)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    if !page.is_published && !viewer.is(page.author_id) && !viewer.is_staff() {
        return Err(AppError::NotFound);
    }

    Ok(Json(PageResponse::from(page)))
}

/// Create a page (staff).
///
/// POST /api/pages
async fn create_page(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(request): Json<CreatePageRequest>,
) -> AppResult<Json<PageResponse>> {
    let author_id = viewer.require_staff()?;

    if request.title.trim().is_empty() {
        return Err(AppError::Validation("page title cannot be empty".to_string()));
    }
    if request.body.trim().is_empty() {
        return Err(AppError::Validation("page body cannot be empty".to_string()));
    }

    let input = CreatePage {
        title: request.title,
        slug: request.slug,
        body: request.body,
        author_id,
        is_published: request.is_published,
        show_in_nav: request.show_in_nav,
        nav_weight: request.nav_weight,
    };

    let page = Page::create(state.db(), state.settings(), input)
        .await
        .map_err(|e| AppError::from_write(e, "page slug"))?;

    Ok(Json(PageResponse::from(page)))
}

/// Update a page (staff).
///
/// PUT /api/pages/{id}
async fn update_page(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePage>,
) -> AppResult<Json<PageResponse>> {
    viewer.require_staff()?;

    if let Some(body) = &input.body
        && body.trim().is_empty()
    {
        return Err(AppError::Validation("page body cannot be empty".to_string()));
    }

    let page = Page::update(state.db(), id, input)
        .await
        .map_err(|e| AppError::from_write(e, "page slug"))?
        .ok_or(AppError::NotFound)?;

    Ok(Json(PageResponse::from(page)))
}

/// Delete a page (staff).
///
/// DELETE /api/pages/{id}
async fn delete_page(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    viewer.require_staff()?;

    let deleted = Page::delete(state.db(), id)
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

/// Create the page router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pages", get(list_pages))
        .route("/api/pages", post(create_page))
        .route("/api/pages/nav", get(list_nav))
        .route("/api/page/{slug}", get(get_page))
        .route("/api/pages/{id}", put(update_page))
        .route("/api/pages/{id}", delete(delete_page))
}
