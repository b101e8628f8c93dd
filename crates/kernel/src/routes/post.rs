//! Post routes: feed listing, detail views, authoring, lifecycle.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Comment, CreatePost, Post, PostMedia, Reaction, Tag, UpdatePost, Visibility,
};
use crate::render::markdown_to_html;
use crate::routes::helpers::{PageQuery, paginate, require_visible};
use crate::routes::media::AttachmentResponse;
use crate::state::AppState;
use crate::viewer::Viewer;

// =============================================================================
// Response Types
// =============================================================================

/// Compact post shape for feed listings.
#[derive(Debug, Serialize)]
pub struct PostSummary {
    pub id: Uuid,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub preview: String,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub visibility: Visibility,
    pub is_pinned: bool,
    pub is_archived: bool,
    pub published_at: Option<i64>,
    pub view_count: i64,
    pub created: i64,
}

impl From<Post> for PostSummary {
    fn from(post: Post) -> Self {
        let preview = post.preview();
        Self {
            id: post.id,
            title: post.title,
            slug: post.slug,
            preview,
            author_id: post.author_id,
            category_id: post.category_id,
            visibility: post.visibility,
            is_pinned: post.is_pinned,
            is_archived: post.is_archived,
            published_at: post.published_at,
            view_count: post.view_count,
            created: post.created,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<PostSummary>,
    pub page: i64,
    pub per_page: i64,
}

/// Full post shape for detail views.
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub body: String,
    pub body_html: String,
    pub excerpt: Option<String>,
    pub location: Option<String>,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub visibility: Visibility,
    pub is_draft: bool,
    pub is_pinned: bool,
    pub is_archived: bool,
    pub allow_comments: bool,
    pub scheduled_at: Option<i64>,
    pub published_at: Option<i64>,
    pub view_count: i64,
    pub created: i64,
    pub changed: i64,
    pub tags: Vec<Tag>,
    pub media: Vec<AttachmentResponse>,
    pub reaction_counts: Vec<ReactionCount>,
    pub comment_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ReactionCount {
    pub kind: String,
    pub count: i64,
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Filter by category slug.
    pub category: Option<String>,
    /// Filter by tag slug.
    pub tag: Option<String>,
    /// Filter by author id.
    pub author: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub body: String,
    pub excerpt: Option<String>,
    pub location: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
    pub visibility: Option<Visibility>,
    pub is_draft: Option<bool>,
    pub allow_comments: Option<bool>,
    pub scheduled_at: Option<i64>,
    #[serde(default)]
    pub allowed_user_ids: Vec<Uuid>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List posts visible to the viewer.
///
/// GET /api/posts
async fn list_posts(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<ListPostsQuery>,
) -> AppResult<Json<PostListResponse>> {
    let default_per_page = state.settings().posts_per_page()?;
    let page_query = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let (limit, offset) = paginate(&page_query, default_per_page);
    let page = query.page.unwrap_or(1).max(1);

    let posts = if let Some(category_slug) = &query.category {
        let category = crate::models::Category::find_by_slug(state.db(), category_slug)
            .await
            .map_err(AppError::Internal)?
            .ok_or(AppError::NotFound)?;
        Post::list_visible_in_category(state.db(), &viewer, category.id, limit, offset)
            .await
            .map_err(AppError::Internal)?
    } else if let Some(tag_slug) = &query.tag {
        let tag = Tag::find_by_slug(state.db(), tag_slug)
            .await
            .map_err(AppError::Internal)?
            .ok_or(AppError::NotFound)?;
        Post::list_visible_with_tag(state.db(), &viewer, tag.id, limit, offset)
            .await
            .map_err(AppError::Internal)?
    } else if let Some(author_id) = query.author {
        Post::list_visible_by_author(state.db(), &viewer, author_id, limit, offset)
            .await
            .map_err(AppError::Internal)?
    } else {
        Post::list_visible(state.db(), &viewer, limit, offset)
            .await
            .map_err(AppError::Internal)?
    };

    Ok(Json(PostListResponse {
        posts: posts.into_iter().map(PostSummary::from).collect(),
        page,
        per_page: limit,
    }))
}

/// Create a post.
///
/// POST /api/posts
async fn create_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(request): Json<CreatePostRequest>,
) -> AppResult<Json<PostResponse>> {
    let author_id = viewer.require_user()?;

    if request.body.trim().is_empty() {
        return Err(AppError::Validation("post body cannot be empty".to_string()));
    }

    if request.scheduled_at.is_some() && !state.settings().allow_scheduled_posts()? {
        return Err(AppError::Validation(
            "scheduled posts are disabled".to_string(),
        ));
    }

    let input = CreatePost {
        author_id,
        title: request.title,
        body: request.body,
        excerpt: request.excerpt,
        location: request.location,
        category_id: request.category_id,
        tag_ids: request.tag_ids,
        visibility: request.visibility,
        is_draft: request.is_draft,
        allow_comments: request.allow_comments,
        scheduled_at: request.scheduled_at,
        allowed_user_ids: request.allowed_user_ids,
    };

    let post = Post::create(state.db(), state.settings(), input)
        .await
        .map_err(|e| AppError::from_write(e, "post slug"))?;

    post_response(&state, post).await.map(Json)
}

/// Fetch a post by id.
///
/// GET /api/post/{id}
async fn get_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PostResponse>> {
    let post = Post::find_by_id(state.db(), id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    serve_post(&state, &viewer, post).await
}

/// Fetch a post by slug.
///
/// GET /api/post/slug/{slug}
async fn get_post_by_slug(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
) -> AppResult<Json<PostResponse>> {
    let post = Post::find_by_slug(state.db(), &slug)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    serve_post(&state, &viewer, post).await
}

async fn serve_post(
    state: &AppState,
    viewer: &Viewer,
    post: Post,
) -> AppResult<Json<PostResponse>> {
    let post = require_visible(state.db(), post, viewer).await?;

    Post::increment_view_count(state.db(), post.id)
        .await
        .map_err(AppError::Internal)?;

    post_response(state, post).await.map(Json)
}

/// Update a post (author only).
///
/// PUT /api/post/{id}
async fn update_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePost>,
) -> AppResult<Json<PostResponse>> {
    viewer.require_user()?;

    let post = Post::find_by_id(state.db(), id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    let post = require_visible(state.db(), post, &viewer).await?;
    if !viewer.is(post.author_id) {
        return Err(AppError::Permission(
            "you can only edit your own posts".to_string(),
        ));
    }

    if let Some(body) = &input.body
        && body.trim().is_empty()
    {
        return Err(AppError::Validation("post body cannot be empty".to_string()));
    }

    if matches!(input.scheduled_at, Some(Some(_))) && !state.settings().allow_scheduled_posts()? {
        return Err(AppError::Validation(
            "scheduled posts are disabled".to_string(),
        ));
    }

    let updated = Post::update(state.db(), state.settings(), id, input)
        .await
        .map_err(|e| AppError::from_write(e, "post slug"))?
        .ok_or(AppError::NotFound)?;

    post_response(&state, updated).await.map(Json)
}

/// Publish a post (author only). Repeat calls keep the original
/// publication timestamp.
///
/// POST /api/post/{id}/publish
async fn publish_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PostResponse>> {
    let post = owned_post(&state, &viewer, id).await?;
    let published = Post::publish(state.db(), post.id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    post_response(&state, published).await.map(Json)
}

/// Archive a post (author only). Orthogonal to publication.
///
/// POST /api/post/{id}/archive
async fn archive_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PostResponse>> {
    let post = owned_post(&state, &viewer, id).await?;
    let archived = Post::archive(state.db(), post.id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    post_response(&state, archived).await.map(Json)
}

/// Soft-delete a post (author only).
///
/// DELETE /api/post/{id}
async fn delete_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let post = owned_post(&state, &viewer, id).await?;
    Post::soft_delete(state.db(), post.id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Load a post and require the viewer to be its author.
async fn owned_post(state: &AppState, viewer: &Viewer, id: Uuid) -> Result<Post, AppError> {
    viewer.require_user()?;

    let post = Post::find_by_id(state.db(), id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    let post = require_visible(state.db(), post, viewer).await?;
    if !viewer.is(post.author_id) {
        return Err(AppError::Permission(
            "you can only manage your own posts".to_string(),
        ));
    }

    Ok(post)
}

/// Assemble the detail response: rendered body, tags, attachments,
/// reaction counts, comment count.
async fn post_response(state: &AppState, post: Post) -> Result<PostResponse, AppError> {
    let tags = Tag::list_for_post(state.db(), post.id)
        .await
        .map_err(AppError::Internal)?;

    let attachments = PostMedia::list_for_post(state.db(), post.id)
        .await
        .map_err(AppError::Internal)?;
    let media = attachments
        .into_iter()
        .map(|attached| AttachmentResponse::build(state.media(), attached))
        .collect();

    let reaction_counts = Reaction::counts_by_kind(state.db(), post.id)
        .await
        .map_err(AppError::Internal)?
        .into_iter()
        .map(|(kind, count)| ReactionCount { kind, count })
        .collect();

    let comment_count = Comment::count_for_post(state.db(), post.id)
        .await
        .map_err(AppError::Internal)?;

    let body_html = markdown_to_html(&post.body);

    Ok(PostResponse {
        id: post.id,
        title: post.title,
        slug: post.slug,
        body: post.body,
        body_html,
        excerpt: post.excerpt,
        location: post.location,
        author_id: post.author_id,
        category_id: post.category_id,
        visibility: post.visibility,
        is_draft: post.is_draft,
        is_pinned: post.is_pinned,
        is_archived: post.is_archived,
        allow_comments: post.allow_comments,
        scheduled_at: post.scheduled_at,
        published_at: post.published_at,
        view_count: post.view_count,
        created: post.created,
        changed: post.changed,
        tags,
        media,
        reaction_counts,
        comment_count,
    })
}

// =============================================================================
// Router
// =============================================================================

/// Create the post router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts))
        .route("/api/posts", post(create_post))
        .route("/api/post/{id}", get(get_post))
        .route("/api/post/{id}", put(update_post))
        .route("/api/post/{id}", delete(delete_post))
        .route("/api/post/slug/{slug}", get(get_post_by_slug))
        .route("/api/post/{id}/publish", post(publish_post))
        .route("/api/post/{id}/archive", post(archive_post))
}
