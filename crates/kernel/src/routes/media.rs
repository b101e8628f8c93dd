//! Media routes: upload (content-addressed), library browsing, and
//! attaching library items to posts.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::media::MediaService;
use crate::models::{AttachedMedia, CreateAttachment, MediaItem, MediaKind, Post, PostMedia};
use crate::routes::helpers::{PageQuery, paginate, require_visible};
use crate::state::AppState;
use crate::viewer::Viewer;

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct MediaResponse {
    pub id: Uuid,
    pub url: String,
    pub kind: MediaKind,
    pub original_filename: String,
    pub file_size: i64,
    pub human_file_size: String,
    pub mime_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub orientation: &'static str,
    pub camera_make: String,
    pub camera_model: String,
    pub iso: Option<i32>,
    pub has_location: bool,
    pub capture_date: Option<i64>,
    pub alt_text: String,
    pub caption: String,
    pub uploaded_by: Option<Uuid>,
    pub created: i64,
}

impl MediaResponse {
    fn build(media: &MediaService, item: MediaItem) -> Self {
        let url = media.public_url(&item);
        let human_file_size = item.human_file_size();
        let orientation = item.orientation();
        let has_location = item.has_location();
        Self {
            id: item.id,
            url,
            kind: item.kind,
            original_filename: item.original_filename,
            file_size: item.file_size,
            human_file_size,
            mime_type: item.mime_type,
            width: item.width,
            height: item.height,
            orientation,
            camera_make: item.camera_make,
            camera_model: item.camera_model,
            iso: item.iso,
            has_location,
            capture_date: item.capture_date,
            alt_text: item.alt_text,
            caption: item.caption,
            uploaded_by: item.uploaded_by,
            created: item.created,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// False when the upload deduplicated onto an existing item.
    pub created: bool,
    #[serde(flatten)]
    pub item: MediaResponse,
}

#[derive(Debug, Serialize)]
pub struct MediaListResponse {
    pub items: Vec<MediaResponse>,
    pub total: i64,
}

/// A post attachment with its effective (override-resolved) metadata.
#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    pub media_id: Uuid,
    pub url: String,
    pub kind: MediaKind,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub weight: i32,
    pub alt_text: String,
    pub caption: String,
}

impl AttachmentResponse {
    pub fn build(media: &MediaService, attached: AttachedMedia) -> Self {
        let alt_text = attached.effective_alt_text();
        let caption = attached.effective_caption();
        Self {
            media_id: attached.item.id,
            url: media.public_url(&attached.item),
            kind: attached.item.kind,
            width: attached.item.width,
            height: attached.item.height,
            weight: attached.attachment.weight,
            alt_text,
            caption,
        }
    }
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AiMetadataRequest {
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    pub ai_tags: Option<serde_json::Value>,
    pub ai_description: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Upload a file into the media library.
///
/// Expects a multipart form with a `file` part. Identical bytes resolve to
/// the existing item (`created: false`) no matter the filename.
///
/// POST /api/media
async fn upload_media(
    State(state): State<AppState>,
    viewer: Viewer,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let uploader = viewer.require_user()?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(ToString::to_string)
            .unwrap_or_else(|| "upload".to_string());
        let declared_mime = field.content_type().map(ToString::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("failed to read upload: {e}")))?;

        if data.is_empty() {
            return Err(AppError::Validation("uploaded file is empty".to_string()));
        }

        let outcome = state
            .media()
            .ingest(Some(uploader), &filename, declared_mime.as_deref(), &data)
            .await?;

        return Ok(Json(UploadResponse {
            created: outcome.created,
            item: MediaResponse::build(state.media(), outcome.item),
        }));
    }

    Err(AppError::Validation(
        "multipart body is missing a 'file' part".to_string(),
    ))
}

/// Browse the media library, newest first.
///
/// GET /api/media
async fn list_media(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<MediaListResponse>> {
    viewer.require_user()?;

    let (limit, offset) = paginate(&query, 20);
    let items = MediaItem::list(state.db(), limit, offset)
        .await
        .map_err(AppError::Internal)?;
    let total = MediaItem::count(state.db())
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(MediaListResponse {
        items: items
            .into_iter()
            .map(|item| MediaResponse::build(state.media(), item))
            .collect(),
        total,
    }))
}

/// Fetch a single library item.
///
/// GET /api/media/{id}
async fn get_media(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MediaResponse>> {
    viewer.require_user()?;

    let item = MediaItem::find_by_id(state.db(), id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    Ok(Json(MediaResponse::build(state.media(), item)))
}

/// Set AI-derived descriptive metadata on an item (uploader or staff).
///
/// PUT /api/media/{id}/ai
async fn set_ai_metadata(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
    Json(request): Json<AiMetadataRequest>,
) -> AppResult<Json<MediaResponse>> {
    let user_id = viewer.require_user()?;

    let item = MediaItem::find_by_id(state.db(), id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    if item.uploaded_by != Some(user_id) && !viewer.is_staff() {
        return Err(AppError::Permission(
            "you can only annotate your own uploads".to_string(),
        ));
    }

    let alt_text = request.alt_text.unwrap_or(item.alt_text.clone());
    let caption = request.caption.unwrap_or(item.caption.clone());
    let ai_tags = request.ai_tags.unwrap_or(item.ai_tags.clone());
    let ai_description = request.ai_description.unwrap_or(item.ai_description.clone());

    let updated = MediaItem::set_ai_metadata(
        state.db(),
        id,
        &alt_text,
        &caption,
        &ai_tags,
        &ai_description,
    )
    .await
    .map_err(AppError::Internal)?
    .ok_or(AppError::NotFound)?;

    Ok(Json(MediaResponse::build(state.media(), updated)))
}

/// Attach a library item to a post (author only).
///
/// A (post, media) pair attaches at most once; a duplicate attach is a
/// conflict.
///
/// POST /api/post/{id}/media
async fn attach_media(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(post_id): Path<Uuid>,
    Json(input): Json<CreateAttachment>,
) -> AppResult<Json<AttachmentResponse>> {
    viewer.require_user()?;

    let post = Post::find_by_id(state.db(), post_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;
    let post = require_visible(state.db(), post, &viewer).await?;
    if !viewer.is(post.author_id) {
        return Err(AppError::Permission(
            "you can only attach media to your own posts".to_string(),
        ));
    }

    let item = MediaItem::find_by_id(state.db(), input.media_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::Validation("media item not found".to_string()))?;

    let attachment = PostMedia::attach(state.db(), post.id, input)
        .await
        .map_err(|e| AppError::from_write(e, "attachment"))?;

    Ok(Json(AttachmentResponse::build(
        state.media(),
        AttachedMedia { attachment, item },
    )))
}

/// Detach a library item from a post (author only). The library item is
/// kept.
///
/// DELETE /api/post/{id}/media/{media_id}
async fn detach_media(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((post_id, media_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<serde_json::Value>> {
    viewer.require_user()?;

    let post = Post::find_by_id(state.db(), post_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;
    let post = require_visible(state.db(), post, &viewer).await?;
    if !viewer.is(post.author_id) {
        return Err(AppError::Permission(
            "you can only manage media on your own posts".to_string(),
        ));
    }

    let detached = PostMedia::detach(state.db(), post.id, media_id)
        .await
        .map_err(AppError::Internal)?;
    if !detached {
        return Err(AppError::NotFound);
    }

    Ok(Json(serde_json::json!({ "detached": true })))
}

// =============================================================================
// Router
// =============================================================================

/// Create the media router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/media", post(upload_media))
        .route("/api/media", get(list_media))
        .route("/api/media/{id}", get(get_media))
        .route("/api/media/{id}/ai", put(set_ai_metadata))
        .route("/api/post/{id}/media", post(attach_media))
        .route("/api/post/{id}/media/{media_id}", delete(detach_media))
}
