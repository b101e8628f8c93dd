//! Media library records and post attachments.
//!
//! Library items are content-addressed: the unique SHA-256 content hash is
//! the deduplication key, so identical bytes always resolve to one row.
//! Ingest (hashing, storage, metadata extraction) lives in
//! [`crate::media::MediaService`]; this module is the persisted shape and
//! its queries.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::media::exif::ImageMetadata;

/// Classified media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaKind {
    Image,
    Video,
    Gif,
    Document,
    Audio,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "IMAGE",
            MediaKind::Video => "VIDEO",
            MediaKind::Gif => "GIF",
            MediaKind::Document => "DOCUMENT",
            MediaKind::Audio => "AUDIO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IMAGE" => Some(MediaKind::Image),
            "VIDEO" => Some(MediaKind::Video),
            "GIF" => Some(MediaKind::Gif),
            "DOCUMENT" => Some(MediaKind::Document),
            "AUDIO" => Some(MediaKind::Audio),
            _ => None,
        }
    }

    /// Classify a declared MIME type. The gif check precedes the generic
    /// image prefix; everything unrecognized is a document.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/gif") {
            MediaKind::Gif
        } else if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("video/") {
            MediaKind::Video
        } else if mime.starts_with("audio/") {
            MediaKind::Audio
        } else {
            MediaKind::Document
        }
    }
}

/// A media library item.
#[derive(Debug, Clone, Serialize)]
pub struct MediaItem {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Storage URI (see [`crate::media::FileStorage`]).
    pub uri: String,

    /// SHA-256 of the file bytes; the deduplication key.
    pub content_hash: String,

    pub kind: MediaKind,

    pub original_filename: String,
    pub file_size: i64,

    /// Pixel dimensions, when extraction succeeded.
    pub width: Option<i32>,
    pub height: Option<i32>,

    pub mime_type: String,

    /// Duration in seconds for video/audio.
    pub duration: Option<f64>,

    /// Raw EXIF tags keyed by tag name.
    pub exif_data: serde_json::Value,
    pub camera_make: String,
    pub camera_model: String,
    pub focal_length: String,
    pub aperture: String,
    pub shutter_speed: String,
    pub iso: Option<i32>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,

    /// Original capture time from EXIF.
    pub capture_date: Option<i64>,

    /// AI-generated or manual accessibility metadata.
    pub alt_text: String,
    pub caption: String,
    pub ai_tags: serde_json::Value,
    pub ai_description: String,

    /// Uploader (NULL once the host account is gone).
    pub uploaded_by: Option<Uuid>,

    /// Unix timestamp when created.
    pub created: i64,
}

/// Database row for media_item.
#[derive(sqlx::FromRow)]
struct MediaRow {
    id: Uuid,
    uri: String,
    content_hash: String,
    kind: String,
    original_filename: String,
    file_size: i64,
    width: Option<i32>,
    height: Option<i32>,
    mime_type: String,
    duration: Option<f64>,
    exif_data: serde_json::Value,
    camera_make: String,
    camera_model: String,
    focal_length: String,
    aperture: String,
    shutter_speed: String,
    iso: Option<i32>,
    gps_latitude: Option<f64>,
    gps_longitude: Option<f64>,
    capture_date: Option<i64>,
    alt_text: String,
    caption: String,
    ai_tags: serde_json::Value,
    ai_description: String,
    uploaded_by: Option<Uuid>,
    created: i64,
}

impl From<MediaRow> for MediaItem {
    fn from(row: MediaRow) -> Self {
        Self {
            id: row.id,
            uri: row.uri,
            content_hash: row.content_hash,
            kind: MediaKind::parse(&row.kind).unwrap_or(MediaKind::Document),
            original_filename: row.original_filename,
            file_size: row.file_size,
            width: row.width,
            height: row.height,
            mime_type: row.mime_type,
            duration: row.duration,
            exif_data: row.exif_data,
            camera_make: row.camera_make,
            camera_model: row.camera_model,
            focal_length: row.focal_length,
            aperture: row.aperture,
            shutter_speed: row.shutter_speed,
            iso: row.iso,
            gps_latitude: row.gps_latitude,
            gps_longitude: row.gps_longitude,
            capture_date: row.capture_date,
            alt_text: row.alt_text,
            caption: row.caption,
            ai_tags: row.ai_tags,
            ai_description: row.ai_description,
            uploaded_by: row.uploaded_by,
            created: row.created,
        }
    }
}

/// Attachment of a library item to a post, with per-post overrides.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostMedia {
    pub post_id: Uuid,
    pub media_id: Uuid,

    /// Per-post display order.
    pub weight: i32,

    /// Overrides for the library item's own metadata.
    pub custom_alt_text: String,
    pub custom_caption: String,

    pub created: i64,
}

/// An attachment joined with its library item.
#[derive(Debug, Clone, Serialize)]
pub struct AttachedMedia {
    pub attachment: PostMedia,
    pub item: MediaItem,
}

impl AttachedMedia {
    /// Best available alt text: per-post override, then the library item's,
    /// then a filename fallback.
    pub fn effective_alt_text(&self) -> String {
        if !self.attachment.custom_alt_text.is_empty() {
            return self.attachment.custom_alt_text.clone();
        }
        if !self.item.alt_text.is_empty() {
            return self.item.alt_text.clone();
        }
        format!("Image: {}", self.item.original_filename)
    }

    /// Per-post caption override, falling back to the library item's.
    pub fn effective_caption(&self) -> String {
        if !self.attachment.custom_caption.is_empty() {
            return self.attachment.custom_caption.clone();
        }
        self.item.caption.clone()
    }
}

/// Input for attaching a library item to a post.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAttachment {
    pub media_id: Uuid,
    pub weight: Option<i32>,
    pub custom_alt_text: Option<String>,
    pub custom_caption: Option<String>,
}

const COLS: &str = "id, uri, content_hash, kind, original_filename, file_size, width, height, \
                    mime_type, duration, exif_data, camera_make, camera_model, focal_length, \
                    aperture, shutter_speed, iso, gps_latitude, gps_longitude, capture_date, \
                    alt_text, caption, ai_tags, ai_description, uploaded_by, created";

impl MediaItem {
    /// Whether the item renders as an image.
    pub fn is_image(&self) -> bool {
        matches!(self.kind, MediaKind::Image | MediaKind::Gif)
    }

    /// Orientation from dimensions: landscape, portrait, square, unknown.
    pub fn orientation(&self) -> &'static str {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > h => "landscape",
            (Some(w), Some(h)) if h > w => "portrait",
            (Some(_), Some(_)) => "square",
            _ => "unknown",
        }
    }

    /// Whether GPS coordinates were extracted.
    pub fn has_location(&self) -> bool {
        self.gps_latitude.is_some() && self.gps_longitude.is_some()
    }

    /// Human-readable file size.
    pub fn human_file_size(&self) -> String {
        let mut size = self.file_size as f64;
        for unit in ["B", "KB", "MB", "GB"] {
            if size < 1024.0 {
                return format!("{size:.1} {unit}");
            }
            size /= 1024.0;
        }
        format!("{size:.1} TB")
    }

    /// Find an item by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let row =
            sqlx::query_as::<_, MediaRow>(&format!("SELECT {COLS} FROM media_item WHERE id = $1"))
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("failed to fetch media item")?;

        Ok(row.map(MediaItem::from))
    }

    /// Find an item by content hash (the dedup lookup).
    pub async fn find_by_content_hash(pool: &PgPool, content_hash: &str) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, MediaRow>(&format!(
            "SELECT {COLS} FROM media_item WHERE content_hash = $1"
        ))
        .bind(content_hash)
        .fetch_optional(pool)
        .await
        .context("failed to fetch media item by hash")?;

        Ok(row.map(MediaItem::from))
    }

    /// List items, newest first.
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, MediaRow>(&format!(
            "SELECT {COLS} FROM media_item ORDER BY created DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("failed to list media items")?;

        Ok(rows.into_iter().map(MediaItem::from).collect())
    }

    /// Count all items.
    pub async fn count(pool: &PgPool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_item")
            .fetch_one(pool)
            .await
            .context("failed to count media items")?;

        Ok(count)
    }

    /// Insert a new item. Returns false when an identical-content row
    /// already exists (`ON CONFLICT DO NOTHING` on the hash) — the caller
    /// resolves the race by fetching the winner.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        pool: &PgPool,
        id: Uuid,
        uri: &str,
        content_hash: &str,
        kind: MediaKind,
        original_filename: &str,
        file_size: i64,
        mime_type: &str,
        uploaded_by: Option<Uuid>,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO media_item (id, uri, content_hash, kind, original_filename, file_size,
                                    mime_type, uploaded_by, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (content_hash) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(uri)
        .bind(content_hash)
        .bind(kind.as_str())
        .bind(original_filename)
        .bind(file_size)
        .bind(mime_type)
        .bind(uploaded_by)
        .bind(now)
        .execute(pool)
        .await
        .context("failed to insert media item")?;

        Ok(result.rows_affected() > 0)
    }

    /// Persist extracted image metadata onto an item.
    pub async fn apply_metadata(pool: &PgPool, id: Uuid, meta: &ImageMetadata) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE media_item
            SET width = $1, height = $2, exif_data = $3, camera_make = $4, camera_model = $5,
                focal_length = $6, aperture = $7, shutter_speed = $8, iso = $9,
                gps_latitude = $10, gps_longitude = $11, capture_date = $12
            WHERE id = $13
            "#,
        )
        .bind(meta.width as i32)
        .bind(meta.height as i32)
        .bind(&meta.exif_data)
        .bind(&meta.camera_make)
        .bind(&meta.camera_model)
        .bind(&meta.focal_length)
        .bind(&meta.aperture)
        .bind(&meta.shutter_speed)
        .bind(meta.iso.map(|v| v as i32))
        .bind(meta.gps_latitude)
        .bind(meta.gps_longitude)
        .bind(meta.capture_date)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to apply media metadata")?;

        Ok(())
    }

    /// Set AI-derived descriptive metadata on an item.
    pub async fn set_ai_metadata(
        pool: &PgPool,
        id: Uuid,
        alt_text: &str,
        caption: &str,
        ai_tags: &serde_json::Value,
        ai_description: &str,
    ) -> Result<Option<Self>> {
        sqlx::query(
            r#"
            UPDATE media_item
            SET alt_text = $1, caption = $2, ai_tags = $3, ai_description = $4
            WHERE id = $5
            "#,
        )
        .bind(alt_text)
        .bind(caption)
        .bind(ai_tags)
        .bind(ai_description)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to set AI metadata")?;

        Self::find_by_id(pool, id).await
    }
}

impl PostMedia {
    /// Attach a library item to a post.
    ///
    /// The (post, media) pair is unique; attaching twice trips the
    /// constraint and surfaces to the caller.
    pub async fn attach(
        pool: &PgPool,
        post_id: Uuid,
        input: CreateAttachment,
    ) -> Result<Self> {
        let now = chrono::Utc::now().timestamp();
        let attachment = sqlx::query_as::<_, PostMedia>(
            r#"
            INSERT INTO post_media (post_id, media_id, weight, custom_alt_text, custom_caption, created)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING post_id, media_id, weight, custom_alt_text, custom_caption, created
            "#,
        )
        .bind(post_id)
        .bind(input.media_id)
        .bind(input.weight.unwrap_or(0))
        .bind(input.custom_alt_text.unwrap_or_default())
        .bind(input.custom_caption.unwrap_or_default())
        .bind(now)
        .fetch_one(pool)
        .await
        .context("failed to attach media to post")?;

        Ok(attachment)
    }

    /// Detach a library item from a post. The library item itself is kept.
    pub async fn detach(pool: &PgPool, post_id: Uuid, media_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM post_media WHERE post_id = $1 AND media_id = $2")
            .bind(post_id)
            .bind(media_id)
            .execute(pool)
            .await
            .context("failed to detach media from post")?;

        Ok(result.rows_affected() > 0)
    }

    /// List a post's attachments with their library items, in per-post order.
    pub async fn list_for_post(pool: &PgPool, post_id: Uuid) -> Result<Vec<AttachedMedia>> {
        #[derive(sqlx::FromRow)]
        struct JoinedRow {
            post_id: Uuid,
            media_id: Uuid,
            weight: i32,
            custom_alt_text: String,
            custom_caption: String,
            attached: i64,
            #[sqlx(flatten)]
            item: MediaRow,
        }

        let rows = sqlx::query_as::<_, JoinedRow>(
            r#"
            SELECT pm.post_id, pm.media_id, pm.weight, pm.custom_alt_text, pm.custom_caption,
                   pm.created AS attached, m.*
            FROM post_media pm
            INNER JOIN media_item m ON m.id = pm.media_id
            WHERE pm.post_id = $1
            ORDER BY pm.weight, pm.created
            "#,
        )
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("failed to list media for post")?;

        Ok(rows
            .into_iter()
            .map(|r| AttachedMedia {
                attachment: PostMedia {
                    post_id: r.post_id,
                    media_id: r.media_id,
                    weight: r.weight,
                    custom_alt_text: r.custom_alt_text,
                    custom_caption: r.custom_caption,
                    created: r.attached,
                },
                item: MediaItem::from(r.item),
            })
            .collect())
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_item() -> MediaItem {
        MediaItem {
            id: Uuid::now_v7(),
            uri: "local://2026/08/abc12345_photo.jpg".to_string(),
            content_hash: "deadbeef".to_string(),
            kind: MediaKind::Image,
            original_filename: "photo.jpg".to_string(),
            file_size: 2048,
            width: Some(1920),
            height: Some(1080),
            mime_type: "image/jpeg".to_string(),
            duration: None,
            exif_data: serde_json::json!({}),
            camera_make: String::new(),
            camera_model: String::new(),
            focal_length: String::new(),
            aperture: String::new(),
            shutter_speed: String::new(),
            iso: None,
            gps_latitude: None,
            gps_longitude: None,
            capture_date: None,
            alt_text: String::new(),
            caption: String::new(),
            ai_tags: serde_json::json!([]),
            ai_description: String::new(),
            uploaded_by: None,
            created: 1000,
        }
    }

    #[test]
    fn gif_classification_precedes_image() {
        assert_eq!(MediaKind::from_mime("image/gif"), MediaKind::Gif);
        assert_eq!(MediaKind::from_mime("image/jpeg"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("audio/mpeg"), MediaKind::Audio);
        assert_eq!(MediaKind::from_mime("application/pdf"), MediaKind::Document);
        assert_eq!(MediaKind::from_mime(""), MediaKind::Document);
    }

    #[test]
    fn kind_round_trips_through_storage_form() {
        for kind in [
            MediaKind::Image,
            MediaKind::Video,
            MediaKind::Gif,
            MediaKind::Document,
            MediaKind::Audio,
        ] {
            assert_eq!(MediaKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MediaKind::parse("TARBALL"), None);
    }

    #[test]
    fn orientation_from_dimensions() {
        let mut item = sample_item();
        assert_eq!(item.orientation(), "landscape");
        item.width = Some(1080);
        item.height = Some(1920);
        assert_eq!(item.orientation(), "portrait");
        item.height = Some(1080);
        assert_eq!(item.orientation(), "square");
        item.width = None;
        assert_eq!(item.orientation(), "unknown");
    }

    #[test]
    fn human_file_size_scales_units() {
        let mut item = sample_item();
        item.file_size = 512;
        assert_eq!(item.human_file_size(), "512.0 B");
        item.file_size = 5 * 1024 * 1024;
        assert_eq!(item.human_file_size(), "5.0 MB");
    }

    #[test]
    fn effective_alt_text_prefers_override_then_item_then_filename() {
        let item = sample_item();
        let mut attached = AttachedMedia {
            attachment: PostMedia {
                post_id: Uuid::nil(),
                media_id: item.id,
                weight: 0,
                custom_alt_text: String::new(),
                custom_caption: String::new(),
                created: 1000,
            },
            item,
        };

        assert_eq!(attached.effective_alt_text(), "Image: photo.jpg");

        attached.item.alt_text = "A sunset".to_string();
        assert_eq!(attached.effective_alt_text(), "A sunset");

        attached.attachment.custom_alt_text = "Sunset over the bay".to_string();
        assert_eq!(attached.effective_alt_text(), "Sunset over the bay");
    }

    #[test]
    fn effective_caption_falls_back_to_item() {
        let mut item = sample_item();
        item.caption = "library caption".to_string();
        let mut attached = AttachedMedia {
            attachment: PostMedia {
                post_id: Uuid::nil(),
                media_id: item.id,
                weight: 0,
                custom_alt_text: String::new(),
                custom_caption: String::new(),
                created: 1000,
            },
            item,
        };

        assert_eq!(attached.effective_caption(), "library caption");
        attached.attachment.custom_caption = "post caption".to_string();
        assert_eq!(attached.effective_caption(), "post caption");
    }

    #[test]
    fn image_kinds_render_as_images() {
        let mut item = sample_item();
        assert!(item.is_image());
        item.kind = MediaKind::Gif;
        assert!(item.is_image());
        item.kind = MediaKind::Video;
        assert!(!item.is_image());
    }
}
