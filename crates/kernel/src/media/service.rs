//! Content-addressed media ingestion.
//!
//! Files are identified by the SHA-256 of their bytes. Uploading identical
//! content twice never creates a second file or record, regardless of
//! filename; re-uploads resolve to the existing item before anything is
//! validated or written.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use super::exif;
use super::storage::{FileStorage, generate_uri};
use crate::error::AppError;
use crate::models::{MediaItem, MediaKind};
use crate::settings::Settings;

/// Outcome of an ingest call.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub item: MediaItem,
    /// False when the upload deduplicated onto an existing item.
    pub created: bool,
}

/// Media ingestion service.
pub struct MediaService {
    pool: PgPool,
    storage: Arc<dyn FileStorage>,
    settings: Settings,
}

impl MediaService {
    /// Create a new media service.
    pub fn new(pool: PgPool, storage: Arc<dyn FileStorage>, settings: Settings) -> Self {
        Self {
            pool,
            storage,
            settings,
        }
    }

    /// Ingest uploaded bytes into the library.
    ///
    /// Computes the content hash first: a dedup hit returns the existing
    /// item as-is, making re-upload a no-op beyond the hash computation.
    /// New content is validated (size, MIME), classified, written to
    /// storage, and recorded; image metadata extraction afterwards is
    /// best-effort and never fails the upload.
    pub async fn ingest(
        &self,
        uploaded_by: Option<Uuid>,
        filename: &str,
        declared_mime: Option<&str>,
        data: &[u8],
    ) -> Result<IngestOutcome, AppError> {
        let content_hash = hex::encode(Sha256::digest(data));

        if let Some(existing) = MediaItem::find_by_content_hash(&self.pool, &content_hash)
            .await
            .map_err(AppError::Internal)?
        {
            debug!(
                id = %existing.id,
                hash = %content_hash,
                filename = %filename,
                "upload deduplicated onto existing item"
            );
            return Ok(IngestOutcome {
                item: existing,
                created: false,
            });
        }

        let max_size = self.settings.media_max_size_bytes()?;
        if data.len() as u64 > max_size {
            return Err(AppError::Validation(format!(
                "file too large: {} bytes (max {} bytes)",
                data.len(),
                max_size
            )));
        }

        // Fall back to sniffing the bytes when the client declared nothing.
        let mime = match declared_mime {
            Some(mime) if !mime.is_empty() => mime.to_string(),
            _ => infer::get(data)
                .map(|t| t.mime_type().to_string())
                .unwrap_or_default(),
        };

        self.validate_mime(&mime)?;

        let kind = MediaKind::from_mime(&mime);

        let pattern = self.settings.media_upload_path()?;
        let uri = generate_uri(self.storage.scheme(), &pattern, filename);

        self.storage
            .write(&uri, data)
            .await
            .context("failed to write file to storage")
            .map_err(AppError::Internal)?;

        let id = Uuid::now_v7();
        let inserted = MediaItem::insert(
            &self.pool,
            id,
            &uri,
            &content_hash,
            kind,
            filename,
            data.len() as i64,
            &mime,
            uploaded_by,
        )
        .await
        .map_err(AppError::Internal)?;

        if !inserted {
            // A concurrent identical upload won the insert. Content
            // addressing makes "already done" the right resolution; the
            // file just written is an orphan for offline cleanup.
            let existing = MediaItem::find_by_content_hash(&self.pool, &content_hash)
                .await
                .map_err(AppError::Internal)?
                .ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!(
                        "media item vanished after conflicting insert"
                    ))
                })?;
            debug!(
                id = %existing.id,
                hash = %content_hash,
                uri = %uri,
                "lost dedup race, returning winner"
            );
            return Ok(IngestOutcome {
                item: existing,
                created: false,
            });
        }

        if matches!(kind, MediaKind::Image | MediaKind::Gif) {
            match exif::extract(data) {
                Ok(meta) => {
                    MediaItem::apply_metadata(&self.pool, id, &meta)
                        .await
                        .map_err(AppError::Internal)?;
                }
                Err(e) => {
                    // Best-effort only: the item persists with defaults.
                    warn!(id = %id, error = %e, "image metadata extraction failed");
                }
            }
        }

        let item = MediaItem::find_by_id(&self.pool, id)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to fetch created item")))?;

        debug!(
            id = %item.id,
            hash = %content_hash,
            kind = %item.kind.as_str(),
            size = data.len(),
            "media item created"
        );

        Ok(IngestOutcome {
            item,
            created: true,
        })
    }

    /// Reject image and video MIME types outside the configured allow
    /// lists. Other types (documents, audio) pass through.
    fn validate_mime(&self, mime: &str) -> Result<(), AppError> {
        if mime.starts_with("image/") {
            let allowed = self.settings.allowed_image_types()?;
            if !allowed.iter().any(|a| a == mime) {
                return Err(AppError::Validation(format!(
                    "image type not allowed: {mime}"
                )));
            }
        } else if mime.starts_with("video/") {
            let allowed = self.settings.allowed_video_types()?;
            if !allowed.iter().any(|a| a == mime) {
                return Err(AppError::Validation(format!(
                    "video type not allowed: {mime}"
                )));
            }
        }
        Ok(())
    }

    /// Public URL for a stored item.
    pub fn public_url(&self, item: &MediaItem) -> String {
        self.storage.public_url(&item.uri)
    }

    /// The storage backend.
    pub fn storage(&self) -> &Arc<dyn FileStorage> {
        &self.storage
    }
}

impl std::fmt::Debug for MediaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaService").finish()
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use sha2::{Digest, Sha256};

    #[test]
    fn content_hash_distinguishes_single_byte_changes() {
        let original = hex::encode(Sha256::digest(b"file content"));
        let same = hex::encode(Sha256::digest(b"file content"));
        let modified = hex::encode(Sha256::digest(b"file content!"));

        assert_eq!(original, same);
        assert_ne!(original, modified);
        assert_eq!(original.len(), 64);
    }

    #[test]
    fn sniffing_recognizes_common_containers() {
        // PNG magic bytes
        let png_header = [0x89u8, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(
            infer::get(&png_header).map(|t| t.mime_type()),
            Some("image/png")
        );

        // Plain text sniffs to nothing
        assert!(infer::get(b"hello world").is_none());
    }
}
