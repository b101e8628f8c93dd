#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Media library integration tests.
//!
//! Covers content-hash identity, MIME classification, storage URI
//! hygiene, metadata extraction degradation, and attachment overrides.

use loam_kernel::media::exif;
use loam_kernel::media::storage::{
    FileStorage, LocalFileStorage, expand_upload_path, generate_uri, sanitize_filename,
};
use loam_kernel::models::{AttachedMedia, MediaItem, MediaKind, PostMedia};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// -------------------------------------------------------------------------
// Content addressing
// -------------------------------------------------------------------------

#[test]
fn identical_bytes_hash_identically() {
    let bytes = b"the same file, uploaded twice";
    assert_eq!(
        hex::encode(Sha256::digest(bytes)),
        hex::encode(Sha256::digest(bytes))
    );
}

#[test]
fn single_byte_change_yields_a_distinct_identity() {
    let original = hex::encode(Sha256::digest(b"photo bytes"));
    let modified = hex::encode(Sha256::digest(b"photo byteS"));
    assert_ne!(original, modified);
}

#[test]
fn hash_ignores_filename_entirely() {
    // The dedup key is derived from content alone; names play no part.
    let a = hex::encode(Sha256::digest(b"content"));
    let b = hex::encode(Sha256::digest(b"content"));
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
}

// -------------------------------------------------------------------------
// Classification
// -------------------------------------------------------------------------

#[test]
fn mime_classification_matrix() {
    assert_eq!(MediaKind::from_mime("image/gif"), MediaKind::Gif);
    assert_eq!(MediaKind::from_mime("image/jpeg"), MediaKind::Image);
    assert_eq!(MediaKind::from_mime("image/webp"), MediaKind::Image);
    assert_eq!(MediaKind::from_mime("video/webm"), MediaKind::Video);
    assert_eq!(MediaKind::from_mime("audio/ogg"), MediaKind::Audio);
    assert_eq!(MediaKind::from_mime("text/plain"), MediaKind::Document);
    assert_eq!(
        MediaKind::from_mime("application/zip"),
        MediaKind::Document
    );
}

// -------------------------------------------------------------------------
// Storage URIs
// -------------------------------------------------------------------------

#[test]
fn upload_path_pattern_expands_dates() {
    let now = chrono::DateTime::parse_from_rfc3339("2026-01-15T00:00:00Z")
        .unwrap()
        .to_utc();
    assert_eq!(expand_upload_path("media/%Y/%m/", now), "media/2026/01/");
}

#[test]
fn generated_uris_carry_scheme_and_sanitized_name() {
    let uri = generate_uri("local", "media/%Y/%m/", "../../etc/my photo.png");
    assert!(uri.starts_with("local://media/"));
    assert!(uri.ends_with("_my_photo.png"));
    assert!(!uri.contains(".."));
}

#[test]
fn hostile_filenames_are_neutralized() {
    assert_eq!(sanitize_filename("../../../etc/shadow"), "shadow");
    let cleaned = sanitize_filename("x;rm -rf ~.png");
    assert!(!cleaned.contains(';'));
    assert!(!cleaned.contains(' '));
}

#[test]
fn local_storage_builds_public_urls_from_uris() {
    let storage = LocalFileStorage::new("/tmp/uploads", "/files");
    assert_eq!(
        storage.public_url("local://media/2026/01/ab12cd34_x.png"),
        "/files/media/2026/01/ab12cd34_x.png"
    );
}

// -------------------------------------------------------------------------
// Metadata extraction
// -------------------------------------------------------------------------

/// Minimal 1x1 PNG (no EXIF segment).
const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[test]
fn dimensions_extract_without_exif() {
    let meta = exif::extract(TINY_PNG).unwrap();
    assert_eq!((meta.width, meta.height), (1, 1));
    assert!(meta.camera_make.is_empty());
    assert!(meta.gps_latitude.is_none());
}

#[test]
fn unreadable_bytes_fail_cleanly() {
    // The ingest path logs and continues; extraction itself just errors.
    assert!(exif::extract(b"not an image at all").is_err());
}

// -------------------------------------------------------------------------
// Attachments
// -------------------------------------------------------------------------

fn library_item() -> MediaItem {
    MediaItem {
        id: Uuid::now_v7(),
        uri: "local://media/2026/08/ab12cd34_photo.jpg".to_string(),
        content_hash: hex::encode(Sha256::digest(b"photo")),
        kind: MediaKind::Image,
        original_filename: "photo.jpg".to_string(),
        file_size: 1024,
        width: Some(800),
        height: Some(600),
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
        alt_text: "library alt".to_string(),
        caption: String::new(),
        ai_tags: serde_json::json!([]),
        ai_description: String::new(),
        uploaded_by: Some(Uuid::now_v7()),
        created: 1000,
    }
}

#[test]
fn per_post_overrides_take_precedence() {
    let item = library_item();
    let attached = AttachedMedia {
        attachment: PostMedia {
            post_id: Uuid::now_v7(),
            media_id: item.id,
            weight: 2,
            custom_alt_text: "post-specific alt".to_string(),
            custom_caption: "post-specific caption".to_string(),
            created: 1000,
        },
        item,
    };

    assert_eq!(attached.effective_alt_text(), "post-specific alt");
    assert_eq!(attached.effective_caption(), "post-specific caption");
}

#[test]
fn missing_overrides_fall_through_to_the_library_item() {
    let item = library_item();
    let attached = AttachedMedia {
        attachment: PostMedia {
            post_id: Uuid::now_v7(),
            media_id: item.id,
            weight: 0,
            custom_alt_text: String::new(),
            custom_caption: String::new(),
            created: 1000,
        },
        item,
    };

    assert_eq!(attached.effective_alt_text(), "library alt");
    assert_eq!(attached.effective_caption(), "");
}
