//! Best-effort image metadata extraction.
//!
//! Dimensions come from the image header; camera, exposure, GPS, and
//! capture-time details come from EXIF when present. Callers treat the
//! whole extraction as optional — a corrupt or exotic file degrades to an
//! item with default metadata, never a failed upload.

use std::io::Cursor;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use exif::{In, Tag, Value};

/// Metadata extracted from an image.
#[derive(Debug, Clone, Default)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,

    /// All EXIF fields keyed by tag name, stringified.
    pub exif_data: serde_json::Value,

    pub camera_make: String,
    pub camera_model: String,
    pub focal_length: String,
    pub aperture: String,
    pub shutter_speed: String,
    pub iso: Option<u32>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,

    /// Original capture time as a Unix timestamp.
    pub capture_date: Option<i64>,
}

/// Extract dimensions and EXIF metadata from raw image bytes.
///
/// Fails only when the bytes cannot be read as an image at all; a missing
/// or unreadable EXIF segment yields dimensions with empty EXIF fields.
pub fn extract(data: &[u8]) -> Result<ImageMetadata> {
    let (width, height) = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("failed to sniff image format")?
        .into_dimensions()
        .context("failed to read image dimensions")?;

    let mut meta = ImageMetadata {
        width,
        height,
        exif_data: serde_json::Value::Object(serde_json::Map::new()),
        ..ImageMetadata::default()
    };

    if let Ok(exif) = exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
        let mut fields = serde_json::Map::new();
        for field in exif.fields().filter(|f| f.ifd_num == In::PRIMARY) {
            fields.insert(
                field.tag.to_string(),
                serde_json::Value::String(field.display_value().to_string()),
            );
        }
        meta.exif_data = serde_json::Value::Object(fields);

        meta.camera_make = ascii_field(&exif, Tag::Make);
        meta.camera_model = ascii_field(&exif, Tag::Model);
        meta.focal_length = display_field(&exif, Tag::FocalLength);
        meta.aperture = display_field(&exif, Tag::FNumber);
        meta.shutter_speed = display_field(&exif, Tag::ExposureTime);
        meta.iso = uint_field(&exif, Tag::PhotographicSensitivity);
        meta.gps_latitude = gps_coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, "S");
        meta.gps_longitude = gps_coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, "W");
        meta.capture_date = capture_timestamp(&exif);
    }

    Ok(meta)
}

/// An ASCII EXIF field with the surrounding quotes stripped.
fn ascii_field(exif: &exif::Exif, tag: Tag) -> String {
    exif.get_field(tag, In::PRIMARY)
        .map(|f| f.display_value().to_string().trim_matches('"').to_string())
        .unwrap_or_default()
}

/// A field rendered through the EXIF display formatting (e.g. "1/250").
fn display_field(exif: &exif::Exif, tag: Tag) -> String {
    exif.get_field(tag, In::PRIMARY)
        .map(|f| f.display_value().to_string())
        .unwrap_or_default()
}

fn uint_field(exif: &exif::Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
}

/// Convert a degrees/minutes/seconds rational triple into decimal degrees,
/// negated for the southern/western hemisphere.
fn gps_coordinate(
    exif: &exif::Exif,
    coord_tag: Tag,
    ref_tag: Tag,
    negative_ref: &str,
) -> Option<f64> {
    let field = exif.get_field(coord_tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    if parts.len() < 3 {
        return None;
    }

    let degrees = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;

    let reference = ascii_field(exif, ref_tag);
    if reference.eq_ignore_ascii_case(negative_ref) {
        Some(-degrees)
    } else {
        Some(degrees)
    }
}

/// Parse the EXIF capture time ("YYYY:MM:DD HH:MM:SS") into a Unix timestamp.
fn capture_timestamp(exif: &exif::Exif) -> Option<i64> {
    let raw = ascii_field(exif, Tag::DateTimeOriginal);
    if raw.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(&raw, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    /// Minimal 1x1 PNG (no EXIF segment).
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn extracts_dimensions_without_exif() {
        let meta = extract(TINY_PNG).unwrap();
        assert_eq!((meta.width, meta.height), (1, 1));
        assert!(meta.camera_make.is_empty());
        assert!(meta.iso.is_none());
        assert!(meta.capture_date.is_none());
    }

    #[test]
    fn garbage_bytes_fail_gracefully() {
        assert!(extract(b"definitely not an image").is_err());
        assert!(extract(&[]).is_err());
    }

    #[test]
    fn capture_date_format_parses() {
        let dt = NaiveDateTime::parse_from_str("2026:08:06 10:30:00", "%Y:%m:%d %H:%M:%S").unwrap();
        assert_eq!(dt.and_utc().timestamp(), 1786012200);
    }
}
