#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Settings facade integration tests.
//!
//! Covers default resolution, host overrides, runtime mutation, and the
//! loud failure mode for unknown names.

use loam_kernel::settings::{Settings, SettingsError};
use serde_json::json;

#[test]
fn defaults_cover_every_documented_key() {
    let settings = Settings::new();

    assert_eq!(settings.default_visibility().unwrap(), "PUBLIC");
    assert!(!settings.allow_anonymous_comments().unwrap());
    assert!(settings.moderate_comments().unwrap());
    assert_eq!(settings.comment_max_length().unwrap(), 5000);
    assert_eq!(settings.media_upload_path().unwrap(), "media/%Y/%m/");
    assert_eq!(settings.media_max_size_bytes().unwrap(), 50 * 1024 * 1024);
    assert!(settings
        .allowed_image_types()
        .unwrap()
        .contains(&"image/webp".to_string()));
    assert!(settings
        .allowed_video_types()
        .unwrap()
        .contains(&"video/mp4".to_string()));
    assert!(settings.generate_thumbnails().unwrap());
    assert_eq!(
        settings.thumbnail_sizes().unwrap(),
        vec![(150, 150), (300, 300), (600, 600)]
    );
    assert_eq!(settings.posts_per_page().unwrap(), 10);
    assert!(settings.allow_scheduled_posts().unwrap());
    assert!(settings.track_ai_enhancements().unwrap());
    assert!(settings.auto_generate_slugs().unwrap());
    assert_eq!(settings.slug_max_length().unwrap(), 100);
    assert_eq!(settings.reaction_kinds().unwrap().len(), 6);
    assert_eq!(settings.visibility_choices().unwrap().len(), 5);
}

#[test]
fn unknown_names_fail_loudly_not_silently() {
    let settings = Settings::new();

    let err = settings.get("definitely_not_a_setting").unwrap_err();
    assert!(matches!(err, SettingsError::UnknownSetting(name) if name == "definitely_not_a_setting"));

    // Construction with a bad key is rejected up front.
    assert!(Settings::with_overrides([("psots_per_page".to_string(), json!(5))]).is_err());
}

#[test]
fn overrides_shadow_defaults_per_key() {
    let settings = Settings::with_overrides([
        ("moderate_comments".to_string(), json!(false)),
        ("posts_per_page".to_string(), json!(25)),
    ])
    .unwrap();

    assert!(!settings.moderate_comments().unwrap());
    assert_eq!(settings.posts_per_page().unwrap(), 25);
    // Untouched keys still resolve to defaults.
    assert_eq!(settings.comment_max_length().unwrap(), 5000);
}

#[test]
fn runtime_override_changes_resolve_fresh() {
    // No snapshot caching: every lookup overlays the current override map.
    let settings = Settings::new();
    assert!(settings.moderate_comments().unwrap());

    settings
        .set_override("moderate_comments", json!(false))
        .unwrap();
    assert!(!settings.moderate_comments().unwrap());

    settings.clear_override("moderate_comments");
    assert!(settings.moderate_comments().unwrap());
}

#[test]
fn clones_share_the_override_map() {
    let settings = Settings::new();
    let handle = settings.clone();

    handle
        .set_override("allow_anonymous_comments", json!(true))
        .unwrap();
    assert!(settings.allow_anonymous_comments().unwrap());
}

#[test]
fn reaction_kind_validation_follows_configuration() {
    let settings = Settings::new();
    assert!(settings.is_valid_reaction_kind("LIKE").unwrap());
    assert!(!settings.is_valid_reaction_kind("SPARKLE").unwrap());

    settings
        .set_override(
            "reaction_kinds",
            json!([["SPARKLE", "Sparkle", "✨"], ["LIKE", "Like", "👍"]]),
        )
        .unwrap();
    assert!(settings.is_valid_reaction_kind("SPARKLE").unwrap());

    let kinds = settings.reaction_kinds().unwrap();
    assert_eq!(kinds[0].kind, "SPARKLE");
    assert_eq!(kinds[0].emoji, "✨");
}

#[test]
fn malformed_override_shapes_surface_as_errors() {
    let settings = Settings::new();
    settings
        .set_override("posts_per_page", json!("ten"))
        .unwrap();
    assert!(matches!(
        settings.posts_per_page().unwrap_err(),
        SettingsError::InvalidShape { .. }
    ));
}
