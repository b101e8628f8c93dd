//! Blog settings facade.
//!
//! Overlays a fixed default mapping with host-supplied overrides. Lookups
//! resolve fresh on every access so a host can change overrides at runtime;
//! unknown setting names are a programming error and fail loudly instead of
//! silently defaulting.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Errors from the settings facade.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unknown blog setting: {0}")]
    UnknownSetting(String),

    #[error("blog setting {key} has invalid shape: expected {expected}")]
    InvalidShape {
        key: &'static str,
        expected: &'static str,
    },
}

/// A reaction kind definition: machine name, label, emoji.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionKind {
    pub kind: String,
    pub label: String,
    pub emoji: String,
}

/// Fixed defaults for every known setting.
static DEFAULTS: LazyLock<HashMap<&'static str, Value>> = LazyLock::new(|| {
    HashMap::from([
        (
            "visibility_choices",
            json!([
                ["PUBLIC", "Public"],
                ["PRIVATE", "Private"],
                ["UNLISTED", "Unlisted"],
                ["FRIENDS", "Friends Only"],
                ["CUSTOM", "Custom"],
            ]),
        ),
        ("default_visibility", json!("PUBLIC")),
        ("allow_anonymous_comments", json!(false)),
        ("moderate_comments", json!(true)),
        ("comment_max_length", json!(5000)),
        ("media_upload_path", json!("media/%Y/%m/")),
        ("media_max_size_mb", json!(50)),
        (
            "allowed_image_types",
            json!(["image/jpeg", "image/png", "image/gif", "image/webp"]),
        ),
        ("allowed_video_types", json!(["video/mp4", "video/webm"])),
        ("generate_thumbnails", json!(true)),
        ("thumbnail_sizes", json!([[150, 150], [300, 300], [600, 600]])),
        ("posts_per_page", json!(10)),
        ("allow_scheduled_posts", json!(true)),
        ("track_ai_enhancements", json!(true)),
        (
            "reaction_kinds",
            json!([
                ["LIKE", "Like", "👍"],
                ["LOVE", "Love", "❤️"],
                ["HAHA", "Haha", "😂"],
                ["WOW", "Wow", "😮"],
                ["SAD", "Sad", "😢"],
                ["ANGRY", "Angry", "😠"],
            ]),
        ),
        ("auto_generate_slugs", json!(true)),
        ("slug_max_length", json!(100)),
    ])
});

/// Handle on the settings facade.
///
/// Cheap to clone; overrides live behind a `parking_lot::RwLock` so the
/// host can mutate them at runtime without a settings registry. Every
/// lookup overlays the override map onto the defaults at call time — there
/// is no snapshot caching.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    overrides: Arc<RwLock<HashMap<String, Value>>>,
}

impl Settings {
    /// Create a facade with no overrides (pure defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a facade from a host-supplied override map.
    ///
    /// Rejects unknown keys immediately so a typo in deployment config
    /// surfaces at startup rather than as a silently-defaulted setting.
    pub fn with_overrides(
        overrides: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Self, SettingsError> {
        let settings = Self::new();
        for (key, value) in overrides {
            settings.set_override(&key, value)?;
        }
        Ok(settings)
    }

    /// Set or replace a single override.
    pub fn set_override(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        if !DEFAULTS.contains_key(key) {
            return Err(SettingsError::UnknownSetting(key.to_string()));
        }
        self.overrides.write().insert(key.to_string(), value);
        Ok(())
    }

    /// Remove an override, falling back to the default.
    pub fn clear_override(&self, key: &str) {
        self.overrides.write().remove(key);
    }

    /// Resolve a setting: override if present, default otherwise.
    pub fn get(&self, key: &str) -> Result<Value, SettingsError> {
        if let Some(value) = self.overrides.read().get(key) {
            return Ok(value.clone());
        }
        DEFAULTS
            .get(key)
            .cloned()
            .ok_or_else(|| SettingsError::UnknownSetting(key.to_string()))
    }

    pub fn visibility_choices(&self) -> Result<Vec<(String, String)>, SettingsError> {
        let value = self.get("visibility_choices")?;
        as_string_pairs(&value, "visibility_choices")
    }

    pub fn default_visibility(&self) -> Result<String, SettingsError> {
        as_string(&self.get("default_visibility")?, "default_visibility")
    }

    pub fn allow_anonymous_comments(&self) -> Result<bool, SettingsError> {
        as_bool(
            &self.get("allow_anonymous_comments")?,
            "allow_anonymous_comments",
        )
    }

    pub fn moderate_comments(&self) -> Result<bool, SettingsError> {
        as_bool(&self.get("moderate_comments")?, "moderate_comments")
    }

    pub fn comment_max_length(&self) -> Result<usize, SettingsError> {
        as_usize(&self.get("comment_max_length")?, "comment_max_length")
    }

    pub fn media_upload_path(&self) -> Result<String, SettingsError> {
        as_string(&self.get("media_upload_path")?, "media_upload_path")
    }

    pub fn media_max_size_bytes(&self) -> Result<u64, SettingsError> {
        let mb = as_usize(&self.get("media_max_size_mb")?, "media_max_size_mb")?;
        Ok(mb as u64 * 1024 * 1024)
    }

    pub fn allowed_image_types(&self) -> Result<Vec<String>, SettingsError> {
        as_string_list(&self.get("allowed_image_types")?, "allowed_image_types")
    }

    pub fn allowed_video_types(&self) -> Result<Vec<String>, SettingsError> {
        as_string_list(&self.get("allowed_video_types")?, "allowed_video_types")
    }

    pub fn generate_thumbnails(&self) -> Result<bool, SettingsError> {
        as_bool(&self.get("generate_thumbnails")?, "generate_thumbnails")
    }

    pub fn thumbnail_sizes(&self) -> Result<Vec<(u32, u32)>, SettingsError> {
        let value = self.get("thumbnail_sizes")?;
        let key = "thumbnail_sizes";
        let expected = "array of [width, height] pairs";
        let items = value
            .as_array()
            .ok_or(SettingsError::InvalidShape { key, expected })?;
        items
            .iter()
            .map(|pair| {
                let dims = pair
                    .as_array()
                    .filter(|a| a.len() == 2)
                    .ok_or(SettingsError::InvalidShape { key, expected })?;
                let w = dims[0]
                    .as_u64()
                    .ok_or(SettingsError::InvalidShape { key, expected })?;
                let h = dims[1]
                    .as_u64()
                    .ok_or(SettingsError::InvalidShape { key, expected })?;
                Ok((w as u32, h as u32))
            })
            .collect()
    }

    pub fn posts_per_page(&self) -> Result<i64, SettingsError> {
        Ok(as_usize(&self.get("posts_per_page")?, "posts_per_page")? as i64)
    }

    pub fn allow_scheduled_posts(&self) -> Result<bool, SettingsError> {
        as_bool(&self.get("allow_scheduled_posts")?, "allow_scheduled_posts")
    }

    pub fn track_ai_enhancements(&self) -> Result<bool, SettingsError> {
        as_bool(&self.get("track_ai_enhancements")?, "track_ai_enhancements")
    }

    pub fn reaction_kinds(&self) -> Result<Vec<ReactionKind>, SettingsError> {
        let value = self.get("reaction_kinds")?;
        let key = "reaction_kinds";
        let expected = "array of [kind, label, emoji] triples";
        let items = value
            .as_array()
            .ok_or(SettingsError::InvalidShape { key, expected })?;
        items
            .iter()
            .map(|triple| {
                let parts = triple
                    .as_array()
                    .filter(|a| a.len() == 3)
                    .ok_or(SettingsError::InvalidShape { key, expected })?;
                let mut strings = parts.iter().map(|p| p.as_str().map(String::from));
                match (strings.next(), strings.next(), strings.next()) {
                    (Some(Some(kind)), Some(Some(label)), Some(Some(emoji))) => {
                        Ok(ReactionKind { kind, label, emoji })
                    }
                    _ => Err(SettingsError::InvalidShape { key, expected }),
                }
            })
            .collect()
    }

    /// Check whether a reaction kind is one of the configured kinds.
    pub fn is_valid_reaction_kind(&self, kind: &str) -> Result<bool, SettingsError> {
        Ok(self.reaction_kinds()?.iter().any(|r| r.kind == kind))
    }

    pub fn auto_generate_slugs(&self) -> Result<bool, SettingsError> {
        as_bool(&self.get("auto_generate_slugs")?, "auto_generate_slugs")
    }

    pub fn slug_max_length(&self) -> Result<usize, SettingsError> {
        as_usize(&self.get("slug_max_length")?, "slug_max_length")
    }
}

fn as_bool(value: &Value, key: &'static str) -> Result<bool, SettingsError> {
    value.as_bool().ok_or(SettingsError::InvalidShape {
        key,
        expected: "boolean",
    })
}

fn as_string(value: &Value, key: &'static str) -> Result<String, SettingsError> {
    value
        .as_str()
        .map(String::from)
        .ok_or(SettingsError::InvalidShape {
            key,
            expected: "string",
        })
}

fn as_usize(value: &Value, key: &'static str) -> Result<usize, SettingsError> {
    value
        .as_u64()
        .map(|v| v as usize)
        .ok_or(SettingsError::InvalidShape {
            key,
            expected: "non-negative integer",
        })
}

fn as_string_list(value: &Value, key: &'static str) -> Result<Vec<String>, SettingsError> {
    let expected = "array of strings";
    value
        .as_array()
        .ok_or(SettingsError::InvalidShape { key, expected })?
        .iter()
        .map(|v| {
            v.as_str()
                .map(String::from)
                .ok_or(SettingsError::InvalidShape { key, expected })
        })
        .collect()
}

fn as_string_pairs(value: &Value, key: &'static str) -> Result<Vec<(String, String)>, SettingsError> {
    let expected = "array of [value, label] pairs";
    value
        .as_array()
        .ok_or(SettingsError::InvalidShape { key, expected })?
        .iter()
        .map(|pair| {
            let parts = pair
                .as_array()
                .filter(|a| a.len() == 2)
                .ok_or(SettingsError::InvalidShape { key, expected })?;
            match (parts[0].as_str(), parts[1].as_str()) {
                (Some(v), Some(l)) => Ok((v.to_string(), l.to_string())),
                _ => Err(SettingsError::InvalidShape { key, expected }),
            }
        })
        .collect()
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_without_overrides() {
        let settings = Settings::new();
        assert!(settings.moderate_comments().unwrap());
        assert!(!settings.allow_anonymous_comments().unwrap());
        assert_eq!(settings.comment_max_length().unwrap(), 5000);
        assert_eq!(settings.posts_per_page().unwrap(), 10);
        assert_eq!(settings.default_visibility().unwrap(), "PUBLIC");
        assert_eq!(settings.slug_max_length().unwrap(), 100);
    }

    #[test]
    fn unknown_setting_fails_loudly() {
        let settings = Settings::new();
        let err = settings.get("no_such_setting").unwrap_err();
        assert!(matches!(err, SettingsError::UnknownSetting(_)));
    }

    #[test]
    fn unknown_override_key_rejected_at_construction() {
        let result =
            Settings::with_overrides([("MODERATE_COMENTS".to_string(), json!(false))]);
        assert!(result.is_err());
    }

    #[test]
    fn override_wins_and_can_be_cleared() {
        let settings = Settings::new();
        settings
            .set_override("moderate_comments", json!(false))
            .unwrap();
        assert!(!settings.moderate_comments().unwrap());

        settings.clear_override("moderate_comments");
        assert!(settings.moderate_comments().unwrap());
    }

    #[test]
    fn override_changes_are_visible_to_later_reads() {
        // No snapshot caching: a runtime override change must be observed
        // by the next lookup through the same handle.
        let settings = Settings::new();
        let alias = settings.clone();
        alias.set_override("posts_per_page", json!(25)).unwrap();
        assert_eq!(settings.posts_per_page().unwrap(), 25);
    }

    #[test]
    fn reaction_kinds_parse_as_triples() {
        let settings = Settings::new();
        let kinds = settings.reaction_kinds().unwrap();
        assert_eq!(kinds.len(), 6);
        assert_eq!(kinds[0].kind, "LIKE");
        assert_eq!(kinds[0].emoji, "👍");
        assert!(settings.is_valid_reaction_kind("WOW").unwrap());
        assert!(!settings.is_valid_reaction_kind("MEH").unwrap());
    }

    #[test]
    fn invalid_override_shape_is_reported() {
        let settings = Settings::new();
        settings
            .set_override("thumbnail_sizes", json!("not a list"))
            .unwrap();
        assert!(matches!(
            settings.thumbnail_sizes().unwrap_err(),
            SettingsError::InvalidShape { .. }
        ));
    }

    #[test]
    fn media_size_converts_to_bytes() {
        let settings = Settings::new();
        assert_eq!(settings.media_max_size_bytes().unwrap(), 50 * 1024 * 1024);
    }

    #[test]
    fn visibility_choices_expose_all_tiers() {
        let settings = Settings::new();
        let choices = settings.visibility_choices().unwrap();
        let values: Vec<&str> = choices.iter().map(|(v, _)| v.as_str()).collect();
        assert_eq!(
            values,
            ["PUBLIC", "PRIVATE", "UNLISTED", "FRIENDS", "CUSTOM"]
        );
    }
}
