//! Database models.

pub mod category;
pub mod comment;
pub mod media;
pub mod page;
pub mod pending_comment;
pub mod post;
pub mod reaction;
pub mod tag;

pub use category::{Category, CategoryWithDepth, CreateCategory, UpdateCategory};
pub use comment::{Comment, CommentHistory, CreateComment};
pub use media::{AttachedMedia, CreateAttachment, MediaItem, MediaKind, PostMedia};
pub use page::{CreatePage, Page, UpdatePage};
pub use pending_comment::{CreatePendingComment, ModerationLog, PendingComment};
pub use post::{CreatePost, Post, UpdatePost, Visibility};
pub use reaction::{Reaction, ToggleOutcome};
pub use tag::{CreateTag, Tag, UpdateTag};

use serde::{Deserialize, Deserializer};

/// Deserialize a field that distinguishes "absent" from "set to null".
///
/// Plain `Option<Option<T>>` cannot make that distinction with serde's
/// default handling; update inputs use
/// `#[serde(default, deserialize_with = "double_option")]` on nullable
/// columns so a request can clear a value by sending `null`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
