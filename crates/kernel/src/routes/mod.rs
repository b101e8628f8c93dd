//! HTTP request handlers.
//!
//! Handlers are thin glue: decode the request, resolve the viewer, call
//! entity methods, encode the response. Business rules live on the models.

pub mod comment;
pub mod health;
pub mod helpers;
pub mod media;
pub mod moderation;
pub mod page;
pub mod post;
pub mod reaction;
pub mod taxonomy;

use axum::Router;

use crate::state::AppState;

/// Compose all route groups.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(post::router())
        .merge(page::router())
        .merge(comment::router())
        .merge(reaction::router())
        .merge(media::router())
        .merge(taxonomy::router())
        .merge(moderation::router())
}
