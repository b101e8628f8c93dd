//! Shared helpers for request handlers.

use serde::Deserialize;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{Post, Visibility};
use crate::viewer::Viewer;

/// Common pagination query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Turn 1-based page parameters into a clamped (limit, offset) pair.
pub fn paginate(query: &PageQuery, default_per_page: i64) -> (i64, i64) {
    let per_page = query.per_page.unwrap_or(default_per_page).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    (per_page, (page - 1) * per_page)
}

/// Gate a post behind the visibility predicate.
///
/// Fetches the allow list only when the tier consults it, then evaluates
/// [`Post::can_view`]. Denial is `NotFound` — a hidden post must be
/// indistinguishable from a missing one.
pub async fn require_visible(pool: &PgPool, post: Post, viewer: &Viewer) -> Result<Post, AppError> {
    let allowed = if post.visibility == Visibility::Custom {
        Post::allowed_user_ids(pool, post.id)
            .await
            .map_err(AppError::Internal)?
    } else {
        Vec::new()
    };

    if post.can_view(viewer, &allowed) {
        Ok(post)
    } else {
        Err(AppError::NotFound)
    }
}

/// First address in an `X-Forwarded-For` header, if present.
pub fn client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The request's User-Agent header, if present.
pub fn user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let (limit, offset) = paginate(&PageQuery::default(), 10);
        assert_eq!((limit, offset), (10, 0));

        let (limit, offset) = paginate(
            &PageQuery {
                page: Some(3),
                per_page: Some(20),
            },
            10,
        );
        assert_eq!((limit, offset), (20, 40));

        let (limit, _) = paginate(
            &PageQuery {
                page: None,
                per_page: Some(10_000),
            },
            10,
        );
        assert_eq!(limit, 100);

        let (_, offset) = paginate(
            &PageQuery {
                page: Some(-5),
                per_page: None,
            },
            10,
        );
        assert_eq!(offset, 0);
    }

    #[test]
    fn client_ip_takes_first_forwarded_hop() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.9, 10.0.0.1".parse().unwrap(),
        );
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.9"));

        assert_eq!(client_ip(&axum::http::HeaderMap::new()), None);
    }
}
