//! Host-supplied viewer identity.
//!
//! Loam never manages credentials. The embedding application (or an auth
//! proxy in front of the server) authenticates the request and forwards the
//! result in headers: `X-Viewer-Id` carries the viewer's UUID, and
//! `X-Viewer-Staff: 1` marks moderators. Absent headers mean anonymous.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

/// Header carrying the authenticated viewer's UUID.
pub const VIEWER_ID_HEADER: &str = "x-viewer-id";

/// Header marking the viewer as staff (moderator).
pub const VIEWER_STAFF_HEADER: &str = "x-viewer-staff";

/// The identity a request acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User { id: Uuid, staff: bool },
}

impl Viewer {
    /// A plain authenticated user (convenience for tests and embedding).
    pub fn user(id: Uuid) -> Self {
        Viewer::User { id, staff: false }
    }

    /// A staff (moderator) user.
    pub fn staff(id: Uuid) -> Self {
        Viewer::User { id, staff: true }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::User { .. })
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Viewer::User { staff: true, .. })
    }

    /// The viewer's id, if authenticated.
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Viewer::User { id, .. } => Some(*id),
            Viewer::Anonymous => None,
        }
    }

    /// Check whether the viewer is the given user.
    pub fn is(&self, user_id: Uuid) -> bool {
        self.user_id() == Some(user_id)
    }

    /// Require an authenticated viewer, returning its id.
    pub fn require_user(&self) -> Result<Uuid, AppError> {
        self.user_id().ok_or(AppError::Unauthorized)
    }

    /// Require a staff viewer, returning its id.
    pub fn require_staff(&self) -> Result<Uuid, AppError> {
        match self {
            Viewer::User { id, staff: true } => Ok(*id),
            Viewer::User { .. } => Err(AppError::Permission(
                "staff access required".to_string(),
            )),
            Viewer::Anonymous => Err(AppError::Unauthorized),
        }
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw_id) = parts.headers.get(VIEWER_ID_HEADER) else {
            return Ok(Viewer::Anonymous);
        };

        let id = raw_id
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .ok_or_else(|| {
                AppError::Validation(format!("{VIEWER_ID_HEADER} header is not a valid UUID"))
            })?;

        let staff = parts
            .headers
            .get(VIEWER_STAFF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim() == "1" || v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Viewer::User { id, staff })
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_no_user_id() {
        assert_eq!(Viewer::Anonymous.user_id(), None);
        assert!(!Viewer::Anonymous.is_authenticated());
        assert!(Viewer::Anonymous.require_user().is_err());
    }

    #[test]
    fn user_identity_is_equality_comparable() {
        let id = Uuid::now_v7();
        let viewer = Viewer::user(id);
        assert!(viewer.is(id));
        assert!(!viewer.is(Uuid::now_v7()));
        assert_eq!(viewer.require_user().unwrap(), id);
    }

    #[test]
    fn staff_requirement_distinguishes_permission_from_auth() {
        let id = Uuid::now_v7();
        assert!(matches!(
            Viewer::user(id).require_staff(),
            Err(AppError::Permission(_))
        ));
        assert!(matches!(
            Viewer::Anonymous.require_staff(),
            Err(AppError::Unauthorized)
        ));
        assert_eq!(Viewer::staff(id).require_staff().unwrap(), id);
    }
}
