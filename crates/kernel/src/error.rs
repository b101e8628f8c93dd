//! Application error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::settings::SettingsError;

/// Application errors.
///
/// Visibility denials are reported as `NotFound` so a hidden post is
/// indistinguishable from a missing one.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Permission(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Classify an error coming out of a model write.
    ///
    /// Unique-constraint violations (a concurrent request won a
    /// check-then-act race) become `Conflict` so the caller can retry or
    /// treat the operation as already done; anything else stays internal.
    pub fn from_write(err: anyhow::Error, what: &str) -> Self {
        if err
            .downcast_ref::<sqlx::Error>()
            .is_some_and(is_unique_violation)
        {
            AppError::Conflict(format!("{what} already exists"))
        } else {
            AppError::Internal(err)
        }
    }
}

/// Check whether a sqlx error is a unique-constraint violation (SQLSTATE 23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Permission(_) => StatusCode::FORBIDDEN,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Log full details server-side; keep the body vague for 500s.
        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "internal server error".to_string()
            }
            AppError::Configuration(e) => {
                tracing::error!(error = %e, "configuration error");
                self.to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn settings_errors_map_to_configuration() {
        let err: AppError = SettingsError::UnknownSetting("bogus".to_string()).into();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn from_write_wraps_plain_errors_as_internal() {
        let err = AppError::from_write(anyhow::anyhow!("boom"), "post slug");
        assert!(matches!(err, AppError::Internal(_)));
    }
}
