use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Every failure is per-request and reported in the body with `success: false`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("social verification failed: {0}")]
    External(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    /// Message safe to hand back to the caller. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::Conflict(msg) | AppError::NotFound(msg) => {
                msg.clone()
            }
            AppError::External(_) => "Verification service unavailable. Please try again.".into(),
            AppError::Config(_) | AppError::Storage(_) | AppError::Migrate(_) => {
                "Server error. Please try again.".into()
            }
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::External(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Storage(_) | AppError::Migrate(_) | AppError::Config(_) => {
                tracing::error!(error = %self, "request failed");
            }
            AppError::External(_) => tracing::warn!(error = %self, "external call failed"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }

        let body = Json(json!({ "success": false, "message": self.public_message() }));
        (StatusCode::OK, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_not_leaked() {
        let err = AppError::Storage(sqlx::Error::RowNotFound);
        assert_eq!(err.public_message(), "Server error. Please try again.");
    }

    #[test]
    fn user_facing_errors_keep_their_message() {
        assert_eq!(
            AppError::conflict("Wallet already registered").public_message(),
            "Wallet already registered"
        );
        assert_eq!(AppError::validation("bad").to_string(), "bad");
    }

    #[test]
    fn failures_are_reported_with_ok_status() {
        let resp = AppError::not_found("User not found").into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
