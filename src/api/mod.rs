pub mod admin;
pub mod tasks;
pub mod twitter;
pub mod user;

use crate::config::Config;
use crate::error::AppError;
use crate::twitter::TwitterClient;
use crate::wallet;
use axum::{extract::rejection::JsonRejection, Json, Router};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub twitter: Arc<TwitterClient>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config, twitter: TwitterClient) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            twitter: Arc::new(twitter),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(user::routes())
        .merge(tasks::routes())
        .merge(twitter::routes())
        .merge(admin::routes())
        .with_state(state)
}

/// Unwraps a JSON body, turning a missing or malformed one into a
/// validation failure instead of axum's 4xx rejection.
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|_| AppError::validation("No data received"))
}

/// Trimmed, non-empty form of an optional request field.
pub(crate) fn field(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Wallet field in the lowercase form used as the stored identity.
pub(crate) fn wallet_field(value: Option<String>) -> Option<String> {
    field(value).map(|w| wallet::normalize(&w))
}
