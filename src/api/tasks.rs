use axum::extract::{rejection::JsonRejection, Path, State};
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::{body, field, wallet_field, AppState};
use crate::error::AppError;
use crate::models::task::{Completion, TaskStatus};
use crate::{tasks, wallet};

#[derive(Deserialize)]
struct CompleteTaskRequest {
    #[serde(default)]
    wallet_address: Option<String>,
    #[serde(default)]
    task_name: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/complete-task", post(complete_task))
        .route("/tasks/:wallet_address", get(get_tasks))
}

async fn complete_task(
    State(state): State<AppState>,
    payload: Result<Json<CompleteTaskRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let req = body(payload)?;
    let wallet_address = wallet_field(req.wallet_address);
    let (Some(wallet_address), Some(task_name)) = (wallet_address, field(req.task_name)) else {
        return Err(AppError::validation("Missing parameters"));
    };

    let response = match tasks::complete(
        &state.pool,
        &state.config.token,
        &wallet_address,
        &task_name,
        None,
    )
    .await?
    {
        Completion::Completed { points } => json!({
            "success": true,
            "message": "Task completed successfully!",
            "points": points,
        }),
        Completion::AlreadyCompleted => json!({
            "success": false,
            "message": "Task already completed",
        }),
        Completion::NotFound => json!({
            "success": false,
            "message": "Task not found",
        }),
    };

    Ok(Json(response))
}

async fn get_tasks(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
) -> Result<Json<TaskStatus>, AppError> {
    let wallet_address = wallet::normalize(&wallet_address);
    Ok(Json(tasks::status(&state.pool, &wallet_address).await?))
}
