//! Per-user task ledger over the fixed catalog in [`TaskKind`].

use crate::config::TokenConfig;
use crate::error::AppError;
use crate::models::task::{
    Completion, TaskDescription, TaskKind, TaskProgress, TaskState, TaskStatus,
};
use crate::{db, tokens};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Inserts a pending record for every catalog task the wallet lacks.
pub async fn initialize_in(conn: &mut SqliteConnection, wallet: &str) -> Result<(), AppError> {
    for task in TaskKind::ALL {
        db::insert_task_if_absent(&mut *conn, wallet, task).await?;
    }
    Ok(())
}

pub async fn initialize(pool: &SqlitePool, wallet: &str) -> Result<(), AppError> {
    let mut tx = db::begin_write(pool).await?;
    initialize_in(&mut tx, wallet).await?;
    tx.commit().await?;
    Ok(())
}

/// Marks a task completed and awards its points exactly once.
///
/// Completing an already completed task is a no-op reported as
/// [`Completion::AlreadyCompleted`].
pub async fn complete_in(
    conn: &mut SqliteConnection,
    config: &TokenConfig,
    wallet: &str,
    task_name: &str,
    proof: Option<&serde_json::Value>,
) -> Result<Completion, AppError> {
    let Ok(task) = task_name.parse::<TaskKind>() else {
        debug!(wallet, task_name, "unknown task");
        return Ok(Completion::NotFound);
    };

    match db::task_completed(&mut *conn, wallet, task).await? {
        None => return Ok(Completion::NotFound),
        Some(true) => return Ok(Completion::AlreadyCompleted),
        Some(false) => {}
    }

    let proof = proof.map(|p| p.to_string());
    if !db::mark_task_completed(&mut *conn, wallet, task, proof.as_deref(), Utc::now()).await? {
        return Ok(Completion::AlreadyCompleted);
    }

    db::add_points(&mut *conn, wallet, task.points()).await?;
    tokens::recompute_earnings_in(&mut *conn, config, wallet).await?;

    info!(wallet, task = %task, points = task.points(), "task completed");
    Ok(Completion::Completed {
        points: task.points(),
    })
}

pub async fn complete(
    pool: &SqlitePool,
    config: &TokenConfig,
    wallet: &str,
    task_name: &str,
    proof: Option<&serde_json::Value>,
) -> Result<Completion, AppError> {
    let mut tx = db::begin_write(pool).await?;
    let outcome = complete_in(&mut tx, config, wallet, task_name, proof).await?;
    tx.commit().await?;
    Ok(outcome)
}

pub fn descriptions() -> BTreeMap<&'static str, TaskDescription> {
    TaskKind::ALL
        .into_iter()
        .map(|t| {
            (
                t.as_str(),
                TaskDescription {
                    name: t.title(),
                    points: t.points(),
                },
            )
        })
        .collect()
}

/// Progress over the catalog. Points are recomputed from the catalog for the
/// completed tasks, not read from the user's balance.
pub fn progress(tasks: &BTreeMap<String, TaskState>) -> TaskProgress {
    let total = TaskKind::ALL.len();
    let completed_kinds: Vec<TaskKind> = tasks
        .iter()
        .filter(|(_, state)| state.completed)
        .filter_map(|(name, _)| name.parse::<TaskKind>().ok())
        .collect();
    let completed = completed_kinds.len();

    TaskProgress {
        completed,
        total,
        percentage: if total > 0 { completed * 100 / total } else { 0 },
        points: completed_kinds.iter().map(|t| t.points()).sum(),
        max_points: TaskKind::max_points(),
    }
}

pub async fn status(pool: &SqlitePool, wallet: &str) -> Result<TaskStatus, AppError> {
    let mut conn = pool.acquire().await?;
    let tasks: BTreeMap<String, TaskState> = db::tasks_for(&mut conn, wallet)
        .await?
        .into_iter()
        .map(|r| {
            (
                r.task_name,
                TaskState {
                    completed: r.completed,
                    completed_at: r.completed_at,
                },
            )
        })
        .collect();

    let progress = progress(&tasks);
    Ok(TaskStatus {
        tasks,
        descriptions: descriptions(),
        progress,
    })
}
