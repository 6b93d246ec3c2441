use crate::error::AppError;
use crate::models::{
    task::{TaskKind, TaskRecord},
    token::{DistributionStats, RecentDistribution, TokenDistribution},
    user::{TwitterVerification, User, UserSummary},
};
use chrono::{DateTime, Utc};
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Sqlite, SqliteConnection, SqlitePool, Transaction,
};
use std::str::FromStr;
use std::time::Duration;

pub static MIGRATOR: Migrator = sqlx::migrate!();

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn init_db(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;

    Ok(pool)
}

/// Transaction holding the write lock from `BEGIN`.
///
/// A deferred transaction that reads first and writes later is failed with
/// `SQLITE_BUSY` instead of waiting when another writer holds the lock.
pub async fn begin_write(
    pool: &SqlitePool,
) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

pub async fn ping(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

// Users

pub async fn insert_user(
    conn: &mut SqliteConnection,
    wallet: &str,
    email: Option<&str>,
    twitter_handle: Option<&str>,
    referral_code: &str,
    referred_by: Option<&str>,
    registered_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users
         (wallet_address, email, twitter_handle, referral_code, referred_by, registered_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(wallet)
    .bind(email)
    .bind(twitter_handle)
    .bind(referral_code)
    .bind(referred_by)
    .bind(registered_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find_user(
    conn: &mut SqliteConnection,
    wallet: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT wallet_address, email, twitter_handle, twitter_id, twitter_verified,
                referral_code, referred_by, points, is_verified, registered_at
         FROM users WHERE wallet_address = ?",
    )
    .bind(wallet)
    .fetch_optional(conn)
    .await
}

pub async fn user_exists(conn: &mut SqliteConnection, wallet: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE wallet_address = ?")
        .bind(wallet)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

pub async fn wallet_by_referral_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT wallet_address FROM users WHERE referral_code = ?")
            .bind(code)
            .fetch_optional(conn)
            .await?;
    Ok(row.map(|r| r.0))
}

pub async fn user_points(
    conn: &mut SqliteConnection,
    wallet: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT points FROM users WHERE wallet_address = ?")
        .bind(wallet)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|r| r.0))
}

pub async fn add_points(
    conn: &mut SqliteConnection,
    wallet: &str,
    points: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET points = points + ? WHERE wallet_address = ?")
        .bind(points)
        .bind(wallet)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn reset_points(conn: &mut SqliteConnection, wallet: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET points = 0 WHERE wallet_address = ?")
        .bind(wallet)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn list_users(conn: &mut SqliteConnection) -> Result<Vec<UserSummary>, sqlx::Error> {
    sqlx::query_as::<_, UserSummary>(
        "SELECT wallet_address, twitter_handle, points, registered_at
         FROM users ORDER BY registered_at DESC",
    )
    .fetch_all(conn)
    .await
}

// Referrals

pub async fn insert_referral(
    conn: &mut SqliteConnection,
    referrer: &str,
    referred: &str,
    code: &str,
    created_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO referrals (referrer_wallet, referred_wallet, referral_code, created_at)
         VALUES (?, ?, ?, ?)",
    )
    .bind(referrer)
    .bind(referred)
    .bind(code)
    .bind(created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn referrer_of(
    conn: &mut SqliteConnection,
    referred: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT referrer_wallet FROM referrals WHERE referred_wallet = ?")
            .bind(referred)
            .fetch_optional(conn)
            .await?;
    Ok(row.map(|r| r.0))
}

pub async fn referral_count(
    conn: &mut SqliteConnection,
    referrer: &str,
) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM referrals WHERE referrer_wallet = ?")
            .bind(referrer)
            .fetch_one(conn)
            .await?;
    Ok(count)
}

// Tasks

pub async fn insert_task_if_absent(
    conn: &mut SqliteConnection,
    wallet: &str,
    task: TaskKind,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO user_tasks (wallet_address, task_name) VALUES (?, ?)")
        .bind(wallet)
        .bind(task.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn task_completed(
    conn: &mut SqliteConnection,
    wallet: &str,
    task: TaskKind,
) -> Result<Option<bool>, sqlx::Error> {
    let row: Option<(bool,)> = sqlx::query_as(
        "SELECT completed FROM user_tasks WHERE wallet_address = ? AND task_name = ?",
    )
    .bind(wallet)
    .bind(task.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|r| r.0))
}

/// Flips a pending record to completed. Returns false if nothing was pending.
pub async fn mark_task_completed(
    conn: &mut SqliteConnection,
    wallet: &str,
    task: TaskKind,
    proof: Option<&str>,
    completed_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE user_tasks
         SET completed = TRUE, completed_at = ?, proof = COALESCE(?, proof)
         WHERE wallet_address = ? AND task_name = ? AND completed = FALSE",
    )
    .bind(completed_at)
    .bind(proof)
    .bind(wallet)
    .bind(task.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn tasks_for(
    conn: &mut SqliteConnection,
    wallet: &str,
) -> Result<Vec<TaskRecord>, sqlx::Error> {
    sqlx::query_as::<_, TaskRecord>(
        "SELECT task_name, completed, completed_at FROM user_tasks WHERE wallet_address = ?",
    )
    .bind(wallet)
    .fetch_all(conn)
    .await
}

pub async fn task_proof(
    conn: &mut SqliteConnection,
    wallet: &str,
    task: TaskKind,
) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(Option<String>,)> = sqlx::query_as(
        "SELECT proof FROM user_tasks WHERE wallet_address = ? AND task_name = ?",
    )
    .bind(wallet)
    .bind(task.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(row.and_then(|r| r.0))
}

// Token distribution

pub async fn insert_distribution_if_absent(
    conn: &mut SqliteConnection,
    wallet: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO token_distribution (wallet_address) VALUES (?)")
        .bind(wallet)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_tokens_earned(
    conn: &mut SqliteConnection,
    wallet: &str,
    tokens: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE token_distribution SET tokens_earned = ? WHERE wallet_address = ?")
        .bind(tokens)
        .bind(wallet)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn record_distribution(
    conn: &mut SqliteConnection,
    wallet: &str,
    tokens: i64,
    tx_hash: &str,
    points_used: i64,
    distributed_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE token_distribution
         SET tokens_distributed = ?,
             distribution_tx_hash = ?,
             distribution_status = 'completed',
             distribution_date = ?,
             points_used = ?
         WHERE wallet_address = ?",
    )
    .bind(tokens)
    .bind(tx_hash)
    .bind(distributed_at)
    .bind(points_used)
    .bind(wallet)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find_distribution(
    conn: &mut SqliteConnection,
    wallet: &str,
) -> Result<Option<TokenDistribution>, sqlx::Error> {
    sqlx::query_as::<_, TokenDistribution>(
        "SELECT wallet_address, tokens_earned, tokens_distributed, distribution_tx_hash,
                distribution_status, distribution_date, points_used
         FROM token_distribution WHERE wallet_address = ?",
    )
    .bind(wallet)
    .fetch_optional(conn)
    .await
}

pub async fn distribution_stats(
    conn: &mut SqliteConnection,
) -> Result<DistributionStats, sqlx::Error> {
    sqlx::query_as::<_, DistributionStats>(
        "SELECT COUNT(*) AS total_users,
                COALESCE(SUM(tokens_earned), 0) AS total_tokens_earned,
                COALESCE(SUM(tokens_distributed), 0) AS total_tokens_distributed,
                COUNT(CASE WHEN distribution_status = 'completed' THEN 1 END)
                    AS distributions_completed
         FROM token_distribution",
    )
    .fetch_one(conn)
    .await
}

pub async fn recent_distributions(
    conn: &mut SqliteConnection,
    limit: i64,
) -> Result<Vec<RecentDistribution>, sqlx::Error> {
    sqlx::query_as::<_, RecentDistribution>(
        "SELECT wallet_address, tokens_distributed, distribution_tx_hash, distribution_date
         FROM token_distribution
         WHERE distribution_status = 'completed'
         ORDER BY distribution_date DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(conn)
    .await
}

// Twitter verification

/// Upserts the verification row; follow and retweet flags only ever turn on.
pub async fn save_twitter_verification(
    conn: &mut SqliteConnection,
    verification: &TwitterVerification,
    verified_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO twitter_verification
         (wallet_address, twitter_handle, twitter_id, follower_count,
          following_project, retweeted_post, verified_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (wallet_address, twitter_handle) DO UPDATE SET
             twitter_id = excluded.twitter_id,
             follower_count = excluded.follower_count,
             following_project = following_project OR excluded.following_project,
             retweeted_post = retweeted_post OR excluded.retweeted_post,
             verified_at = excluded.verified_at",
    )
    .bind(&verification.wallet_address)
    .bind(&verification.twitter_handle)
    .bind(&verification.twitter_id)
    .bind(verification.follower_count)
    .bind(verification.following_project)
    .bind(verification.retweeted_post)
    .bind(verified_at)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE users SET twitter_handle = ?, twitter_id = ?, twitter_verified = TRUE
         WHERE wallet_address = ?",
    )
    .bind(&verification.twitter_handle)
    .bind(&verification.twitter_id)
    .bind(&verification.wallet_address)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<std::time::Duration>)
        .max_lifetime(None::<std::time::Duration>)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    MIGRATOR.run(&pool).await.unwrap();
    pool
}
