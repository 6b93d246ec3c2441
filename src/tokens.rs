//! Points-to-tokens accounting and the simulated distribution.
//!
//! Distributions are bookkeeping only. The transaction hash recorded on a
//! claim is derived locally and never corresponds to an on-chain transfer.

use crate::config::TokenConfig;
use crate::db;
use crate::error::AppError;
use crate::models::token::{ClaimOutcome, Distribution, UserTokens};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

/// Floor division of points by the configured ratio.
pub fn tokens_earned(points: i64, ratio: i64) -> i64 {
    if points <= 0 || ratio <= 0 {
        return 0;
    }
    points / ratio
}

/// `0x`-prefixed SHA-256 over wallet, amount and wall-clock time.
pub fn simulated_tx_hash(wallet: &str, tokens: i64, at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{wallet}{tokens}{}", at.timestamp_micros()).as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

pub async fn ensure_record(conn: &mut SqliteConnection, wallet: &str) -> Result<(), AppError> {
    db::insert_distribution_if_absent(conn, wallet).await?;
    Ok(())
}

/// Stores `tokens_earned` for the wallet's current points and returns it.
/// A wallet without a user row earns nothing.
pub async fn recompute_earnings_in(
    conn: &mut SqliteConnection,
    config: &TokenConfig,
    wallet: &str,
) -> Result<i64, AppError> {
    let Some(points) = db::user_points(&mut *conn, wallet).await? else {
        return Ok(0);
    };
    let earned = tokens_earned(points, config.points_to_tokens_ratio);
    db::set_tokens_earned(conn, wallet, earned).await?;
    debug!(wallet, points, earned, "recomputed token earnings");
    Ok(earned)
}

pub async fn recompute_earnings(
    pool: &SqlitePool,
    config: &TokenConfig,
    wallet: &str,
) -> Result<i64, AppError> {
    let mut conn = pool.acquire().await?;
    recompute_earnings_in(&mut conn, config, wallet).await
}

/// Converts the wallet's points into a recorded distribution.
///
/// Runs in a single transaction. Below the claim threshold nothing but the
/// earned-token figure is written; points and status stay as they were.
pub async fn claim(
    pool: &SqlitePool,
    config: &TokenConfig,
    wallet: &str,
) -> Result<ClaimOutcome, AppError> {
    let mut tx = db::begin_write(pool).await?;

    if !db::user_exists(&mut tx, wallet).await? {
        return Err(AppError::not_found("User not found"));
    }

    ensure_record(&mut tx, wallet).await?;
    let earned = recompute_earnings_in(&mut tx, config, wallet).await?;

    if earned < config.min_claim_tokens {
        tx.commit().await?;
        return Ok(ClaimOutcome::Insufficient {
            earned,
            required: config.min_claim_tokens,
        });
    }

    let now = Utc::now();
    let tx_hash = simulated_tx_hash(wallet, earned, now);
    let points_used = earned * config.points_to_tokens_ratio;

    db::record_distribution(&mut tx, wallet, earned, &tx_hash, points_used, now).await?;
    db::reset_points(&mut tx, wallet).await?;
    tx.commit().await?;

    info!(wallet, tokens = earned, points_used, %tx_hash, "simulated token distribution recorded");

    Ok(ClaimOutcome::Distributed(Distribution {
        tokens: earned,
        tx_hash,
        points_used,
    }))
}

pub async fn user_tokens(
    pool: &SqlitePool,
    config: &TokenConfig,
    wallet: &str,
) -> Result<UserTokens, AppError> {
    let mut conn = pool.acquire().await?;

    let points = db::user_points(&mut conn, wallet)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let record = db::find_distribution(&mut conn, wallet).await?;

    Ok(UserTokens {
        points,
        tokens_earned: record.as_ref().map_or(0, |r| r.tokens_earned),
        tokens_distributed: record.as_ref().map_or(0, |r| r.tokens_distributed),
        distribution_status: record.as_ref().and_then(|r| r.status()),
        tx_hash: record.and_then(|r| r.distribution_tx_hash),
        points_to_tokens_ratio: config.points_to_tokens_ratio,
        next_tokens: tokens_earned(points, config.points_to_tokens_ratio),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{token::DistributionStatus, user::NewUser};
    use crate::registry;

    const WALLET: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    async fn seeded(points: i64) -> (SqlitePool, TokenConfig) {
        let pool = db::memory_pool().await;
        let config = TokenConfig::default();
        registry::register(
            &pool,
            &config,
            NewUser {
                wallet_address: WALLET.into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        db::add_points(&mut conn, WALLET, points).await.unwrap();
        ensure_record(&mut conn, WALLET).await.unwrap();
        drop(conn);
        (pool, config)
    }

    #[test]
    fn tokens_use_floor_division() {
        assert_eq!(tokens_earned(95, 10), 9);
        assert_eq!(tokens_earned(100, 10), 10);
        assert_eq!(tokens_earned(0, 10), 0);
        assert_eq!(tokens_earned(9, 10), 0);
        for points in 0..500 {
            assert_eq!(tokens_earned(points, 7), points / 7);
        }
    }

    #[test]
    fn simulated_hash_is_deterministic_for_same_inputs() {
        let at = Utc::now();
        let a = simulated_tx_hash(WALLET, 12, at);
        assert_eq!(a, simulated_tx_hash(WALLET, 12, at));
        assert_ne!(a, simulated_tx_hash(WALLET, 13, at));
        assert_eq!(a.len(), 66);
        assert!(a.starts_with("0x"));
        assert!(a[2..].bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn recompute_tracks_current_points() {
        let (pool, config) = seeded(95).await;
        assert_eq!(recompute_earnings(&pool, &config, WALLET).await.unwrap(), 9);

        let mut conn = pool.acquire().await.unwrap();
        let record = db::find_distribution(&mut conn, WALLET).await.unwrap().unwrap();
        assert_eq!(record.tokens_earned, 9);
    }

    #[tokio::test]
    async fn claim_below_threshold_changes_nothing() {
        let (pool, config) = seeded(95).await;

        let outcome = claim(&pool, &config, WALLET).await.unwrap();
        assert!(matches!(
            outcome,
            ClaimOutcome::Insufficient { earned: 9, required: 10 }
        ));

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(db::user_points(&mut conn, WALLET).await.unwrap(), Some(95));
        let record = db::find_distribution(&mut conn, WALLET).await.unwrap().unwrap();
        assert_eq!(record.status(), Some(DistributionStatus::Pending));
        assert_eq!(record.tokens_distributed, 0);
        assert!(record.distribution_tx_hash.is_none());
    }

    #[tokio::test]
    async fn claim_at_threshold_distributes_and_resets_points() {
        let (pool, config) = seeded(125).await;

        let ClaimOutcome::Distributed(dist) = claim(&pool, &config, WALLET).await.unwrap() else {
            panic!("expected a distribution");
        };
        assert_eq!(dist.tokens, 12);
        assert_eq!(dist.points_used, 120);

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(db::user_points(&mut conn, WALLET).await.unwrap(), Some(0));
        let record = db::find_distribution(&mut conn, WALLET).await.unwrap().unwrap();
        assert_eq!(record.status(), Some(DistributionStatus::Completed));
        assert_eq!(record.tokens_distributed, 12);
        assert_eq!(record.points_used, 120);
        assert_eq!(record.distribution_tx_hash.as_deref(), Some(dist.tx_hash.as_str()));
        assert!(record.distribution_date.is_some());
    }

    #[tokio::test]
    async fn failed_point_reset_rolls_back_claim() {
        let (pool, config) = seeded(125).await;
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query(
            "CREATE TRIGGER block_reset BEFORE UPDATE OF points ON users
             WHEN NEW.points = 0
             BEGIN SELECT RAISE(ABORT, 'reset blocked'); END",
        )
        .execute(&mut *conn)
        .await
        .unwrap();
        drop(conn);

        let result = claim(&pool, &config, WALLET).await;
        assert!(matches!(result, Err(AppError::Storage(_))));

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(db::user_points(&mut conn, WALLET).await.unwrap(), Some(125));
        let record = db::find_distribution(&mut conn, WALLET).await.unwrap().unwrap();
        assert_eq!(record.status(), Some(DistributionStatus::Pending));
        assert_eq!(record.tokens_distributed, 0);
        assert_eq!(record.tokens_earned, 0);
        assert!(record.distribution_tx_hash.is_none());
    }

    #[tokio::test]
    async fn reclaim_without_new_points_fails_threshold() {
        let (pool, config) = seeded(120).await;
        assert!(matches!(
            claim(&pool, &config, WALLET).await.unwrap(),
            ClaimOutcome::Distributed(_)
        ));
        assert!(matches!(
            claim(&pool, &config, WALLET).await.unwrap(),
            ClaimOutcome::Insufficient { earned: 0, .. }
        ));
    }

    #[tokio::test]
    async fn claim_creates_missing_record() {
        let pool = db::memory_pool().await;
        let config = TokenConfig::default();
        registry::register(
            &pool,
            &config,
            NewUser {
                wallet_address: WALLET.into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let outcome = claim(&pool, &config, WALLET).await.unwrap();
        assert!(matches!(outcome, ClaimOutcome::Insufficient { earned: 0, .. }));

        let mut conn = pool.acquire().await.unwrap();
        assert!(db::find_distribution(&mut conn, WALLET).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn claim_for_unknown_wallet_is_not_found() {
        let pool = db::memory_pool().await;
        let err = claim(&pool, &TokenConfig::default(), WALLET).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn user_tokens_reports_next_tokens_from_points() {
        let (pool, config) = seeded(87).await;
        recompute_earnings(&pool, &config, WALLET).await.unwrap();

        let view = user_tokens(&pool, &config, WALLET).await.unwrap();
        assert_eq!(view.points, 87);
        assert_eq!(view.tokens_earned, 8);
        assert_eq!(view.next_tokens, 8);
        assert_eq!(view.points_to_tokens_ratio, 10);
        assert_eq!(view.distribution_status, Some(DistributionStatus::Pending));
        assert!(view.tx_hash.is_none());
    }
}
