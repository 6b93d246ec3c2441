//! User registration and referral crediting.

use crate::config::TokenConfig;
use crate::error::AppError;
use crate::models::{
    task::TaskKind,
    user::{NewUser, UserProfile},
};
use crate::{db, referral, tasks, tokens};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

/// Attempts at drawing a referral code that is not already taken.
pub const MAX_CODE_ATTEMPTS: usize = 5;

/// Registers a user and credits the referrer, if any. Returns the new user's
/// referral code.
pub async fn register(
    pool: &SqlitePool,
    config: &TokenConfig,
    new_user: NewUser,
) -> Result<String, AppError> {
    let mut tx = db::begin_write(pool).await?;
    let code = register_in(&mut tx, config, &new_user, referral::generate).await?;
    tx.commit().await?;
    Ok(code)
}

/// Full onboarding for `/join-airdrop`: registration, task ledger, a
/// distribution record and the `join_airdrop` award, all or nothing.
pub async fn join(
    pool: &SqlitePool,
    config: &TokenConfig,
    new_user: NewUser,
) -> Result<String, AppError> {
    let wallet = new_user.wallet_address.clone();
    let mut tx = db::begin_write(pool).await?;

    let code = register_in(&mut tx, config, &new_user, referral::generate).await?;
    tasks::initialize_in(&mut tx, &wallet).await?;
    tokens::ensure_record(&mut tx, &wallet).await?;
    tasks::complete_in(&mut tx, config, &wallet, TaskKind::JoinAirdrop.as_str(), None).await?;

    tx.commit().await?;
    info!(wallet = %wallet, referral_code = %code, "user joined airdrop");
    Ok(code)
}

pub async fn profile(pool: &SqlitePool, wallet: &str) -> Result<UserProfile, AppError> {
    let mut conn = pool.acquire().await?;
    let user = db::find_user(&mut conn, wallet)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let referrals = db::referral_count(&mut conn, wallet).await?;
    Ok(UserProfile { user, referrals })
}

/// Registration against an open connection, normally a transaction.
///
/// `next_code` supplies candidate referral codes; a candidate that collides
/// with an existing code is discarded and another is drawn, up to
/// [`MAX_CODE_ATTEMPTS`].
pub async fn register_in<F>(
    conn: &mut SqliteConnection,
    config: &TokenConfig,
    new_user: &NewUser,
    mut next_code: F,
) -> Result<String, AppError>
where
    F: FnMut() -> String,
{
    let wallet = new_user.wallet_address.as_str();

    if db::user_exists(&mut *conn, wallet).await? {
        return Err(AppError::conflict("Wallet already registered"));
    }

    let used_code = new_user
        .referral_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let referrer = match used_code {
        Some(code) => db::wallet_by_referral_code(&mut *conn, code).await?,
        None => None,
    };
    if used_code.is_some() && referrer.is_none() {
        info!(wallet, "ignoring unknown referral code");
    }

    let now = Utc::now();
    let mut attempt = 0;
    let code = loop {
        attempt += 1;
        let candidate = next_code();
        let inserted = db::insert_user(
            &mut *conn,
            wallet,
            new_user.email.as_deref(),
            new_user.twitter_handle.as_deref(),
            &candidate,
            referrer.as_deref(),
            now,
        )
        .await;

        match inserted {
            Ok(()) => break candidate,
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                if err.message().contains("wallet_address") {
                    return Err(AppError::conflict("Wallet already registered"));
                }
                if attempt >= MAX_CODE_ATTEMPTS {
                    return Err(AppError::conflict(
                        "Could not allocate a unique referral code",
                    ));
                }
                warn!(wallet, attempt, "referral code collision, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    };

    if let (Some(referrer), Some(used_code)) = (referrer.as_deref(), used_code) {
        db::insert_referral(&mut *conn, referrer, wallet, used_code, now).await?;
        db::add_points(&mut *conn, referrer, config.referral_bonus_points).await?;
        tokens::recompute_earnings_in(&mut *conn, config, referrer).await?;
        info!(
            referrer,
            referred = wallet,
            bonus = config.referral_bonus_points,
            "referral credited"
        );
    }

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const ALICE: &str = "0x1111111111111111111111111111111111111111";
    const BOB: &str = "0x2222222222222222222222222222222222222222";

    fn user(wallet: &str, referral_code: Option<&str>) -> NewUser {
        NewUser {
            wallet_address: wallet.into(),
            referral_code: referral_code.map(String::from),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn duplicate_wallet_is_rejected() {
        let pool = db::memory_pool().await;
        let config = TokenConfig::default();

        assert!(register(&pool, &config, user(ALICE, None)).await.is_ok());
        let err = register(&pool, &config, user(ALICE, None)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn referral_credits_referrer_once() {
        let pool = db::memory_pool().await;
        let config = TokenConfig::default();

        let alice_code = register(&pool, &config, user(ALICE, None)).await.unwrap();
        let bob_code = register(&pool, &config, user(BOB, Some(&alice_code)))
            .await
            .unwrap();
        assert_ne!(alice_code, bob_code);

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(db::user_points(&mut conn, ALICE).await.unwrap(), Some(50));
        assert_eq!(db::user_points(&mut conn, BOB).await.unwrap(), Some(0));
        assert_eq!(
            db::referrer_of(&mut conn, BOB).await.unwrap().as_deref(),
            Some(ALICE)
        );
        let bob = db::find_user(&mut conn, BOB).await.unwrap().unwrap();
        assert_eq!(bob.referred_by.as_deref(), Some(ALICE));
        assert_eq!(db::referral_count(&mut conn, ALICE).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn profile_counts_referrals() {
        let pool = db::memory_pool().await;
        let config = TokenConfig::default();

        let alice_code = register(&pool, &config, user(ALICE, None)).await.unwrap();
        register(&pool, &config, user(BOB, Some(&alice_code))).await.unwrap();

        let alice = profile(&pool, ALICE).await.unwrap();
        assert_eq!(alice.referrals, 1);
        assert_eq!(alice.user.referral_code, alice_code);
        assert_eq!(alice.user.points, 50);

        let missing = profile(&pool, "0x3333333333333333333333333333333333333333").await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn unknown_or_blank_code_is_ignored() {
        let pool = db::memory_pool().await;
        let config = TokenConfig::default();

        register(&pool, &config, user(ALICE, Some("NOPE1234"))).await.unwrap();
        register(&pool, &config, user(BOB, Some("   "))).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert!(db::referrer_of(&mut conn, ALICE).await.unwrap().is_none());
        assert!(db::referrer_of(&mut conn, BOB).await.unwrap().is_none());
        let alice = db::find_user(&mut conn, ALICE).await.unwrap().unwrap();
        assert!(alice.referred_by.is_none());
    }

    #[tokio::test]
    async fn referral_bonus_refreshes_referrer_earnings() {
        let pool = db::memory_pool().await;
        let config = TokenConfig::default();

        let alice_code = join(&pool, &config, user(ALICE, None)).await.unwrap();
        join(&pool, &config, user(BOB, Some(&alice_code))).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let record = db::find_distribution(&mut conn, ALICE).await.unwrap().unwrap();
        assert_eq!(record.tokens_earned, 15);
    }

    #[tokio::test]
    async fn referral_failure_rolls_back_registration() {
        let pool = db::memory_pool().await;
        let config = TokenConfig::default();

        let alice_code = register(&pool, &config, user(ALICE, None)).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query(
            "CREATE TRIGGER block_referrals BEFORE INSERT ON referrals
             BEGIN SELECT RAISE(ABORT, 'referrals blocked'); END",
        )
        .execute(&mut *conn)
        .await
        .unwrap();
        drop(conn);

        let result = register(&pool, &config, user(BOB, Some(&alice_code))).await;
        assert!(matches!(result, Err(AppError::Storage(_))));

        let mut conn = pool.acquire().await.unwrap();
        assert!(!db::user_exists(&mut conn, BOB).await.unwrap());
        assert_eq!(db::user_points(&mut conn, ALICE).await.unwrap(), Some(0));
        assert_eq!(db::referral_count(&mut conn, ALICE).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_on_file_database_all_succeed() {
        let dir = tempfile::TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("airdrop.db").display());
        let pool = db::init_db(&url).await.unwrap();
        let config = Arc::new(TokenConfig::default());

        let handles: Vec<_> = (0..40u32)
            .map(|i| {
                let pool = pool.clone();
                let config = Arc::clone(&config);
                tokio::spawn(async move {
                    let wallet = format!("0x{i:040x}");
                    join(&pool, &config, user(&wallet, None)).await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut conn = pool.acquire().await.unwrap();
        let users = db::list_users(&mut conn).await.unwrap();
        assert_eq!(users.len(), 40);
        assert!(users.iter().all(|u| u.points == 100));
    }

    #[tokio::test]
    async fn colliding_code_is_redrawn() {
        let pool = db::memory_pool().await;
        let config = TokenConfig::default();

        let mut conn = pool.acquire().await.unwrap();
        let first = register_in(&mut conn, &config, &user(ALICE, None), || "AAAAAAAA".into())
            .await
            .unwrap();
        assert_eq!(first, "AAAAAAAA");

        let mut candidates = vec!["BBBBBBBB".to_string(), "AAAAAAAA".to_string()];
        let second = register_in(&mut conn, &config, &user(BOB, None), || {
            candidates.pop().unwrap()
        })
        .await
        .unwrap();
        assert_eq!(second, "BBBBBBBB");
    }

    #[tokio::test]
    async fn collisions_give_up_after_bounded_attempts() {
        let pool = db::memory_pool().await;
        let config = TokenConfig::default();

        let mut conn = pool.acquire().await.unwrap();
        register_in(&mut conn, &config, &user(ALICE, None), || "AAAAAAAA".into())
            .await
            .unwrap();

        let mut calls = 0;
        let err = register_in(&mut conn, &config, &user(BOB, None), || {
            calls += 1;
            "AAAAAAAA".into()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(calls, MAX_CODE_ATTEMPTS);
        assert!(!db::user_exists(&mut conn, BOB).await.unwrap());
    }

    #[tokio::test]
    async fn join_awards_join_task_and_prepares_ledger() {
        let pool = db::memory_pool().await;
        let config = TokenConfig::default();

        join(&pool, &config, user(ALICE, None)).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(db::user_points(&mut conn, ALICE).await.unwrap(), Some(100));
        assert_eq!(db::tasks_for(&mut conn, ALICE).await.unwrap().len(), 5);
        let record = db::find_distribution(&mut conn, ALICE).await.unwrap().unwrap();
        assert_eq!(record.tokens_earned, 10);
    }

    #[tokio::test]
    async fn rejoining_wallet_changes_nothing() {
        let pool = db::memory_pool().await;
        let config = TokenConfig::default();

        let alice_code = join(&pool, &config, user(ALICE, None)).await.unwrap();
        join(&pool, &config, user(BOB, Some(&alice_code))).await.unwrap();
        assert!(join(&pool, &config, user(BOB, Some(&alice_code))).await.is_err());

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(db::user_points(&mut conn, ALICE).await.unwrap(), Some(150));
        assert_eq!(db::referral_count(&mut conn, ALICE).await.unwrap(), 1);
    }
}
