use axum::extract::{rejection::JsonRejection, Path, State};
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::{body, field, wallet_field, AppState};
use crate::models::{token::ClaimOutcome, user::NewUser};
use crate::{error::AppError, registry, tokens, wallet};

#[derive(Deserialize)]
struct JoinRequest {
    #[serde(default)]
    wallet_address: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    twitter_handle: Option<String>,
    #[serde(default)]
    referral_code: Option<String>,
}

#[derive(Deserialize)]
struct ClaimRequest {
    #[serde(default)]
    wallet_address: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/join-airdrop", post(join_airdrop))
        .route("/user-tokens/:wallet_address", get(user_tokens))
        .route("/profile/:wallet_address", get(user_profile))
        .route("/claim-tokens", post(claim_tokens))
}

async fn join_airdrop(
    State(state): State<AppState>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let req = body(payload)?;

    let wallet_address = field(req.wallet_address)
        .ok_or_else(|| AppError::validation("Wallet address is required"))?;
    if !wallet::is_valid(&wallet_address) {
        return Err(AppError::validation(
            "Invalid wallet address. Must start with 0x and be 42 characters.",
        ));
    }
    let wallet_address = wallet::normalize(&wallet_address);

    let new_user = NewUser {
        wallet_address,
        email: field(req.email),
        twitter_handle: field(req.twitter_handle),
        referral_code: field(req.referral_code),
    };
    let referral_code = registry::join(&state.pool, &state.config.token, new_user).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Successfully joined airdrop! Redirecting to tasks...",
        "referral_code": referral_code,
    })))
}

async fn user_tokens(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let wallet_address = wallet::normalize(&wallet_address);
    let view = tokens::user_tokens(&state.pool, &state.config.token, &wallet_address).await?;
    Ok(Json(json!(view)))
}

async fn user_profile(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let profile = registry::profile(&state.pool, &wallet::normalize(&wallet_address)).await?;
    Ok(Json(json!(profile)))
}

async fn claim_tokens(
    State(state): State<AppState>,
    payload: Result<Json<ClaimRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let req = body(payload)?;
    let wallet_address = wallet_field(req.wallet_address)
        .ok_or_else(|| AppError::validation("Wallet address required"))?;

    let token = &state.config.token;
    let response = match tokens::claim(&state.pool, token, &wallet_address).await? {
        ClaimOutcome::Distributed(dist) => json!({
            "success": true,
            "tokens": dist.tokens,
            "tx_hash": dist.tx_hash,
            "simulated": true,
            "message": format!(
                "{} {} tokens distributed successfully!",
                dist.tokens, token.token_symbol
            ),
        }),
        ClaimOutcome::Insufficient { earned, required } => json!({
            "success": false,
            "tokens_earned": earned,
            "message": format!(
                "Minimum {required} tokens required for distribution. You have {earned}."
            ),
        }),
    };

    Ok(Json(response))
}
