use axum::extract::State;
use axum::{response::Html, routing::get, Json, Router};
use serde_json::json;
use std::fmt::Write;
use tracing::error;

use super::AppState;
use crate::db;
use crate::error::AppError;

const RECENT_DISTRIBUTIONS: i64 = 10;

const STYLE: &str = "body { font-family: Arial; padding: 20px; background: #f5f5f5; }
.container { max-width: 1200px; margin: 0 auto; background: white; padding: 20px; border-radius: 10px; }
.card { background: #f8f9fa; padding: 15px; margin: 10px 0; border-radius: 8px; border-left: 4px solid #667eea; }
.stats { display: grid; grid-template-columns: repeat(4, 1fr); gap: 20px; margin-bottom: 30px; }
.stat { background: white; padding: 20px; border-radius: 10px; text-align: center; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
.stat-number { font-size: 2rem; font-weight: bold; color: #667eea; }";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/token-dashboard", get(token_dashboard))
        .route("/test", get(health))
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, content: &str) -> Html<String> {
    Html(format!(
        "<html><head><title>{title}</title><style>{STYLE}</style></head>\
         <body><div class=\"container\">{content}</div></body></html>"
    ))
}

fn stat(value: impl std::fmt::Display, label: &str) -> String {
    format!("<div class=\"stat\"><div class=\"stat-number\">{value}</div><div>{label}</div></div>")
}

async fn dashboard(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let users = db::list_users(&mut conn).await?;

    let total_points: i64 = users.iter().map(|u| u.points).sum();
    let twitter_connected = users.iter().filter(|u| u.twitter_handle.is_some()).count();

    let mut content = String::from("<h1>Airdrop Dashboard</h1><div class=\"stats\">");
    content.push_str(&stat(users.len(), "Total Users"));
    content.push_str(&stat(total_points, "Total Points"));
    content.push_str(&stat(twitter_connected, "Twitter Connected"));
    content.push_str(&stat(
        "<a href=\"/token-dashboard\">Tokens</a>",
        "Token Management",
    ));
    content.push_str("</div><h2>Registered Users</h2>");

    for user in &users {
        let _ = write!(content, "<div class=\"card\">{}", escape(&user.wallet_address));
        if let Some(handle) = &user.twitter_handle {
            let _ = write!(content, " | Twitter: @{}", escape(handle));
        }
        if user.points > 0 {
            let _ = write!(content, " | Points: {}", user.points);
        }
        let _ = write!(
            content,
            " | Joined: {}</div>",
            user.registered_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(page("Dashboard", &content))
}

async fn token_dashboard(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let stats = db::distribution_stats(&mut conn).await?;
    let recent = db::recent_distributions(&mut conn, RECENT_DISTRIBUTIONS).await?;
    let token = &state.config.token;

    let mut content = format!(
        "<h1>{} ({}) Token Dashboard</h1>\
         <p>Distributions are simulated. Transaction hashes are not on-chain transactions.</p>\
         <div class=\"stats\">",
        escape(&token.token_name),
        escape(&token.token_symbol)
    );
    content.push_str(&stat(stats.total_users, "Participants"));
    content.push_str(&stat(stats.total_tokens_earned, "Tokens Earned"));
    content.push_str(&stat(stats.total_tokens_distributed, "Tokens Distributed"));
    content.push_str(&stat(stats.distributions_completed, "Distributions Completed"));
    content.push_str("</div>");

    let _ = write!(
        content,
        "<h2>Configuration</h2><div class=\"card\">Total supply: {} | Ratio: {} points = 1 token | \
         Minimum points: {} | Minimum claim: {} tokens | Distribution date: {}</div>",
        token.total_supply,
        token.points_to_tokens_ratio,
        token.min_points_for_distribution,
        token.min_claim_tokens,
        escape(&token.distribution_date)
    );

    content.push_str("<h2>Recent Distributions</h2>");
    if recent.is_empty() {
        content.push_str("<p>No distributions yet.</p>");
    }
    for dist in &recent {
        let _ = write!(
            content,
            "<div class=\"card\">{} | {} {} | Tx: {} | {}</div>",
            escape(&dist.wallet_address),
            dist.tokens_distributed,
            escape(&token.token_symbol),
            escape(dist.distribution_tx_hash.as_deref().unwrap_or("-")),
            dist.distribution_date
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default()
        );
    }

    Ok(page("Token Dashboard", &content))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let database = match db::ping(&state.pool).await {
        Ok(()) => "connected",
        Err(err) => {
            error!(error = %err, "database ping failed");
            "unavailable"
        }
    };
    let twitter_api = if state.twitter.is_configured() {
        "ready"
    } else {
        "not configured (simulation)"
    };

    Json(json!({
        "server": "running",
        "database": database,
        "twitter_api": twitter_api,
        "token_system": "active",
        "token_symbol": state.config.token.token_symbol,
    }))
}
