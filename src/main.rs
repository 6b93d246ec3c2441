use dotenvy::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use airdrop_server::api::{self, AppState};
use airdrop_server::config::Config;
use airdrop_server::db;
use airdrop_server::twitter::TwitterClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("airdrop_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let pool = db::init_db(&config.database_url).await?;
    let twitter = TwitterClient::new(config.twitter.clone())?;

    if twitter.is_configured() && !config.twitter.username.is_empty() {
        info!(project = %config.twitter.username, "twitter api configured");
    } else {
        info!("twitter api not configured, verification runs in simulation mode");
    }
    info!(
        symbol = %config.token.token_symbol,
        ratio = config.token.points_to_tokens_ratio,
        min_claim = config.token.min_claim_tokens,
        "token system ready (distributions are simulated)"
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let addr = config.bind_addr();
    let app = api::router(AppState::new(pool, config, twitter))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&addr).await?;
    info!("server running at http://{addr}");

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
