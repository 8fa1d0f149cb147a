//! SimuFolio HTTP Server
//!
//! Axum binary wiring the Telegram webhook, the bearer-authorized
//! notification sweep trigger, and the CoinGecko-backed market gateway.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simufolio_core::state::MemoryStateStore;
use simufolio_core::store::MemorySubscriptionStore;
use simufolio_core::{ConversationEngine, NotificationScheduler};
use simufolio_runtime::{CoinGeckoGateway, TelegramTransport};

use crate::config::ServerConfig;
use crate::handlers::{health_check, run_sweep, telegram_webhook};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;

    // Every collaborator is built here and handed to the core as a
    // dependency; nothing reaches for a hidden global connection.
    let market = Arc::new(CoinGeckoGateway::from_env()?);
    let transport = Arc::new(TelegramTransport::from_env()?);
    let subscriptions = Arc::new(MemorySubscriptionStore::new());
    let states = Arc::new(MemoryStateStore::new());

    let engine = Arc::new(ConversationEngine::new(
        market.clone(),
        subscriptions.clone(),
        states,
    ));
    let scheduler = Arc::new(NotificationScheduler::new(
        subscriptions,
        market,
        transport.clone(),
    ));

    let app_state = AppState {
        engine,
        scheduler,
        transport,
        config: Arc::new(config.clone()),
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/webhook/telegram", post(telegram_webhook))
        .route("/internal/sweep", post(run_sweep))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("🚀 simufolio server running on http://{}", config.bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health            - Health check");
    tracing::info!("  POST /webhook/telegram  - Telegram webhook");
    tracing::info!("  POST /internal/sweep    - Notification sweep (bearer auth)");

    axum::serve(listener, app).await?;

    Ok(())
}
