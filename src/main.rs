//! Workout Log - chat-driven training journal
//!
//! A Rust backend implementing a per-user dialog state machine for
//! logging exercise notes by body part.

mod api;
mod button;
mod config;
mod db;
mod pagination;
mod router;
mod runtime;
mod session;
mod state_machine;

use api::{create_router, AppState};
use config::BotConfig;
use db::Database;
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workout_log=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = BotConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Initialize database
    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    if config.export_secret.is_none() {
        tracing::info!("WORKOUT_EXPORT_SECRET not set, /export disabled");
    }

    // Create application state
    let state = AppState::new(db, config.dialog_context(), config.export_secret.clone());

    // Evict abandoned dialogs
    if let Some(max_idle) = config.session_idle {
        state.dialogs.spawn_idle_sweeper(max_idle);
        tracing::info!(max_idle_secs = max_idle.as_secs(), "Idle session eviction enabled");
    }

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new().gzip(true).br(true).deflate(true).zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Workout log server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
