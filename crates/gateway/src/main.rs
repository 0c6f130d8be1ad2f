//! Webhook gateway for the journey engine.
//!
//! Serves the platform webhooks and admin endpoints, and runs the scheduler
//! loop alongside them. Every instance runs a scheduler; the lease picks
//! which one delivers.

mod config;
mod error;
mod routes;
mod sender;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use database::Database;
use journey_engine::{Engine, EngineConfig, Scheduler, SchedulerConfig};
use llm_brain::LlmBrain;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::sender::PlatformClients;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let engine_config = EngineConfig::from_env()?;
    let scheduler_config = SchedulerConfig::from_env()?;
    info!(addr = %config.addr, "Starting gateway");

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let brain = Arc::new(LlmBrain::from_env()?);
    let platforms = Arc::new(PlatformClients::new()?);

    let engine = Engine::new(
        db.pool().clone(),
        platforms.clone(),
        brain.clone(),
        brain.clone(),
        brain,
        engine_config,
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(engine.clone(), scheduler_config);
    let scheduler_task = tokio::spawn(scheduler.run_with_shutdown(async move {
        let _ = shutdown_rx.changed().await;
    }));

    if config.admin_token.is_none() {
        info!("ADMIN_TOKEN not set, admin routes disabled");
    }
    let admin_enabled = config.admin_token.is_some();
    let state = AppState::new(db.clone(), engine, platforms, config.admin_token.clone());

    let app = routes::router(admin_enabled)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!(addr = %config.addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_task.await {
        error!("Scheduler task failed: {}", e);
    }
    db.close().await;

    Ok(())
}
