//! Countdown Engine - timer normalization and countdown computation for
//! smart-home dashboard cards
//! 
//! This is the main entry point for the countdown-engine server.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use countdown_engine::{
    api::create_router,
    config::{load_snapshot, Config},
    state::AppState,
    tasks::{countdown_ticker_task, snapshot_reload_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_engine={},tower_http=info", config.log_level()))
        .init();

    info!("Starting countdown-engine server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, tick={}ms, google_retention={}s",
          config.host, config.port, config.tick_millis, config.google_retention_secs);

    let card_config = config.load_card_config()?;
    let state = Arc::new(AppState::new(
        config.port,
        config.host.clone(),
        card_config,
        config.google_retention(),
    ));

    if let Some(path) = &config.snapshot_file {
        state.set_snapshot(load_snapshot(path)?).map_err(anyhow::Error::msg)?;

        let reload_state = Arc::clone(&state);
        let reload_path = path.clone();
        let reload_every = config.snapshot_reload_interval();
        tokio::spawn(async move {
            snapshot_reload_task(reload_state, reload_path, reload_every).await;
        });
    }

    // Start the countdown ticker background task
    let ticker_state = Arc::clone(&state);
    let tick_every = config.tick_interval();
    tokio::spawn(async move {
        countdown_ticker_task(ticker_state, tick_every).await;
    });

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET    /countdown          - Latest countdown view");
    info!("  GET    /config             - Card configuration");
    info!("  PUT    /config             - Replace card configuration");
    info!("  PUT    /snapshot           - Replace host snapshot");
    info!("  PUT    /states/:entity_id  - Upsert one entity state");
    info!("  GET    /timers/alexa       - Discoverable Alexa timers");
    info!("  GET    /timers/google      - Discoverable Google timers");
    info!("  GET    /timers/:entity_id  - Normalized timer data");
    info!("  DELETE /cache[/:entity_id] - Clear adapter caches");
    info!("  POST   /attach | /detach   - Enable or disable ticking");
    info!("  GET    /health             - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
