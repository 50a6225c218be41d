use imagesim::{create_router, init, AppState, ClipEncoder, Config};

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up a local .env before reading the configuration
    dotenv::dotenv().ok();
    init()?;

    let config = Config::from_env()?;
    log::debug!("Configuration: {:?}", config);

    // Load the model once; it is shared read-only by every request
    let model_path = config.model_path.clone();
    let encoder = tokio::task::spawn_blocking(move || ClipEncoder::load(&model_path))
        .await?
        .with_context(|| format!("loading model from {}", config.model_path.display()))?;

    let addr = config.bind_addr();
    let state = AppState::with_config(config, Arc::new(encoder));
    let app = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    log::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}
