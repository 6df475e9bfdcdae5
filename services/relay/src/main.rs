use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use relay::config::RelayConfig;
use relay::engine::RelayEngine;
use relay::feed::FeedConnector;
use relay::store::MemoryStore;
use relay::ws::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!(version = relay::SERVICE_VERSION, "Starting market data relay");

    let config = RelayConfig::from_env();

    let (engine_tx, engine_rx) = mpsc::channel(1024);
    let (feed_tx, feed_rx) = mpsc::channel(32);

    let store = Arc::new(MemoryStore::new());
    let engine = RelayEngine::new(&config, store, feed_tx);
    tokio::spawn(engine.run(engine_rx));

    let connector = FeedConnector::new(
        config.upstream_url.clone(),
        config.reconnect_delay,
        engine_tx.clone(),
        feed_rx,
    );
    tokio::spawn(connector.run());

    let app = router(AppState {
        engine_tx,
        session_buffer: config.session_buffer,
    });

    let listener = TcpListener::bind(config.listen_addr).await?;
    tracing::info!("Listening on {}", config.listen_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
