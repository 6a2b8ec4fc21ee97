//! RippleKV server binary.
//!
//! Sets up logging, the shared store and the TCP listener, then serves each
//! client on its own task until Ctrl+C.

use clap::Parser;
use ripplekv::commands::CommandHandler;
use ripplekv::connection::{handle_connection, ConnectionStats};
use ripplekv::storage::StorageEngine;
use ripplekv::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // RUST_LOG wins over --log-level when set
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Created once, shared by every connection
    let storage = Arc::new(StorageEngine::new());
    let handler = CommandHandler::new(Arc::clone(&storage));
    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(
        version = ripplekv::VERSION,
        address = %config.bind_address(),
        "RippleKV ready to accept connections"
    );

    tokio::select! {
        _ = accept_loop(listener, handler, Arc::clone(&stats)) => {}
        result = signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received, stopping server...");
        }
    }

    info!(
        connections = stats.connections_accepted.load(std::sync::atomic::Ordering::Relaxed),
        keys = storage.len(),
        "Server shutdown complete"
    );
    Ok(())
}

/// Accepts connections forever, one task per client.
async fn accept_loop(listener: TcpListener, handler: CommandHandler, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = handler.clone();
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
