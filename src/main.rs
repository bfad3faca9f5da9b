//! Stamp Relay - Entry Point
//!
//! Binds the listener and runs the accept loop until Ctrl-C.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stamp_relay::cli::RelayArgs;
use stamp_relay::{RelayConfig, RelayServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=stamp_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stamp_relay=info")),
        )
        .init();

    let config = RelayConfig::from(RelayArgs::parse());

    let server = RelayServer::bind(config).await?;
    info!("Relay listening on {}", server.local_addr()?);

    server.run_until_ctrl_c().await;
    Ok(())
}
