//! Command-line arguments for the relay and the mock client

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::config::{RelayConfig, DEFAULT_ADDR};

/// Line-oriented chat/stamp relay
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct RelayArgs {
    /// Socket address to listen on. Use port 0 for an ephemeral port.
    #[arg(long, default_value = DEFAULT_ADDR)]
    pub listen: SocketAddr,

    /// Read/write deadline per socket operation, in seconds
    #[arg(long, default_value_t = 10)]
    pub deadline_secs: u64,
}

impl From<RelayArgs> for RelayConfig {
    fn from(args: RelayArgs) -> Self {
        RelayConfig::default()
            .with_listen_addr(args.listen)
            .with_deadline(Duration::from_secs(args.deadline_secs))
    }
}

/// Synthetic client that joins and then chats on a fixed interval
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct MockClientArgs {
    /// Display name to join with
    #[arg(long)]
    pub name: String,

    /// Local port to bind before connecting
    #[arg(long)]
    pub local_port: u16,

    /// Relay address
    #[arg(long, default_value = "127.0.0.1:50000")]
    pub server: SocketAddr,

    /// Delay between chat messages, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,
}
