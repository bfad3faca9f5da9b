//! Stamp Relay Library
//!
//! A minimal real-time relay: clients connect over TCP, claim a display
//! name, and exchange chat text, numeric "stamps" and presence events that
//! are broadcast to every connected client.
//!
//! # Protocol
//! Newline-terminated frames of the form `command:param,param,...`, with
//! free-form text carried as base64 tokens:
//! - client → server: `join:<name>`, `chat:<content>`, `stamp:<int>`
//! - server → client: `join:<name>`, `leave:<name>`, `users:<n1>,<n2>,...`,
//!   `chat:<name>,<content>`, `stamp:<name>,<int>`, `error:<message>`
//!
//! # Architecture
//! - `RelayServer` accepts connections and spawns one task per connection
//! - `Registry` is the single lock-protected table of live sessions; name
//!   uniqueness is checked and assigned in one critical section
//! - Each connection's `ProtocolHandler` validates frames and uses the
//!   `Broadcaster` to queue replies on session outboxes
//! - A writer task per connection drains its outbox onto the socket
//!
//! # Example
//! ```ignore
//! use stamp_relay::{RelayConfig, RelayServer};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = RelayServer::bind(RelayConfig::default()).await?;
//!     server.run_until_ctrl_c().await;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use broadcast::Broadcaster;
pub use codec::{decode, encode, DecodeError};
pub use config::RelayConfig;
pub use error::RelayError;
pub use handler::handle_connection;
pub use message::{Command, CommandMessage, ErrorCode, ServerMessage};
pub use protocol::{ProtocolHandler, SessionState};
pub use registry::Registry;
pub use server::RelayServer;
pub use session::Session;
pub use types::SessionId;
