//! Connection acceptor
//!
//! Owns the listening socket and the shared registry, and spawns one
//! independent task per accepted connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::handler::handle_connection;
use crate::registry::Registry;

/// The relay server
///
/// Created from a bound listener; `run*` consumes it and loops on
/// `accept` until the given shutdown future resolves (or forever).
pub struct RelayServer {
    listener: TcpListener,
    registry: Arc<Registry>,
    config: RelayConfig,
}

impl RelayServer {
    /// Wrap an already bound listener
    pub fn new(listener: TcpListener, config: RelayConfig) -> Self {
        Self {
            listener,
            registry: Arc::new(Registry::new()),
            config,
        }
    }

    /// Bind `config.listen_addr`; failure here is the only way the relay
    /// refuses to start.
    pub async fn bind(config: RelayConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        Ok(Self::new(listener, config))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle on the shared registry, e.g. for inspection in tests
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections forever
    pub async fn run(self) {
        self.run_until(std::future::pending()).await;
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already running are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let RelayServer {
            listener,
            registry,
            config,
        } = self;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Relay stopped accepting connections");
                    break;
                }
                accepted = listener.accept() => {
                    handle_accept_result(accepted, &registry, config);
                }
            }
        }
    }

    /// Accept connections until Ctrl-C
    pub async fn run_until_ctrl_c(self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to install Ctrl-C handler: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    }
}

fn handle_accept_result(
    result: std::io::Result<(TcpStream, SocketAddr)>,
    registry: &Arc<Registry>,
    config: RelayConfig,
) {
    match result {
        Ok((stream, addr)) => {
            debug!("New connection from {}", addr);
            let registry = Arc::clone(registry);

            // Spawn handler task for each connection
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, registry, config).await {
                    debug!("Connection from {} ended with error: {}", addr, e);
                }
            });
        }
        Err(e) => {
            error!("Failed to accept connection: {}", e);
        }
    }
}
