//! Frame delivery
//!
//! Sends one message to a single session or to every session in a
//! registry snapshot. Delivery failures are logged and otherwise
//! swallowed: a dead peer surfaces through its own read loop.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::message::ServerMessage;
use crate::registry::Registry;
use crate::session::Session;

/// Delivers framed messages to registry members
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
    write_deadline: Duration,
}

impl Broadcaster {
    pub fn new(registry: Arc<Registry>, write_deadline: Duration) -> Self {
        Self {
            registry,
            write_deadline,
        }
    }

    /// Frame `message` and queue it for one session
    pub async fn send_one(&self, session: &Session, message: &ServerMessage) {
        debug!("[send] {} -> {}", message, session.id);
        self.deliver(session, frame(message)).await;
    }

    /// Frame `message` once and queue it for every live session.
    ///
    /// Recipients are served concurrently, so a slow one delays the call by
    /// at most the write deadline and never blocks the others.
    pub async fn send_all(&self, message: &ServerMessage) {
        let sessions = self.registry.snapshot();
        debug!("[send] {} -> {} sessions", message, sessions.len());

        let frame = frame(message);
        join_all(
            sessions
                .iter()
                .map(|session| self.deliver(session, frame.clone())),
        )
        .await;
    }

    /// Broadcast the current roster of named sessions
    pub async fn send_roster(&self) {
        let names = self.registry.roster();
        self.send_all(&ServerMessage::Users { names }).await;
    }

    async fn deliver(&self, session: &Session, frame: String) {
        if let Err(e) = session.send(frame, self.write_deadline).await {
            warn!("Failed to deliver to session {}: {}", session.id, e);
        }
    }
}

fn frame(message: &ServerMessage) -> String {
    format!("{message}\n")
}
