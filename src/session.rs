//! Session struct definition
//!
//! Represents one connected client as seen by the registry: its id, its
//! display name and the outbox feeding the connection's writer task.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::types::SessionId;

/// Connected session information
///
/// The socket itself is owned by the connection's runner; the registry
/// only holds the sending side of the outbox. Cloning a `Session` is how
/// the registry hands out point-in-time snapshots for broadcast.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique identifier for this session
    pub id: SessionId,
    /// Display name (empty until a successful join)
    pub name: String,
    /// Framed lines waiting to be written to the socket
    pub outbox: mpsc::Sender<String>,
}

impl Session {
    /// Create a new unnamed session
    pub fn new(id: SessionId, outbox: mpsc::Sender<String>) -> Self {
        Self {
            id,
            name: String::new(),
            outbox,
        }
    }

    /// Check if this session has completed the join handshake
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }

    /// Queue one framed line, waiting at most `deadline` for outbox space.
    pub async fn send(&self, frame: String, deadline: Duration) -> Result<(), RelayError> {
        self.outbox
            .send_timeout(frame, deadline)
            .await
            .map_err(|err| match err {
                mpsc::error::SendTimeoutError::Timeout(_) => {
                    RelayError::Io(std::io::ErrorKind::TimedOut.into())
                }
                mpsc::error::SendTimeoutError::Closed(_) => {
                    RelayError::Io(std::io::ErrorKind::BrokenPipe.into())
                }
            })
    }
}
