//! Relay configuration
//!
//! Deadlines and limits shared by every connection. Defaults mirror the
//! deployed relay: port 50000, 10 second read/write deadlines and
//! 2048-byte frames.

use std::net::SocketAddr;
use std::time::Duration;

/// Default listen address
pub const DEFAULT_ADDR: &str = "0.0.0.0:50000";

/// Default per-operation read/write deadline
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// Default number of frames buffered per session before senders wait
pub const DEFAULT_OUTBOX_CAPACITY: usize = 64;

/// Default maximum length of one received frame, in bytes
pub const DEFAULT_MAX_FRAME_LEN: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the acceptor binds to
    pub listen_addr: SocketAddr,
    /// How long one read waits before being re-issued
    pub read_deadline: Duration,
    /// Upper bound on queueing or writing one frame to a session
    pub write_deadline: Duration,
    /// Per-session outbox size
    pub outbox_capacity: usize,
    /// Longest accepted frame, excluding the line terminator
    pub max_frame_len: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 50000)),
            read_deadline: DEFAULT_DEADLINE,
            write_deadline: DEFAULT_DEADLINE,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl RelayConfig {
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    /// Set both the read and the write deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.read_deadline = deadline;
        self.write_deadline = deadline;
        self
    }

    pub fn with_read_deadline(mut self, deadline: Duration) -> Self {
        self.read_deadline = deadline;
        self
    }

    pub fn with_write_deadline(mut self, deadline: Duration) -> Self {
        self.write_deadline = deadline;
        self
    }

    pub fn with_outbox_capacity(mut self, capacity: usize) -> Self {
        // tokio channels panic on zero capacity
        self.outbox_capacity = capacity.max(1);
        self
    }

    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }
}
