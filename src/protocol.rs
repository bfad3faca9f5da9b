//! Per-session protocol handling
//!
//! Parses incoming frames, validates them and applies join/chat/stamp.
//! Validation failures are answered with an `error:` frame sent to the
//! offending session only; they never end the connection.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::codec::decode;
use crate::error::RelayError;
use crate::message::{Command, CommandMessage, ServerMessage};
use crate::registry::Registry;
use crate::types::SessionId;

/// Lifecycle of one session
///
/// `Unnamed -> Named` only through a successful join; `Terminated` is
/// absorbing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unnamed,
    Named(String),
    Terminated,
}

/// Command dispatcher owned by one connection's read loop
#[derive(Debug)]
pub struct ProtocolHandler {
    id: SessionId,
    state: SessionState,
    registry: Arc<Registry>,
    broadcaster: Broadcaster,
    max_frame_len: usize,
}

impl ProtocolHandler {
    pub fn new(
        id: SessionId,
        registry: Arc<Registry>,
        broadcaster: Broadcaster,
        max_frame_len: usize,
    ) -> Self {
        Self {
            id,
            state: SessionState::Unnamed,
            registry,
            broadcaster,
            max_frame_len,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Longest frame accepted, excluding the line terminator
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Display name, empty while unnamed
    pub fn name(&self) -> &str {
        match &self.state {
            SessionState::Named(name) => name,
            SessionState::Unnamed | SessionState::Terminated => "",
        }
    }

    /// Handle one raw frame (line terminator already stripped)
    pub async fn handle_raw(&mut self, raw: &[u8]) {
        if self.state == SessionState::Terminated {
            debug!("Dropping frame for terminated session {}", self.id);
            return;
        }

        let result = if raw.len() > self.max_frame_len {
            Err(RelayError::bad_request(format!(
                "frame of {} bytes exceeds limit of {}",
                raw.len(),
                self.max_frame_len
            )))
        } else {
            match std::str::from_utf8(raw) {
                Ok(frame) => self.dispatch(frame).await,
                Err(e) => Err(RelayError::bad_request(format!("frame is not UTF-8: {e}"))),
            }
        };

        if let Err(err) = result {
            self.report(err).await;
        }
    }

    /// Handle one text frame
    pub async fn handle_frame(&mut self, frame: &str) {
        self.handle_raw(frame.as_bytes()).await;
    }

    /// Move to `Terminated`, returning the name the session held
    pub fn terminate(&mut self) -> String {
        match std::mem::replace(&mut self.state, SessionState::Terminated) {
            SessionState::Named(name) => name,
            SessionState::Unnamed | SessionState::Terminated => String::new(),
        }
    }

    async fn dispatch(&mut self, frame: &str) -> Result<(), RelayError> {
        debug!("[recv] {} <- {}", frame, self.id);

        let message = CommandMessage::parse(frame);
        match &message.command {
            Command::Join => self.on_join(&message).await,
            Command::Chat => self.on_chat(&message).await,
            Command::Stamp => self.on_stamp(&message).await,
            Command::Unrecognized(tag) => {
                info!("Unrecognized command '{}' from session {}", tag, self.id);
                Err(RelayError::bad_request(format!("unrecognized command '{tag}'")))
            }
        }
    }

    async fn on_join(&mut self, message: &CommandMessage) -> Result<(), RelayError> {
        let token = message.single_param()?;

        if let SessionState::Named(current) = &self.state {
            info!("Session {} already named '{}'", self.id, current);
            return Err(RelayError::Forbidden);
        }

        let name = decode(token)?;
        if name.is_empty() {
            return Err(RelayError::bad_request("empty name"));
        }

        self.registry.set_name(self.id, &name)?;
        self.state = SessionState::Named(name.clone());
        info!("Session {} joined as '{}'", self.id, name);

        self.broadcaster
            .send_all(&ServerMessage::Join { name })
            .await;
        self.broadcaster.send_roster().await;
        Ok(())
    }

    async fn on_chat(&mut self, message: &CommandMessage) -> Result<(), RelayError> {
        let content = decode(message.single_param()?)?;
        if content.is_empty() {
            return Err(RelayError::bad_request("empty chat content"));
        }

        self.broadcaster
            .send_all(&ServerMessage::Chat {
                name: self.name().to_string(),
                content,
            })
            .await;
        Ok(())
    }

    async fn on_stamp(&mut self, message: &CommandMessage) -> Result<(), RelayError> {
        let token = message.single_param()?;
        let stamp: i64 = token
            .parse()
            .map_err(|_| RelayError::bad_request(format!("invalid stamp id '{token}'")))?;

        self.broadcaster
            .send_all(&ServerMessage::Stamp {
                name: self.name().to_string(),
                stamp,
            })
            .await;
        Ok(())
    }

    async fn report(&self, err: RelayError) {
        warn!("Rejected frame from session {}: {}", self.id, err);

        let Some(session) = self.registry.get(self.id) else {
            return;
        };
        self.broadcaster
            .send_one(&session, &ServerMessage::from(err))
            .await;
    }
}
