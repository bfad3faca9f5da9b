//! Session registry
//!
//! The single source of truth for who is connected. Every read and write,
//! including name assignment, happens under one mutex so that the
//! duplicate-name scan and the assignment form a single critical section.
//! The lock is never held across an `.await`.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::RelayError;
use crate::session::Session;
use crate::types::SessionId;

/// Shared table of live sessions
///
/// Keyed by `SessionId` in a `BTreeMap`, so iteration order is assignment
/// order. Wrap in an `Arc` to share between connection tasks.
#[derive(Debug)]
pub struct Registry {
    inner: Mutex<RegistryState>,
}

#[derive(Debug)]
struct RegistryState {
    next_id: SessionId,
    sessions: BTreeMap<SessionId, Session>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryState {
                next_id: SessionId::FIRST,
                sessions: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Critical sections never panic midway, so a poisoned map is still consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the next id and insert an unnamed session for it
    pub fn register(&self, outbox: mpsc::Sender<String>) -> Session {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id = id.next();

        let session = Session::new(id, outbox);
        state.sessions.insert(id, session.clone());
        debug!("Registered session {} (total: {})", id, state.sessions.len());
        session
    }

    /// Remove a session; a no-op if it is already gone
    pub fn unregister(&self, id: SessionId) -> Option<Session> {
        let mut state = self.lock();
        let removed = state.sessions.remove(&id);
        if removed.is_some() {
            debug!("Unregistered session {} (total: {})", id, state.sessions.len());
        }
        removed
    }

    /// Look up a single session by id
    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.lock().sessions.get(&id).cloned()
    }

    /// Find the live session holding `name`, if any
    pub fn find_by_name(&self, name: &str) -> Option<Session> {
        self.lock().find_by_name(name).cloned()
    }

    /// Assign `name` to session `id`.
    ///
    /// The duplicate scan and the assignment run under the same lock
    /// acquisition, so of two concurrent claims for one name exactly one
    /// wins and the other gets `DuplicateName`.
    pub fn set_name(&self, id: SessionId, name: &str) -> Result<(), RelayError> {
        let mut state = self.lock();

        match state.sessions.get(&id) {
            None => return Err(RelayError::Unknown),
            Some(session) if session.is_named() => return Err(RelayError::Forbidden),
            Some(_) => {}
        }

        if state.find_by_name(name).is_some() {
            return Err(RelayError::DuplicateName(name.to_string()));
        }

        if let Some(session) = state.sessions.get_mut(&id) {
            session.name = name.to_string();
        }
        Ok(())
    }

    /// Point-in-time copy of every live session, ordered by id
    pub fn snapshot(&self) -> Vec<Session> {
        self.lock().sessions.values().cloned().collect()
    }

    /// Names of all named sessions, ordered by id
    pub fn roster(&self) -> Vec<String> {
        self.lock()
            .sessions
            .values()
            .filter(|session| session.is_named())
            .map(|session| session.name.clone())
            .collect()
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryState {
    fn find_by_name(&self, name: &str) -> Option<&Session> {
        if name.is_empty() {
            return None;
        }
        self.sessions.values().find(|session| session.name == name)
    }
}
