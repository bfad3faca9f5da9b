//! Basic type definitions for the relay
//!
//! Provides newtype wrappers for type safety:
//! - `SessionId`: monotonically assigned connection identifier

/// Unique session identifier (newtype pattern)
///
/// Assigned by the registry in increasing order starting at 1 and never
/// reused for the lifetime of the process. Ordering follows assignment
/// order, which is what roster rendering sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    /// The first id handed out by a fresh registry
    pub const FIRST: SessionId = SessionId(1);

    /// The id following this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
