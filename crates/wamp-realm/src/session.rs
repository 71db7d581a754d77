// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session identity, state and lifecycle event payloads.

use crate::details::{CloseDetails, HelloDetails, WelcomeDetails};
use dashmap::DashSet;
use std::fmt;

/// Largest session id: ids are drawn from `[1, 2^53]` so they survive
/// serializers that only carry IEEE doubles.
pub const MAX_SESSION_ID: u64 = 1 << 53;

/// Process-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionCloseType {
    /// Graceful GOODBYE exchange.
    Goodbye,
    /// Forced ABORT, possibly before the session was ever welcomed.
    Abort,
    /// The transport went away without GOODBYE or ABORT.
    Disconnection,
}

impl fmt::Display for SessionCloseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Goodbye => "goodbye",
            Self::Abort => "abort",
            Self::Disconnection => "disconnection",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of one session.
///
/// ```text
/// Pending --hello--> Active --goodbye--> Closed(Goodbye)
///    |                  |----abort-----> Closed(Abort)
///    |                  `----lost------> Closed(Disconnection)
///    |----abort-----------------------> Closed(Abort)
///    `----lost------------------------> Closed(Disconnection)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// HELLO received, WELCOME not sent yet.
    Pending,
    /// Welcomed and live.
    Active,
    /// Terminal; no transition leaves it.
    Closed(SessionCloseType),
}

impl SessionState {
    /// Whether the state is final.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Active => f.write_str("active"),
            Self::Closed(close_type) => write!(f, "closed by {close_type}"),
        }
    }
}

/// Raised once when a session becomes active.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCreated {
    pub session_id: SessionId,
    pub hello_details: HelloDetails,
    pub welcome_details: WelcomeDetails,
}

/// Raised once when a session reaches a terminal state.
///
/// `details` and `reason` are `None` for a disconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionClosed {
    pub close_type: SessionCloseType,
    pub session_id: SessionId,
    pub details: Option<CloseDetails>,
    pub reason: Option<String>,
}

/// Point-in-time copy of a tracked session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub realm: String,
    pub state: SessionState,
    pub hello_details: Option<HelloDetails>,
    pub welcome_details: Option<WelcomeDetails>,
}

/// Hands out random session ids, never one that is currently reserved.
#[derive(Debug, Default)]
pub struct SessionIdAllocator {
    reserved: DashSet<u64>,
}

impl SessionIdAllocator {
    /// Create an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh id in `[1, 2^53]`.
    pub fn allocate(&self) -> SessionId {
        loop {
            let candidate = fastrand::u64(1..=MAX_SESSION_ID);
            if self.reserved.insert(candidate) {
                return SessionId(candidate);
            }
        }
    }

    /// Make an id available again.
    ///
    /// Only release an id once every component has forgotten the session,
    /// otherwise a reconnect could be confused with the old session.
    pub fn release(&self, session_id: SessionId) -> bool {
        self.reserved.remove(&session_id.0).is_some()
    }

    /// Whether an id is currently reserved.
    pub fn is_reserved(&self, session_id: SessionId) -> bool {
        self.reserved.contains(&session_id.0)
    }

    /// Number of reserved ids.
    pub fn len(&self) -> usize {
        self.reserved.len()
    }

    /// Whether no id is reserved.
    pub fn is_empty(&self) -> bool {
        self.reserved.is_empty()
    }
}
