// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Listener traits and the multicast list that drives them.
//!
//! # Delivery
//!
//! Events are delivered synchronously, on the thread that detected them, to
//! every listener registered at the moment delivery starts, in registration
//! order. Registering or removing a listener while a delivery is in flight
//! is safe: delivery iterates over a snapshot and the change applies to the
//! next event.
//!
//! # Isolation
//!
//! A panicking listener is logged and skipped; the remaining listeners still
//! receive the event. Listeners must return quickly and hand long work off
//! to their own thread or task, since a slow listener delays every listener
//! after it and the connection that raised the event.

use crate::connection::{Connection, ConnectionError};
use crate::message::WampMessage;
use crate::session::{SessionClosed, SessionCreated};
use arc_swap::ArcSwap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Observer of a realm's session lifecycle.
///
/// Typical implementors are the RPC catalog and the topic container, which
/// drop a session's registrations and subscriptions on close.
pub trait SessionListener: Send + Sync {
    /// A session was welcomed.
    fn on_session_created(&self, event: &SessionCreated) {
        let _ = event;
    }

    /// A session reached a terminal state.
    fn on_session_closed(&self, event: &SessionClosed) {
        let _ = event;
    }
}

/// Observer of one connection's transport events.
pub trait ConnectionListener: Send + Sync {
    /// The transport is ready; fires once, before any message.
    fn on_open(&self, connection: &dyn Connection) {
        let _ = connection;
    }

    /// One inbound message, in wire order.
    fn on_message(&self, connection: &dyn Connection, message: &WampMessage) {
        let _ = (connection, message);
    }

    /// The connection is gone; fires at most once, and nothing follows it.
    fn on_closed(&self, connection: &dyn Connection) {
        let _ = connection;
    }

    /// A transport fault that did not necessarily close the connection.
    fn on_error(&self, connection: &dyn Connection, error: &ConnectionError) {
        let _ = (connection, error);
    }
}

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry<L: ?Sized> {
    id: ListenerId,
    listener: Arc<L>,
}

impl<L: ?Sized> Clone for Entry<L> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            listener: Arc::clone(&self.listener),
        }
    }
}

/// Copy-on-write list of listeners.
pub struct ListenerSet<L: ?Sized> {
    entries: ArcSwap<Vec<Entry<L>>>,
    next_id: AtomicU64,
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<L: ?Sized> ListenerSet<L> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener.
    pub fn register(&self, listener: Arc<L>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Entry { id, listener };
        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(entry.clone());
            next
        });
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let previous = self.entries.rcu(|current| {
            current
                .iter()
                .filter(|entry| entry.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|entry| entry.id == id)
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Call `f` for every listener of the current snapshot.
    ///
    /// Returns the number of listeners that panicked.
    pub fn notify(&self, event: &str, mut f: impl FnMut(&L)) -> usize {
        let snapshot = self.entries.load_full();
        let mut failures = 0;

        for entry in snapshot.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| f(&entry.listener)));
            if result.is_err() {
                failures += 1;
                tracing::error!(event, listener = entry.id.0, "listener panicked during delivery");
            }
        }

        failures
    }
}
