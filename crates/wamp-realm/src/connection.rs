// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bidirectional connection contract.
//!
//! A connection carries decoded protocol messages to and from one remote
//! peer. Transports implement [`Connection`] and drive its events through
//! [`ConnectionEvents`], which enforces the ordering guarantees every
//! listener relies on:
//!
//! - `on_open` fires once, before any `on_message`
//! - `on_message` fires in wire order and never after `on_closed`
//! - `on_closed` fires at most once
//! - `on_error` may fire any number of times before `on_closed`
//!
//! `send` and `close` never wait for a delivery running on another thread:
//! a fault or close raised while another thread holds the connection is
//! queued and delivered as soon as that delivery returns. A listener on one
//! connection can therefore send to, or close, any other connection.
//!
//! [`LocalConnection`] is the in-process implementation, backed by a bounded
//! crossbeam channel for the outbound direction.

use crate::listener::{ConnectionListener, ListenerId, ListenerSet};
use crate::message::WampMessage;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use crossbeam::queue::SegQueue;
use parking_lot::ReentrantMutex;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Transport faults, reported through [`ConnectionListener::on_error`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("outbound queue full ({capacity} messages)")]
    Backpressure { capacity: usize },

    #[error("peer disconnected")]
    Disconnected,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// A bidirectional, message oriented channel to one peer.
///
/// `send` never reports failure synchronously: a message that cannot be
/// delivered raises [`ConnectionListener::on_error`] instead, so callers must
/// not read a returning `send` as a delivery confirmation. After the
/// connection closed, `send` is a counted no-op.
pub trait Connection: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    /// Queue one outbound message. Callable from any thread.
    fn send(&self, message: WampMessage);

    /// Whether the connection is open for traffic.
    fn is_open(&self) -> bool;

    /// Start observing this connection's events.
    fn add_listener(&self, listener: Arc<dyn ConnectionListener>) -> ListenerId;

    /// Stop observing.
    fn remove_listener(&self, id: ListenerId) -> bool;

    /// Release the transport. Idempotent; fires `on_closed` the first time.
    fn close(&self);
}

/// Transport state as seen by listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Created, not yet ready for traffic.
    Connecting,
    /// Ready; messages flow.
    Open,
    /// Terminal.
    Closed,
}

/// Event dispatcher enforcing the connection ordering guarantees.
///
/// Open and message deliveries run under a re-entrant gate. Faults and close
/// requests only try the gate: when another thread holds it they are queued
/// and the holder delivers them on its way out. A listener raising events on
/// its own connection re-enters the gate and is served immediately.
pub struct ConnectionEvents {
    gate: ReentrantMutex<()>,
    state: AtomicU8,
    deferred: SegQueue<ConnectionError>,
    listeners: ListenerSet<dyn ConnectionListener>,
}

const CONNECTING: u8 = 0;
const OPEN: u8 = 1;
/// Close requested, `on_closed` not delivered yet.
const CLOSING: u8 = 2;
const CLOSED: u8 = 3;

impl Default for ConnectionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionEvents {
    /// Dispatcher in the `Connecting` state.
    pub fn new() -> Self {
        Self {
            gate: ReentrantMutex::new(()),
            state: AtomicU8::new(CONNECTING),
            deferred: SegQueue::new(),
            listeners: ListenerSet::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> LinkState {
        match self.state.load(Ordering::Acquire) {
            CONNECTING => LinkState::Connecting,
            OPEN => LinkState::Open,
            _ => LinkState::Closed,
        }
    }

    /// Register a listener.
    pub fn add_listener(&self, listener: Arc<dyn ConnectionListener>) -> ListenerId {
        self.listeners.register(listener)
    }

    /// Unregister a listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    /// `Connecting -> Open`. Returns `false` if the connection was already
    /// opened or closed.
    pub fn raise_open(&self, connection: &dyn Connection) -> bool {
        let opened = {
            let _gate = self.gate.lock();
            self.drain(connection);
            let opened = self
                .state
                .compare_exchange(CONNECTING, OPEN, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();
            if opened {
                self.listeners
                    .notify("connection_open", |l| l.on_open(connection));
            }
            opened
        };
        self.settle(connection);
        opened
    }

    /// Deliver one inbound message. Dropped (returns `false`) unless open.
    pub fn raise_message(&self, connection: &dyn Connection, message: &WampMessage) -> bool {
        let delivered = {
            let _gate = self.gate.lock();
            self.drain(connection);
            if self.state() == LinkState::Open {
                self.listeners.notify("message_arrived", |l| {
                    // A listener may close the connection mid-delivery.
                    if self.state() == LinkState::Open {
                        l.on_message(connection, message);
                    }
                });
                true
            } else {
                tracing::debug!(
                    connection = connection.id(),
                    state = ?self.state(),
                    message_type = %message.message_type,
                    "dropping inbound message"
                );
                false
            }
        };
        self.settle(connection);
        delivered
    }

    /// Report a transport fault. Ignored (returns `false`) once a close was
    /// requested. Never waits for another thread's delivery.
    pub fn raise_error(&self, connection: &dyn Connection, error: ConnectionError) -> bool {
        if self.state.load(Ordering::Acquire) >= CLOSING {
            return false;
        }
        self.deferred.push(error);
        self.settle(connection);
        true
    }

    /// Request the terminal state. Returns `false` if a close was already
    /// requested. Never waits for another thread's delivery; `on_closed`
    /// fires once pending faults are delivered.
    pub fn raise_closed(&self, connection: &dyn Connection) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current >= CLOSING {
                return false;
            }
            match self
                .state
                .compare_exchange_weak(current, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        self.settle(connection);
        true
    }

    fn has_deferred(&self) -> bool {
        !self.deferred.is_empty() || self.state.load(Ordering::Acquire) == CLOSING
    }

    /// Deliver queued events unless another thread holds the gate, in which
    /// case that thread delivers them when it lets go.
    fn settle(&self, connection: &dyn Connection) {
        while self.has_deferred() {
            let Some(_gate) = self.gate.try_lock() else {
                return;
            };
            self.drain(connection);
        }
    }

    /// Deliver queued faults, then a requested close. Gate must be held.
    fn drain(&self, connection: &dyn Connection) {
        while let Some(error) = self.deferred.pop() {
            if self.state.load(Ordering::Acquire) == CLOSED {
                continue;
            }
            tracing::warn!(connection = connection.id(), %error, "connection error");
            self.listeners
                .notify("connection_error", |l| l.on_error(connection, &error));
        }
        if self
            .state
            .compare_exchange(CLOSING, CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::debug!(connection = connection.id(), "connection closed");
            self.listeners
                .notify("connection_closed", |l| l.on_closed(connection));
        }
    }
}

/// Traffic counters of one connection.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Messages accepted into the outbound queue.
    pub messages_sent: AtomicU64,
    /// Inbound messages delivered to listeners.
    pub messages_received: AtomicU64,
    /// Messages discarded (queue full, closed connection).
    pub messages_dropped: AtomicU64,
    /// Transport faults raised.
    pub errors: AtomicU64,
}

impl ConnectionStats {
    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> ConnectionStatsSnapshot {
        ConnectionStatsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of connection statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub errors: u64,
}

/// In-process connection.
///
/// The owner drives the inbound side (`open`, `receive`, `fail`, `close`);
/// outbound messages land in the paired [`LocalPeer`].
pub struct LocalConnection {
    id: String,
    outbound: Sender<WampMessage>,
    capacity: usize,
    events: ConnectionEvents,
    stats: ConnectionStats,
}

/// Remote end of a [`LocalConnection`]: reads what the hub sent.
pub struct LocalPeer {
    outbound: Receiver<WampMessage>,
}

impl LocalConnection {
    /// Create a connection and its peer with a bounded outbound queue.
    pub fn pair(id: impl Into<String>, capacity: usize) -> (Arc<Self>, LocalPeer) {
        let (tx, rx) = channel::bounded(capacity);
        let connection = Arc::new(Self {
            id: id.into(),
            outbound: tx,
            capacity,
            events: ConnectionEvents::new(),
            stats: ConnectionStats::default(),
        });
        (connection, LocalPeer { outbound: rx })
    }

    /// Mark the transport ready.
    pub fn open(&self) -> bool {
        self.events.raise_open(self)
    }

    /// Hand an inbound message to the listeners.
    pub fn receive(&self, message: WampMessage) -> bool {
        let delivered = self.events.raise_message(self, &message);
        if delivered {
            self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
        }
        delivered
    }

    /// Report a transport fault; a terminal fault also closes the connection.
    pub fn fail(&self, error: ConnectionError, terminal: bool) {
        if self.events.raise_error(self, error) {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
        }
        if terminal {
            self.events.raise_closed(self);
        }
    }

    /// Current transport state.
    pub fn state(&self) -> LinkState {
        self.events.state()
    }

    /// Traffic counters.
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }
}

impl Connection for LocalConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, message: WampMessage) {
        if self.events.state() == LinkState::Closed {
            self.stats.messages_dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                connection = %self.id,
                message_type = %message.message_type,
                "send on closed connection ignored"
            );
            return;
        }

        match self.outbound.try_send(message) {
            Ok(()) => {
                self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                self.stats.messages_dropped.fetch_add(1, Ordering::Relaxed);
                self.fail(
                    ConnectionError::Backpressure {
                        capacity: self.capacity,
                    },
                    false,
                );
            }
            Err(TrySendError::Disconnected(_)) => {
                self.stats.messages_dropped.fetch_add(1, Ordering::Relaxed);
                self.fail(ConnectionError::Disconnected, true);
            }
        }
    }

    fn is_open(&self) -> bool {
        self.events.state() == LinkState::Open
    }

    fn add_listener(&self, listener: Arc<dyn ConnectionListener>) -> ListenerId {
        self.events.add_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.events.remove_listener(id)
    }

    fn close(&self) {
        self.events.raise_closed(self);
    }
}

impl LocalPeer {
    /// Next message the hub sent, if one is queued.
    pub fn try_recv(&self) -> Option<WampMessage> {
        self.outbound.try_recv().ok()
    }

    /// Wait up to `timeout` for the next message.
    ///
    /// Returns `None` on timeout or once the connection is gone and drained.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WampMessage> {
        match self.outbound.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Every message queued so far.
    pub fn drain(&self) -> Vec<WampMessage> {
        self.outbound.try_iter().collect()
    }
}
