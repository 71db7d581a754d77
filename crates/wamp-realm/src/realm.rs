// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Realm: one isolated routing domain.
//!
//! A realm binds a capability descriptor, a session lifecycle controller and
//! the externally supplied RPC catalog and topic container. The catalog and
//! container are registered as session listeners at construction, so they
//! learn about closed sessions before any host observer does. The realm
//! only notifies them; it never reaches into their state.
//!
//! Per-session services and the caller's own session id are not part of
//! this type. They belong to the session facade of the hosting layer.

use crate::details::{CloseDetails, HelloDetails, WelcomeDetails};
use crate::connection::Connection;
use crate::error::{ErrorEnvelope, RealmError, RouteError};
use crate::lifecycle::{SessionLifecycle, SessionStatsSnapshot};
use crate::listener::{ListenerId, SessionListener};
use crate::message::{RoutingRole, WampMessage};
use crate::roles::RouterRoles;
use crate::session::{SessionId, SessionState};
use crate::uri;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The session a routed request came from.
#[derive(Clone)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub connection: Arc<dyn Connection>,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("session_id", &self.session_id)
            .field("connection", &self.connection.id())
            .finish()
    }
}

/// Procedure registrations and call routing of one realm.
///
/// Receives REGISTER, UNREGISTER, CALL, CANCEL, YIELD and callee ERROR
/// messages. A request that fails is answered by returning the envelope;
/// the caller sends it back to the originating connection.
pub trait RpcCatalog: Send + Sync {
    fn handle(&self, context: &SessionContext, message: &WampMessage) -> Result<(), ErrorEnvelope>;
}

/// Topic subscriptions and publication fan-out of one realm.
///
/// Receives SUBSCRIBE, UNSUBSCRIBE and PUBLISH messages.
pub trait TopicContainer: Send + Sync {
    fn handle(&self, context: &SessionContext, message: &WampMessage) -> Result<(), ErrorEnvelope>;
}

/// Catalog and container that support nothing.
///
/// Every request is failed with `wamp.error.not_supported`. Useful for
/// realms that only exercise the session layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unrouted;

impl Unrouted {
    fn refuse(message: &WampMessage) -> Result<(), ErrorEnvelope> {
        match ErrorEnvelope::for_request(message, uri::ERROR_NOT_SUPPORTED) {
            Ok(envelope) => Err(envelope),
            Err(_) => {
                tracing::debug!(message_type = %message.message_type, "unroutable message dropped");
                Ok(())
            }
        }
    }
}

impl RpcCatalog for Unrouted {
    fn handle(&self, _context: &SessionContext, message: &WampMessage) -> Result<(), ErrorEnvelope> {
        Self::refuse(message)
    }
}

impl TopicContainer for Unrouted {
    fn handle(&self, _context: &SessionContext, message: &WampMessage) -> Result<(), ErrorEnvelope> {
        Self::refuse(message)
    }
}

impl SessionListener for Unrouted {}

/// Realm level counters.
#[derive(Debug, Default)]
pub struct RealmStats {
    /// HELLOs refused by role validation.
    pub hellos_rejected: AtomicU64,
    /// Requests handed to the catalog or container.
    pub requests_routed: AtomicU64,
    /// Requests answered with an ERROR.
    pub requests_failed: AtomicU64,
    /// Messages clients may not send (WELCOME, EVENT, RESULT, ...).
    pub protocol_violations: AtomicU64,
}

/// Snapshot of a realm's counters, including its session lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RealmStatsSnapshot {
    pub sessions: SessionStatsSnapshot,
    pub active_sessions: usize,
    pub hellos_rejected: u64,
    pub requests_routed: u64,
    pub requests_failed: u64,
    pub protocol_violations: u64,
}

/// An isolated routing domain.
pub struct Realm {
    name: String,
    roles: RouterRoles,
    welcome: WelcomeDetails,
    lifecycle: SessionLifecycle,
    rpc_catalog: Arc<dyn RpcCatalog>,
    topic_container: Arc<dyn TopicContainer>,
    stats: RealmStats,
}

impl Realm {
    /// Create a realm.
    ///
    /// The catalog and container are subscribed to session events before
    /// any other observer.
    pub fn new<C, T>(
        name: impl Into<String>,
        roles: RouterRoles,
        rpc_catalog: Arc<C>,
        topic_container: Arc<T>,
    ) -> Self
    where
        C: RpcCatalog + SessionListener + 'static,
        T: TopicContainer + SessionListener + 'static,
    {
        let name = name.into();
        let lifecycle = SessionLifecycle::new(name.clone());
        lifecycle.add_listener(rpc_catalog.clone());
        lifecycle.add_listener(topic_container.clone());

        tracing::info!(realm = %name, "realm created");

        Self {
            welcome: WelcomeDetails::for_realm(&name, &roles),
            name,
            roles,
            lifecycle,
            rpc_catalog,
            topic_container,
            stats: RealmStats::default(),
        }
    }

    /// Realm that routes nothing; see [`Unrouted`].
    pub fn unrouted(name: impl Into<String>, roles: RouterRoles) -> Self {
        Self::new(name, roles, Arc::new(Unrouted), Arc::new(Unrouted))
    }

    /// Realm name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capability descriptor.
    pub fn roles(&self) -> &RouterRoles {
        &self.roles
    }

    /// RPC catalog.
    pub fn rpc_catalog(&self) -> &Arc<dyn RpcCatalog> {
        &self.rpc_catalog
    }

    /// Topic container.
    pub fn topic_container(&self) -> &Arc<dyn TopicContainer> {
        &self.topic_container
    }

    /// Session table of this realm.
    pub fn sessions(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    /// WELCOME details disclosed to every joining session.
    pub fn welcome_details(&self) -> &WelcomeDetails {
        &self.welcome
    }

    /// Observe session creation and closure.
    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) -> ListenerId {
        self.lifecycle.add_listener(listener)
    }

    /// Stop observing.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.lifecycle.remove_listener(id)
    }

    /// Validate a HELLO and welcome the session.
    ///
    /// A HELLO announcing no known client role aborts the session with
    /// `wamp.error.no_such_role`. A session that is already active or closed
    /// is reported as such, whatever its HELLO announces.
    pub fn accept(&self, session_id: SessionId, hello_details: HelloDetails) -> Result<WelcomeDetails, RealmError> {
        let welcomable = matches!(
            self.lifecycle.state(session_id),
            None | Some(SessionState::Pending)
        );
        if welcomable && hello_details.client_roles().is_empty() {
            self.stats.hellos_rejected.fetch_add(1, Ordering::Relaxed);
            let message = "HELLO announces no supported client role".to_string();
            self.lifecycle.abort(
                session_id,
                CloseDetails::with_message(message.clone()),
                uri::ERROR_NO_SUCH_ROLE,
            )?;
            return Err(RealmError::HelloRejected {
                reason: uri::ERROR_NO_SUCH_ROLE.to_string(),
                message,
            });
        }

        self.hello(session_id, hello_details, self.welcome.clone())?;
        Ok(self.welcome.clone())
    }

    /// See [`SessionLifecycle::hello`].
    pub fn hello(
        &self,
        session_id: SessionId,
        hello_details: HelloDetails,
        welcome_details: WelcomeDetails,
    ) -> Result<(), RealmError> {
        Ok(self.lifecycle.hello(session_id, hello_details, welcome_details)?)
    }

    /// See [`SessionLifecycle::goodbye`].
    pub fn goodbye(&self, session_id: SessionId, details: CloseDetails, reason: &str) -> Result<(), RealmError> {
        Ok(self.lifecycle.goodbye(session_id, details, reason)?)
    }

    /// See [`SessionLifecycle::abort`].
    pub fn abort(&self, session_id: SessionId, details: CloseDetails, reason: &str) -> Result<(), RealmError> {
        Ok(self.lifecycle.abort(session_id, details, reason)?)
    }

    /// See [`SessionLifecycle::session_lost`].
    pub fn session_lost(&self, session_id: SessionId) -> Result<(), RealmError> {
        Ok(self.lifecycle.session_lost(session_id)?)
    }

    /// Hand a request to the catalog or the container.
    ///
    /// Session and router-only messages are refused with
    /// [`RouteError::ProtocolViolation`]; the caller aborts the session.
    pub fn route(&self, context: &SessionContext, message: &WampMessage) -> Result<(), RouteError> {
        let result = match message.message_type.role() {
            RoutingRole::Dealer => self.rpc_catalog.handle(context, message),
            RoutingRole::Broker => self.topic_container.handle(context, message),
            RoutingRole::Session | RoutingRole::RouterOnly => {
                self.stats.protocol_violations.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    realm = %self.name,
                    session_id = %context.session_id,
                    message_type = %message.message_type,
                    "client sent a router message"
                );
                return Err(RouteError::ProtocolViolation {
                    message_type: message.message_type,
                });
            }
        };

        self.stats.requests_routed.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.stats.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
        result.map_err(RouteError::Failed)
    }

    /// Get snapshot of current stats.
    pub fn stats(&self) -> RealmStatsSnapshot {
        RealmStatsSnapshot {
            sessions: self.lifecycle.stats().snapshot(),
            active_sessions: self.lifecycle.active_count(),
            hellos_rejected: self.stats.hellos_rejected.load(Ordering::Relaxed),
            requests_routed: self.stats.requests_routed.load(Ordering::Relaxed),
            requests_failed: self.stats.requests_failed.load(Ordering::Relaxed),
            protocol_violations: self.stats.protocol_violations.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realm")
            .field("name", &self.name)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}
