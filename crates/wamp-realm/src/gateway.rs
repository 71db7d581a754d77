// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session gateway: binds one connection to at most one session at a time.
//!
//! ```text
//!          HELLO ok                 GOODBYE from peer
//! Idle -------------> Established -------------------> Idle
//!  ^                    |   |  shutdown()
//!  |  GOODBYE reply     |   `-----------> Closing
//!  `--------------------+--------------------'
//!                       | ABORT / HELLO again / transport lost
//!                       `-----------> connection closed
//! ```
//!
//! The gateway is the per-connection view of a session: it knows the
//! session id and realm the connection is bound to, which the realm itself
//! does not expose.
//!
//! Closed session ids stay reserved (and their tombstones stay in the realm)
//! until the transport closes; then the gateway forgets them and returns the
//! ids to the allocator.

use crate::connection::{Connection, ConnectionError};
use crate::details::{CloseDetails, HelloDetails};
use crate::error::{MessageError, RealmError, RouteError};
use crate::listener::ConnectionListener;
use crate::message::{MessageType, WampMessage};
use crate::realm::{Realm, SessionContext};
use crate::registry::RealmRegistry;
use crate::session::{SessionId, SessionIdAllocator};
use crate::uri;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

#[derive(Clone)]
enum Phase {
    /// No session; HELLO expected.
    Idle,
    /// Session welcomed.
    Established { realm: Arc<Realm>, session_id: SessionId },
    /// Hub sent GOODBYE, waiting for the peer's reply.
    Closing,
}

/// Drives one connection through handshake, routing and teardown.
pub struct SessionGateway {
    registry: Arc<RealmRegistry>,
    allocator: Arc<SessionIdAllocator>,
    connection: Weak<dyn Connection>,
    phase: Mutex<Phase>,
    finished: Mutex<Vec<(Arc<Realm>, SessionId)>>,
}

impl SessionGateway {
    /// Attach a gateway to `connection` as one of its listeners.
    pub fn attach(
        connection: &Arc<dyn Connection>,
        registry: Arc<RealmRegistry>,
        allocator: Arc<SessionIdAllocator>,
    ) -> Arc<Self> {
        let gateway = Arc::new(Self {
            registry,
            allocator,
            connection: Arc::downgrade(connection),
            phase: Mutex::new(Phase::Idle),
            finished: Mutex::new(Vec::new()),
        });
        connection.add_listener(gateway.clone());
        gateway
    }

    /// Session currently bound to the connection.
    pub fn session_id(&self) -> Option<SessionId> {
        match &*self.phase.lock() {
            Phase::Established { session_id, .. } => Some(*session_id),
            _ => None,
        }
    }

    /// Realm of the bound session.
    pub fn realm(&self) -> Option<Arc<Realm>> {
        match &*self.phase.lock() {
            Phase::Established { realm, .. } => Some(Arc::clone(realm)),
            _ => None,
        }
    }

    /// Close the bound session with a hub initiated GOODBYE.
    ///
    /// Returns `false` when no session was bound.
    pub fn shutdown(&self, reason: &str) -> bool {
        self.shutdown_bound(reason, None)
    }

    /// [`Self::shutdown`], only if the session is bound to `realm`.
    pub(crate) fn shutdown_in(&self, realm: &Arc<Realm>, reason: &str) -> bool {
        self.shutdown_bound(reason, Some(realm))
    }

    fn shutdown_bound(&self, reason: &str, only: Option<&Arc<Realm>>) -> bool {
        let (realm, session_id) = {
            let mut phase = self.phase.lock();
            let Phase::Established { realm, session_id } = &*phase else {
                return false;
            };
            if only.is_some_and(|only| !Arc::ptr_eq(only, realm)) {
                return false;
            }
            let bound = (Arc::clone(realm), *session_id);
            *phase = Phase::Closing;
            bound
        };
        let details = CloseDetails::default();
        if let Err(error) = realm.goodbye(session_id, details.clone(), reason) {
            tracing::warn!(realm = %realm.name(), %session_id, %error, "shutdown goodbye rejected");
        }
        self.finished.lock().push((realm, session_id));
        if let Some(connection) = self.connection.upgrade() {
            connection.send(WampMessage::goodbye(&details, reason));
        }
        true
    }

    fn replace_phase(&self, next: Phase) -> Phase {
        std::mem::replace(&mut *self.phase.lock(), next)
    }

    fn current_phase(&self) -> Phase {
        self.phase.lock().clone()
    }

    fn handle_hello(&self, connection: &dyn Connection, message: &WampMessage) {
        match self.current_phase() {
            Phase::Idle => {}
            Phase::Established { realm, session_id } => {
                self.replace_phase(Phase::Idle);
                let reason = uri::ERROR_PROTOCOL_VIOLATION;
                if let Err(error) = realm.abort(
                    session_id,
                    CloseDetails::with_message("HELLO received on an established session"),
                    reason,
                ) {
                    tracing::warn!(realm = %realm.name(), %session_id, %error, "abort rejected");
                }
                self.finished.lock().push((realm, session_id));
                abort_connection(connection, reason, "HELLO received on an established session");
                return;
            }
            Phase::Closing => {
                abort_connection(connection, uri::ERROR_PROTOCOL_VIOLATION, "HELLO received while closing");
                return;
            }
        }

        let (realm_name, details) = match parse_hello(message) {
            Ok(parsed) => parsed,
            Err(error) => {
                abort_connection(connection, uri::ERROR_PROTOCOL_VIOLATION, &error.to_string());
                return;
            }
        };

        let realm = match self.registry.resolve(&realm_name) {
            Ok(realm) => realm,
            Err(error) => {
                tracing::info!(connection = connection.id(), realm = %realm_name, %error, "HELLO refused");
                abort_connection(connection, error.uri(), &error.to_string());
                return;
            }
        };

        let agent = details.agent().unwrap_or_default().to_string();
        let authid = details.authid().unwrap_or_default().to_string();
        let session_id = self.allocator.allocate();
        match realm.accept(session_id, details) {
            Ok(welcome) => {
                *self.phase.lock() = Phase::Established {
                    realm: Arc::clone(&realm),
                    session_id,
                };
                tracing::info!(
                    connection = connection.id(),
                    realm = %realm.name(),
                    %session_id,
                    agent = %agent,
                    authid = %authid,
                    "session joined"
                );
                connection.send(WampMessage::welcome(session_id, &welcome));
            }
            Err(error) => {
                tracing::info!(connection = connection.id(), realm = %realm.name(), %session_id, %error, "HELLO rejected");
                self.finished.lock().push((realm, session_id));
                abort_connection(connection, error.uri(), &rejection_message(&error));
            }
        }
    }

    fn handle_goodbye(&self, connection: &dyn Connection, message: &WampMessage) {
        let parsed = parse_close(message, MessageType::Goodbye);

        match self.replace_phase(Phase::Idle) {
            Phase::Established { realm, session_id } => {
                let (details, reason) = match parsed {
                    Ok(parsed) => parsed,
                    Err(error) => {
                        self.abort_session(connection, &realm, session_id, &error.to_string());
                        return;
                    }
                };
                if let Err(error) = realm.goodbye(session_id, details, &reason) {
                    tracing::warn!(realm = %realm.name(), %session_id, %error, "goodbye rejected");
                }
                self.finished.lock().push((realm, session_id));
                if reason != uri::CLOSE_GOODBYE_AND_OUT {
                    connection.send(WampMessage::goodbye(
                        &CloseDetails::default(),
                        uri::CLOSE_GOODBYE_AND_OUT,
                    ));
                }
            }
            Phase::Closing => {
                tracing::debug!(connection = connection.id(), "goodbye handshake complete");
            }
            Phase::Idle => {
                abort_connection(connection, uri::ERROR_PROTOCOL_VIOLATION, "GOODBYE without a session");
            }
        }
    }

    fn handle_abort(&self, connection: &dyn Connection, message: &WampMessage) {
        if let Phase::Established { realm, session_id } = self.replace_phase(Phase::Idle) {
            let (details, reason) = parse_close(message, MessageType::Abort)
                .unwrap_or_else(|_| (CloseDetails::default(), uri::ERROR_PROTOCOL_VIOLATION.to_string()));
            if let Err(error) = realm.abort(session_id, details, &reason) {
                tracing::warn!(realm = %realm.name(), %session_id, %error, "abort rejected");
            }
            self.finished.lock().push((realm, session_id));
        }
        connection.close();
    }

    fn handle_request(&self, connection: &dyn Connection, message: &WampMessage) {
        let (realm, session_id) = match self.current_phase() {
            Phase::Established { realm, session_id } => (realm, session_id),
            Phase::Closing => {
                tracing::debug!(
                    connection = connection.id(),
                    message_type = %message.message_type,
                    "message dropped while closing"
                );
                return;
            }
            Phase::Idle => {
                abort_connection(connection, uri::ERROR_PROTOCOL_VIOLATION, "message received before HELLO");
                return;
            }
        };

        let Some(owner) = self.connection.upgrade() else {
            return;
        };
        let context = SessionContext {
            session_id,
            connection: owner,
        };
        match realm.route(&context, message) {
            Ok(()) => {}
            Err(RouteError::Failed(envelope)) => envelope.send_to(connection),
            Err(error @ RouteError::ProtocolViolation { .. }) => {
                self.replace_phase(Phase::Idle);
                self.abort_session(connection, &realm, session_id, &error.to_string());
            }
        }
    }

    fn abort_session(&self, connection: &dyn Connection, realm: &Arc<Realm>, session_id: SessionId, message: &str) {
        if let Err(error) = realm.abort(
            session_id,
            CloseDetails::with_message(message),
            uri::ERROR_PROTOCOL_VIOLATION,
        ) {
            tracing::warn!(realm = %realm.name(), %session_id, %error, "abort rejected");
        }
        self.finished.lock().push((Arc::clone(realm), session_id));
        abort_connection(connection, uri::ERROR_PROTOCOL_VIOLATION, message);
    }

    fn release_finished(&self) {
        let finished = std::mem::take(&mut *self.finished.lock());
        for (realm, session_id) in finished {
            if let Err(error) = realm.sessions().forget(session_id) {
                tracing::debug!(realm = %realm.name(), %session_id, %error, "forget skipped");
            }
            self.allocator.release(session_id);
        }
    }
}

impl ConnectionListener for SessionGateway {
    fn on_message(&self, connection: &dyn Connection, message: &WampMessage) {
        match message.message_type {
            MessageType::Hello => self.handle_hello(connection, message),
            MessageType::Goodbye => self.handle_goodbye(connection, message),
            MessageType::Abort => self.handle_abort(connection, message),
            _ => self.handle_request(connection, message),
        }
    }

    fn on_closed(&self, connection: &dyn Connection) {
        if let Phase::Established { realm, session_id } = self.replace_phase(Phase::Idle) {
            tracing::info!(connection = connection.id(), realm = %realm.name(), %session_id, "session lost");
            if let Err(error) = realm.session_lost(session_id) {
                tracing::warn!(realm = %realm.name(), %session_id, %error, "session_lost rejected");
            }
            self.finished.lock().push((realm, session_id));
        }
        self.release_finished();
    }

    fn on_error(&self, connection: &dyn Connection, error: &ConnectionError) {
        tracing::warn!(connection = connection.id(), session_id = ?self.session_id(), %error, "connection error");
    }
}

impl fmt::Debug for SessionGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGateway")
            .field("session_id", &self.session_id())
            .finish_non_exhaustive()
    }
}

fn parse_hello(message: &WampMessage) -> Result<(String, HelloDetails), MessageError> {
    message.expect_arity(2, 2)?;
    let realm = message.str_field(0)?.to_string();
    let details = HelloDetails::new(message.dict_field(1)?.clone());
    Ok((realm, details))
}

fn parse_close(message: &WampMessage, expected: MessageType) -> Result<(CloseDetails, String), MessageError> {
    message.expect_type(expected)?;
    message.expect_arity(2, 2)?;
    let details = CloseDetails::new(message.dict_field(0)?.clone());
    let reason = message.str_field(1)?.to_string();
    Ok((details, reason))
}

fn rejection_message(error: &RealmError) -> String {
    match error {
        RealmError::HelloRejected { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn abort_connection(connection: &dyn Connection, reason: &str, message: &str) {
    tracing::debug!(connection = connection.id(), reason, message, "aborting connection");
    connection.send(WampMessage::abort(&CloseDetails::with_message(message), reason));
    connection.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{LocalConnection, LocalPeer};
    use crate::error::ErrorEnvelope;
    use crate::roles::RouterRoles;
    use crate::session::SessionState;
    use serde_json::json;

    struct Fixture {
        registry: Arc<RealmRegistry>,
        allocator: Arc<SessionIdAllocator>,
        local: Arc<LocalConnection>,
        peer: LocalPeer,
        gateway: Arc<SessionGateway>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(RealmRegistry::new());
        registry
            .insert(Realm::unrouted("realm1", RouterRoles::default()))
            .unwrap();
        let allocator = Arc::new(SessionIdAllocator::new());
        let (local, peer) = LocalConnection::pair("test", 16);
        let connection: Arc<dyn Connection> = local.clone();
        let gateway = SessionGateway::attach(&connection, registry.clone(), allocator.clone());
        local.open();
        Fixture {
            registry,
            allocator,
            local,
            peer,
            gateway,
        }
    }

    fn hello(realm: &str) -> WampMessage {
        WampMessage::hello(realm, &HelloDetails::with_roles(["caller", "subscriber"]))
    }

    fn join(f: &Fixture) -> SessionId {
        f.local.receive(hello("realm1"));
        let welcome = f.peer.try_recv().unwrap();
        assert_eq!(welcome.message_type, MessageType::Welcome);
        SessionId::new(welcome.id_field(0).unwrap())
    }

    #[test]
    fn test_hello_welcome() {
        let f = fixture();
        let session_id = join(&f);
        assert_eq!(f.gateway.session_id(), Some(session_id));
        assert!(f.allocator.is_reserved(session_id));

        let realm = f.registry.get("realm1").unwrap();
        assert_eq!(realm.sessions().state(session_id), Some(SessionState::Active));
    }

    #[test]
    fn test_unknown_realm_aborts() {
        let f = fixture();
        f.local.receive(hello("nowhere"));
        let abort = f.peer.try_recv().unwrap();
        assert_eq!(abort.message_type, MessageType::Abort);
        assert_eq!(abort.str_field(1).unwrap(), uri::ERROR_NO_SUCH_REALM);
        assert!(!f.local.is_open());
    }

    #[test]
    fn test_hello_without_roles_aborts() {
        let f = fixture();
        f.local.receive(WampMessage::hello("realm1", &HelloDetails::default()));
        let abort = f.peer.try_recv().unwrap();
        assert_eq!(abort.message_type, MessageType::Abort);
        assert_eq!(abort.str_field(1).unwrap(), uri::ERROR_NO_SUCH_ROLE);
        assert!(f.allocator.is_empty());
    }

    #[test]
    fn test_goodbye_round_trip() {
        let f = fixture();
        let session_id = join(&f);
        f.local.receive(WampMessage::goodbye(&CloseDetails::default(), uri::CLOSE_NORMAL));

        let reply = f.peer.try_recv().unwrap();
        assert_eq!(reply.message_type, MessageType::Goodbye);
        assert_eq!(reply.str_field(1).unwrap(), uri::CLOSE_GOODBYE_AND_OUT);
        assert_eq!(f.gateway.session_id(), None);
        assert!(f.local.is_open());

        f.local.close();
        assert!(!f.allocator.is_reserved(session_id));
        assert_eq!(f.registry.get("realm1").unwrap().sessions().state(session_id), None);
    }

    #[test]
    fn test_goodbye_and_out_not_echoed() {
        let f = fixture();
        join(&f);
        f.local.receive(WampMessage::goodbye(&CloseDetails::default(), uri::CLOSE_GOODBYE_AND_OUT));
        assert!(f.peer.try_recv().is_none());
    }

    #[test]
    fn test_rejoin_after_goodbye() {
        let f = fixture();
        let first = join(&f);
        f.local.receive(WampMessage::goodbye(&CloseDetails::default(), uri::CLOSE_NORMAL));
        f.peer.drain();
        let second = join(&f);
        assert_ne!(first, second);
    }

    #[test]
    fn test_second_hello_is_protocol_violation() {
        let f = fixture();
        let session_id = join(&f);
        f.local.receive(hello("realm1"));

        let abort = f.peer.try_recv().unwrap();
        assert_eq!(abort.message_type, MessageType::Abort);
        assert_eq!(abort.str_field(1).unwrap(), uri::ERROR_PROTOCOL_VIOLATION);
        assert!(!f.local.is_open());
        assert!(!f.allocator.is_reserved(session_id));
    }

    #[test]
    fn test_request_before_hello_aborts() {
        let f = fixture();
        f.local.receive(WampMessage::new(
            MessageType::Call,
            vec![json!(1), json!({}), json!("com.add")],
        ));
        let abort = f.peer.try_recv().unwrap();
        assert_eq!(abort.message_type, MessageType::Abort);
        assert!(!f.local.is_open());
    }

    #[test]
    fn test_failed_request_gets_error() {
        let f = fixture();
        join(&f);
        f.local.receive(WampMessage::new(
            MessageType::Subscribe,
            vec![json!(5), json!({}), json!("com.topic")],
        ));
        let error = ErrorEnvelope::from_message(&f.peer.try_recv().unwrap()).unwrap();
        assert_eq!(error.request_type, MessageType::Subscribe);
        assert_eq!(error.request_id, 5);
        assert_eq!(error.error, uri::ERROR_NOT_SUPPORTED);
    }

    #[test]
    fn test_router_message_from_client_aborts() {
        let f = fixture();
        let session_id = join(&f);
        let realm = f.registry.get("realm1").unwrap();
        f.local.receive(WampMessage::welcome(session_id, realm.welcome_details()));

        let abort = f.peer.try_recv().unwrap();
        assert_eq!(abort.message_type, MessageType::Abort);
        assert_eq!(abort.str_field(1).unwrap(), uri::ERROR_PROTOCOL_VIOLATION);
        assert!(f.peer.try_recv().is_none());
        assert!(!f.local.is_open());
        assert_eq!(f.gateway.session_id(), None);

        let stats = realm.stats();
        assert_eq!(stats.protocol_violations, 1);
        assert_eq!(stats.sessions.closed_abort, 1);
        assert_eq!(stats.sessions.closed_disconnection, 0);
        assert!(!f.allocator.is_reserved(session_id));

        // Later traffic is dropped by the closed connection.
        assert!(!f.local.receive(WampMessage::new(
            MessageType::Event,
            vec![json!(1), json!(2), json!({})],
        )));
    }

    #[test]
    fn test_transport_loss() {
        let f = fixture();
        let session_id = join(&f);
        let realm = f.registry.get("realm1").unwrap();
        f.local.fail(ConnectionError::Io("reset".into()), true);

        assert_eq!(realm.stats().sessions.closed_disconnection, 1);
        assert_eq!(realm.sessions().state(session_id), None);
        assert!(!f.allocator.is_reserved(session_id));
    }

    #[test]
    fn test_peer_abort_closes() {
        let f = fixture();
        join(&f);
        let realm = f.registry.get("realm1").unwrap();
        f.local.receive(WampMessage::abort(&CloseDetails::default(), uri::CLOSE_SYSTEM_SHUTDOWN));
        assert!(!f.local.is_open());
        assert_eq!(realm.stats().sessions.closed_abort, 1);
        assert_eq!(realm.stats().sessions.closed_disconnection, 0);
    }

    #[test]
    fn test_shutdown() {
        let f = fixture();
        join(&f);
        assert!(f.gateway.shutdown(uri::CLOSE_SYSTEM_SHUTDOWN));
        assert!(!f.gateway.shutdown(uri::CLOSE_SYSTEM_SHUTDOWN));

        let goodbye = f.peer.try_recv().unwrap();
        assert_eq!(goodbye.message_type, MessageType::Goodbye);
        assert_eq!(goodbye.str_field(1).unwrap(), uri::CLOSE_SYSTEM_SHUTDOWN);

        f.local.receive(WampMessage::goodbye(&CloseDetails::default(), uri::CLOSE_GOODBYE_AND_OUT));
        assert!(f.peer.try_recv().is_none());
        assert!(f.local.is_open());
        let realm = f.registry.get("realm1").unwrap();
        assert_eq!(realm.stats().sessions.closed_goodbye, 1);
    }
}
