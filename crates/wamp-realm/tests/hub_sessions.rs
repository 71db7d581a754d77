// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::items_after_statements)] // Test helpers

//! Hub integration tests
//!
//! Drives in-process connections through the gateway against a realm with
//! a small RPC catalog that tracks registrations per session.

use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use wamp_realm::{
    uri, CloseDetails, Connection, ConnectionListener, ErrorEnvelope, HelloDetails, Hub,
    HubConfig, LocalConnection, LocalPeer, MessageType, Realm, RouterRoles, RpcCatalog,
    SessionClosed, SessionContext, SessionGateway, SessionId, SessionListener, Unrouted,
    WampMessage,
};

/// Procedures by URI, owned by the registering session.
#[derive(Default)]
struct Procedures {
    owners: Mutex<HashMap<String, SessionId>>,
}

impl RpcCatalog for Procedures {
    fn handle(&self, context: &SessionContext, message: &WampMessage) -> Result<(), ErrorEnvelope> {
        match message.message_type {
            MessageType::Register => {
                let request_id = message.id_field(0).unwrap_or_default();
                let procedure = message.str_field(2).unwrap_or_default().to_string();
                let mut owners = self.owners.lock();
                if owners.contains_key(&procedure) {
                    return Err(ErrorEnvelope::new(
                        MessageType::Register,
                        request_id,
                        "wamp.error.procedure_already_exists",
                    )
                    .with_arguments(vec![json!(procedure)]));
                }
                owners.insert(procedure, context.session_id);
                context.connection.send(WampMessage::new(
                    MessageType::Registered,
                    vec![json!(request_id), json!(owners.len())],
                ));
                Ok(())
            }
            _ => match ErrorEnvelope::for_request(message, uri::ERROR_NOT_SUPPORTED) {
                Ok(envelope) => Err(envelope),
                Err(_) => Ok(()),
            },
        }
    }
}

impl SessionListener for Procedures {
    fn on_session_closed(&self, event: &SessionClosed) {
        self.owners
            .lock()
            .retain(|_, owner| *owner != event.session_id);
    }
}

struct Client {
    local: Arc<LocalConnection>,
    peer: LocalPeer,
    gateway: Arc<SessionGateway>,
}

impl Client {
    fn join(hub: &Hub, realm: &str) -> Self {
        let (local, peer, gateway) = hub.connect_local("client");
        local.receive(WampMessage::hello(
            realm,
            &HelloDetails::with_roles(["caller", "callee"]),
        ));
        Self {
            local,
            peer,
            gateway,
        }
    }

    fn register(&self, request_id: u64, procedure: &str) -> WampMessage {
        self.local.receive(WampMessage::new(
            MessageType::Register,
            vec![json!(request_id), json!({}), json!(procedure)],
        ));
        self.peer.try_recv().unwrap()
    }
}

fn hub() -> (Hub, Arc<Procedures>) {
    let procedures = Arc::new(Procedures::default());
    let catalog = procedures.clone();
    let hub = Hub::new(HubConfig::single_realm("realm1"), move |name, roles| {
        Realm::new(name, roles, catalog.clone(), Arc::new(Unrouted))
    })
    .unwrap();
    (hub, procedures)
}

#[test]
fn test_welcome_discloses_realm_roles() {
    let (hub, _procedures) = hub();
    let a = Client::join(&hub, "realm1");
    let b = Client::join(&hub, "realm1");

    let welcome_a = a.peer.try_recv().unwrap();
    let welcome_b = b.peer.try_recv().unwrap();
    assert_eq!(welcome_a.message_type, MessageType::Welcome);
    assert_eq!(welcome_a.arguments[1], welcome_b.arguments[1]);
    assert_eq!(
        welcome_a.arguments[1]["roles"],
        RouterRoles::default().to_roles_value()
    );
    assert_ne!(a.gateway.session_id(), b.gateway.session_id());
}

#[test]
fn test_catalog_cleans_up_on_disconnect() {
    let (hub, procedures) = hub();
    let callee = Client::join(&hub, "realm1");
    callee.peer.drain();

    let registered = callee.register(1, "com.example.add");
    assert_eq!(registered.message_type, MessageType::Registered);
    assert_eq!(procedures.owners.lock().len(), 1);

    callee.local.close();
    assert!(procedures.owners.lock().is_empty());
    assert!(hub.allocator().is_empty());
}

#[test]
fn test_request_failure_uses_error_envelope() {
    let (hub, _procedures) = hub();
    let first = Client::join(&hub, "realm1");
    let second = Client::join(&hub, "realm1");
    first.peer.drain();
    second.peer.drain();

    first.register(1, "com.example.add");
    let error = second.register(7, "com.example.add");

    let envelope = ErrorEnvelope::from_message(&error).unwrap();
    assert_eq!(envelope.request_type, MessageType::Register);
    assert_eq!(envelope.request_id, 7);
    assert_eq!(envelope.arguments, vec![json!("com.example.add")]);
    assert_eq!(error.arguments.len(), 5);
}

#[test]
fn test_hub_shutdown_closes_every_session() {
    let (hub, _procedures) = hub();
    let clients: Vec<Client> = (0..4).map(|_| Client::join(&hub, "realm1")).collect();
    let realm = hub.registry().get("realm1").unwrap();
    assert_eq!(realm.stats().active_sessions, 4);

    for client in &clients {
        client.peer.drain();
    }
    assert_eq!(hub.shutdown(), 4);
    for client in &clients {
        let goodbye = client.peer.try_recv().unwrap();
        assert_eq!(goodbye.message_type, MessageType::Goodbye);
        assert_eq!(goodbye.str_field(1).unwrap(), uri::CLOSE_SYSTEM_SHUTDOWN);
        assert_eq!(client.gateway.session_id(), None);
    }
    assert_eq!(realm.stats().active_sessions, 0);
    assert_eq!(realm.stats().sessions.closed_goodbye, 4);
}

#[test]
fn test_no_message_after_close() {
    let (hub, procedures) = hub();
    let client = Client::join(&hub, "realm1");
    client.peer.drain();

    struct Counter(Mutex<Vec<MessageType>>);
    impl ConnectionListener for Counter {
        fn on_message(&self, _connection: &dyn Connection, message: &WampMessage) {
            self.0.lock().push(message.message_type);
        }
    }
    let counter = Arc::new(Counter(Mutex::new(Vec::new())));
    client.local.add_listener(counter.clone());

    client
        .local
        .receive(WampMessage::abort(&CloseDetails::default(), uri::CLOSE_NORMAL));
    assert!(!client.local.receive(WampMessage::new(
        MessageType::Register,
        vec![json!(1), json!({}), json!("late")],
    )));

    // The gateway closed the connection before the counter saw the ABORT.
    assert!(counter.0.lock().is_empty());
    assert!(procedures.owners.lock().is_empty());
}

#[test]
fn test_router_messages_from_client_abort_session() {
    let (hub, procedures) = hub();
    let client = Client::join(&hub, "realm1");
    let welcome = client.peer.try_recv().unwrap();
    client.register(1, "com.example.add");

    client.local.receive(welcome);
    client.local.receive(WampMessage::new(
        MessageType::Event,
        vec![json!(1), json!(2), json!({})],
    ));

    let outbound = client.peer.drain();
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].message_type, MessageType::Abort);
    assert_eq!(outbound[0].str_field(1).unwrap(), uri::ERROR_PROTOCOL_VIOLATION);
    assert!(!client.local.is_open());
    assert_eq!(client.gateway.session_id(), None);
    assert!(procedures.owners.lock().is_empty());
}

#[test]
fn test_auto_created_realm() {
    let config = HubConfig {
        auto_create_realms: true,
        ..Default::default()
    };
    let hub = Hub::unrouted(config).unwrap();
    let client = Client::join(&hub, "com.example.lazy");

    assert_eq!(client.peer.try_recv().unwrap().message_type, MessageType::Welcome);
    assert_eq!(hub.registry().names(), vec!["com.example.lazy".to_string()]);
}
