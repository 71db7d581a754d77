// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hub: the realms of one process and the connections attached to them.

use crate::config::{ConfigError, HubConfig};
use crate::connection::{Connection, LocalConnection, LocalPeer};
use crate::gateway::SessionGateway;
use crate::realm::Realm;
use crate::registry::RealmRegistry;
use crate::roles::RouterRoles;
use crate::session::SessionIdAllocator;
use crate::uri;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Process-wide entry point: realm registry, session ids, connection settings.
#[derive(Debug)]
pub struct Hub {
    config: HubConfig,
    registry: Arc<RealmRegistry>,
    allocator: Arc<SessionIdAllocator>,
    /// Owned by their connections; dropped with them.
    gateways: Mutex<Vec<Weak<SessionGateway>>>,
}

impl Hub {
    /// Build a hub from a validated configuration.
    ///
    /// `build` creates each realm (with its catalog and container) from its
    /// name and roles.
    pub fn new<F>(config: HubConfig, build: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str, RouterRoles) -> Realm + Send + Sync + 'static,
    {
        config.validate()?;
        let registry = RealmRegistry::from_config(&config, build)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        tracing::info!(
            realms = ?registry.names(),
            auto_create = config.auto_create_realms,
            "hub started"
        );

        Ok(Self {
            config,
            registry: Arc::new(registry),
            allocator: Arc::new(SessionIdAllocator::new()),
            gateways: Mutex::new(Vec::new()),
        })
    }

    /// Hub whose realms route nothing; see [`crate::Unrouted`].
    pub fn unrouted(config: HubConfig) -> Result<Self, ConfigError> {
        Self::new(config, |name, roles| Realm::unrouted(name, roles))
    }

    /// Configuration the hub was built from.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Realms served by this hub.
    pub fn registry(&self) -> &Arc<RealmRegistry> {
        &self.registry
    }

    /// Session id allocator shared by every gateway.
    pub fn allocator(&self) -> &Arc<SessionIdAllocator> {
        &self.allocator
    }

    /// Attach a gateway to a transport connection.
    pub fn attach(&self, connection: &Arc<dyn Connection>) -> Arc<SessionGateway> {
        let gateway = SessionGateway::attach(connection, Arc::clone(&self.registry), Arc::clone(&self.allocator));
        let mut gateways = self.gateways.lock();
        gateways.retain(|gateway| gateway.strong_count() > 0);
        gateways.push(Arc::downgrade(&gateway));
        gateway
    }

    fn gateways(&self) -> Vec<Arc<SessionGateway>> {
        self.gateways.lock().iter().filter_map(Weak::upgrade).collect()
    }

    /// Stop serving `name` and send GOODBYE `wamp.close.close_realm` to every
    /// session bound to it.
    ///
    /// Returns the number of sessions closed, `None` if the realm is unknown.
    pub fn close_realm(&self, name: &str) -> Option<usize> {
        let realm = self.registry.remove(name)?;
        let closed = self
            .gateways()
            .iter()
            .filter(|gateway| gateway.shutdown_in(&realm, uri::CLOSE_REALM))
            .count();
        tracing::info!(realm = %name, sessions = closed, "realm closed");
        Some(closed)
    }

    /// Send GOODBYE `wamp.close.system_shutdown` to every bound session.
    ///
    /// Returns the number of sessions closed.
    pub fn shutdown(&self) -> usize {
        let closed = self
            .gateways()
            .iter()
            .filter(|gateway| gateway.shutdown(uri::CLOSE_SYSTEM_SHUTDOWN))
            .count();
        tracing::info!(sessions = closed, "hub shutdown");
        closed
    }

    /// Create an in-process connection, attach a gateway and open it.
    pub fn connect_local(&self, id: impl Into<String>) -> (Arc<LocalConnection>, LocalPeer, Arc<SessionGateway>) {
        let (local, peer) = LocalConnection::pair(id, self.config.connection.outbound_capacity);
        let connection: Arc<dyn Connection> = local.clone();
        let gateway = self.attach(&connection);
        local.open();
        (local, peer, gateway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RealmConfig;
    use crate::details::HelloDetails;
    use crate::message::{MessageType, WampMessage};

    fn join(hub: &Hub, realm: &str) -> (Arc<LocalConnection>, LocalPeer, Arc<SessionGateway>) {
        let (local, peer, gateway) = hub.connect_local(realm);
        local.receive(WampMessage::hello(realm, &HelloDetails::with_roles(["caller"])));
        assert_eq!(peer.try_recv().unwrap().message_type, MessageType::Welcome);
        (local, peer, gateway)
    }

    #[test]
    fn test_hub_from_config() {
        let hub = Hub::unrouted(HubConfig::single_realm("realm1")).unwrap();
        assert_eq!(hub.registry().names(), vec!["realm1".to_string()]);
        assert!(Hub::unrouted(HubConfig::default()).is_err());
    }

    #[test]
    fn test_connect_local_uses_capacity() {
        let mut config = HubConfig::single_realm("realm1");
        config.connection.outbound_capacity = 1;
        let hub = Hub::unrouted(config).unwrap();

        let (local, peer, gateway) = hub.connect_local("c1");
        local.receive(WampMessage::hello("realm1", &HelloDetails::with_roles(["callee"])));
        assert!(gateway.session_id().is_some());

        // WELCOME fills the queue; the next send is dropped.
        local.send(WampMessage::goodbye(&Default::default(), "x"));
        assert_eq!(local.stats().snapshot().messages_dropped, 1);
        assert_eq!(peer.try_recv().unwrap().message_type, MessageType::Welcome);
    }

    #[test]
    fn test_close_realm() {
        let mut config = HubConfig::single_realm("realm1");
        config.add_realm(RealmConfig::new("realm2"));
        let hub = Hub::unrouted(config).unwrap();

        let (_a, peer_a, gateway_a) = join(&hub, "realm1");
        let (_b, peer_b, gateway_b) = join(&hub, "realm2");
        let realm1 = hub.registry().get("realm1").unwrap();

        assert_eq!(hub.close_realm("realm1"), Some(1));
        let goodbye = peer_a.try_recv().unwrap();
        assert_eq!(goodbye.message_type, MessageType::Goodbye);
        assert_eq!(goodbye.str_field(1).unwrap(), uri::CLOSE_REALM);
        assert_eq!(gateway_a.session_id(), None);
        assert_eq!(realm1.stats().active_sessions, 0);

        assert!(peer_b.try_recv().is_none());
        assert!(gateway_b.session_id().is_some());
        assert_eq!(hub.registry().names(), vec!["realm2".to_string()]);
        assert_eq!(hub.close_realm("realm1"), None);
    }

    #[test]
    fn test_shutdown_skips_dropped_connections() {
        let hub = Hub::unrouted(HubConfig::single_realm("realm1")).unwrap();
        let kept = join(&hub, "realm1");
        let dropped = join(&hub, "realm1");
        dropped.0.close();
        drop(dropped);

        assert_eq!(hub.shutdown(), 1);
        assert_eq!(kept.1.try_recv().unwrap().str_field(1).unwrap(), uri::CLOSE_SYSTEM_SHUTDOWN);
        assert_eq!(hub.shutdown(), 0);
    }
}
