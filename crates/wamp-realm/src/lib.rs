// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WAMP hub control plane
//!
//! Session lifecycle and realm control for a WAMP routing hub: the state
//! machine every session goes through, the capability descriptor disclosed
//! at handshake, the generic ERROR envelope and the connection contract all
//! routing traffic flows through.
//!
//! # Features
//!
//! - **Session lifecycle**: exactly-once `SessionCreated`/`SessionClosed`
//!   notifications, atomic per-session transitions
//! - **Realms**: isolated routing domains with pluggable RPC catalog and
//!   topic container
//! - **Error envelope**: minimal-shape ERROR encoding and lenient decoding
//! - **Connections**: ordered open/message/closed/error events, in-process
//!   transport for embedding and tests
//!
//! Wire framing, serialization and the call/publication matching algorithms
//! are external: messages arrive already decoded as [`WampMessage`].
//!
//! # Quick Start
//!
//! ```
//! use wamp_realm::{HelloDetails, Hub, HubConfig, MessageType, WampMessage};
//!
//! let hub = Hub::unrouted(HubConfig::single_realm("realm1")).unwrap();
//! let (connection, peer, gateway) = hub.connect_local("client-1");
//!
//! connection.receive(WampMessage::hello("realm1", &HelloDetails::with_roles(["caller"])));
//! let welcome = peer.try_recv().unwrap();
//! assert_eq!(welcome.message_type, MessageType::Welcome);
//! assert!(gateway.session_id().is_some());
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! auto_create_realms = false
//!
//! [connection]
//! outbound_capacity = 256
//!
//! [[realms]]
//! name = "realm1"
//!
//! [realms.roles.dealer]
//! call_canceling = false
//! ```

pub mod config;
pub mod connection;
pub mod details;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod lifecycle;
pub mod listener;
pub mod message;
pub mod realm;
pub mod registry;
pub mod roles;
pub mod session;
pub mod uri;

pub use config::{ConfigError, ConnectionConfig, HubConfig, RealmConfig};
pub use connection::{
    Connection, ConnectionError, ConnectionEvents, ConnectionStats, ConnectionStatsSnapshot,
    LinkState, LocalConnection, LocalPeer,
};
pub use details::{CloseDetails, Details, HelloDetails, WelcomeDetails};
pub use error::{ErrorEnvelope, ErrorShape, LifecycleError, MessageError, RealmError, RouteError};
pub use gateway::SessionGateway;
pub use hub::Hub;
pub use lifecycle::{SessionLifecycle, SessionStats, SessionStatsSnapshot, Transition};
pub use listener::{ConnectionListener, ListenerId, ListenerSet, SessionListener};
pub use message::{MessageType, RoutingRole, WampMessage};
pub use realm::{Realm, RealmStats, RealmStatsSnapshot, RpcCatalog, SessionContext, TopicContainer, Unrouted};
pub use registry::{RealmFactory, RealmRegistry};
pub use roles::{BrokerFeatures, DealerFeatures, RouterRoles};
pub use session::{
    SessionCloseType, SessionClosed, SessionCreated, SessionId, SessionIdAllocator,
    SessionSnapshot, SessionState, MAX_SESSION_ID,
};
