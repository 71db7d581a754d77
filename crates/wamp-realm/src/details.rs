// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Handshake and teardown detail dictionaries.
//!
//! Details are opaque key/value payloads on the wire. These wrappers only
//! add typed access to the few keys the control plane itself reads.

use crate::roles::RouterRoles;
use serde_json::{Map, Value};

/// Opaque key/value payload.
pub type Details = Map<String, Value>;

/// Client roles a joining peer may announce in HELLO.
pub const CLIENT_ROLES: [&str; 4] = ["caller", "callee", "publisher", "subscriber"];

/// Details a peer sends in HELLO.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelloDetails(Details);

impl HelloDetails {
    /// Wrap a decoded HELLO details dictionary.
    pub fn new(details: Details) -> Self {
        Self(details)
    }

    /// Build details announcing the given client roles with no features.
    pub fn with_roles<'a>(roles: impl IntoIterator<Item = &'a str>) -> Self {
        let roles: Map<String, Value> = roles
            .into_iter()
            .map(|role| (role.to_string(), Value::Object(Map::new())))
            .collect();
        let mut details = Details::new();
        details.insert("roles".into(), Value::Object(roles));
        Self(details)
    }

    /// Client roles announced by the peer that this hub understands.
    pub fn client_roles(&self) -> Vec<&str> {
        match self.0.get("roles") {
            Some(Value::Object(roles)) => CLIENT_ROLES
                .iter()
                .copied()
                .filter(|role| roles.contains_key(*role))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Peer software identifier, if announced.
    pub fn agent(&self) -> Option<&str> {
        self.0.get("agent").and_then(Value::as_str)
    }

    /// Authentication id requested by the peer, if any.
    pub fn authid(&self) -> Option<&str> {
        self.0.get("authid").and_then(Value::as_str)
    }

    /// Raw dictionary.
    pub fn as_map(&self) -> &Details {
        &self.0
    }
}

/// Details the hub discloses back in WELCOME.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WelcomeDetails(Details);

impl WelcomeDetails {
    /// Wrap an already assembled dictionary.
    pub fn new(details: Details) -> Self {
        Self(details)
    }

    /// Disclose a realm's router roles, plus the realm name.
    pub fn for_realm(realm: &str, roles: &RouterRoles) -> Self {
        let mut details = Details::new();
        details.insert("realm".into(), Value::from(realm));
        details.insert("roles".into(), roles.to_roles_value());
        Self(details)
    }

    /// Add one extra entry (authid, authrole, agent...).
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Disclosed `roles` entry.
    pub fn roles(&self) -> Option<&Value> {
        self.0.get("roles")
    }

    /// Raw dictionary.
    pub fn as_map(&self) -> &Details {
        &self.0
    }
}

/// Details carried by GOODBYE and ABORT.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloseDetails(Details);

impl CloseDetails {
    /// Wrap a decoded dictionary.
    pub fn new(details: Details) -> Self {
        Self(details)
    }

    /// Details with a human readable `message`.
    pub fn with_message(message: impl Into<String>) -> Self {
        let mut details = Details::new();
        details.insert("message".into(), Value::String(message.into()));
        Self(details)
    }

    /// Human readable message, if present.
    pub fn message(&self) -> Option<&str> {
        self.0.get("message").and_then(Value::as_str)
    }

    /// Raw dictionary.
    pub fn as_map(&self) -> &Details {
        &self.0
    }
}
