// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hub configuration.
//!
//! Supports both programmatic and file-based configuration.

use crate::roles::RouterRoles;
use crate::uri;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Hub configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Create unknown realms on first HELLO instead of aborting.
    #[serde(default)]
    pub auto_create_realms: bool,

    /// Roles of auto-created realms.
    #[serde(default)]
    pub default_roles: RouterRoles,

    /// Require realm names to follow the strict URI rules.
    #[serde(default)]
    pub strict_uris: bool,

    /// Per-connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Realms created at startup.
    #[serde(default)]
    pub realms: Vec<RealmConfig>,
}

impl HubConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// A hub serving one realm with every feature enabled.
    pub fn single_realm(name: impl Into<String>) -> Self {
        Self {
            realms: vec![RealmConfig::new(name)],
            ..Default::default()
        }
    }

    /// Add a realm.
    pub fn add_realm(&mut self, realm: RealmConfig) {
        self.realms.push(realm);
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realms.is_empty() && !self.auto_create_realms {
            return Err(ConfigError::Invalid(
                "No realms configured and auto_create_realms is off".into(),
            ));
        }

        if self.connection.outbound_capacity == 0 {
            return Err(ConfigError::Invalid(
                "connection.outbound_capacity must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for (i, realm) in self.realms.iter().enumerate() {
            if !uri::check(&realm.name, self.strict_uris) {
                return Err(ConfigError::Invalid(format!(
                    "Realm {} has invalid name {:?}",
                    i, realm.name
                )));
            }
            if !seen.insert(realm.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Realm {:?} is configured twice",
                    realm.name
                )));
            }
        }

        Ok(())
    }
}

/// Per-connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Outbound messages queued per connection before backpressure.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

fn default_outbound_capacity() -> usize {
    256
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: default_outbound_capacity(),
        }
    }
}

/// Configuration for a single realm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealmConfig {
    /// Realm URI.
    pub name: String,

    /// Capability descriptor.
    #[serde(default)]
    pub roles: RouterRoles,
}

impl RealmConfig {
    /// Realm with every feature enabled.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            roles: RouterRoles::default(),
        }
    }

    /// Set the capability descriptor.
    pub fn roles(mut self, roles: RouterRoles) -> Self {
        self.roles = roles;
        self
    }
}
