// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Realm registry: the named realms served by one hub.
//!
//! # Thread Safety
//!
//! Lookups and insertions go through a sharded map; a realm is shared as
//! `Arc<Realm>`. Removing a realm only stops new sessions from joining it:
//! sessions already bound keep their `Arc` until they close.

use crate::config::HubConfig;
use crate::error::RealmError;
use crate::realm::Realm;
use crate::roles::RouterRoles;
use crate::uri;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// Builds a realm on first use.
pub type RealmFactory = Arc<dyn Fn(&str) -> Realm + Send + Sync>;

/// Named realms of one hub.
#[derive(Default)]
pub struct RealmRegistry {
    realms: DashMap<String, Arc<Realm>>,
    factory: Option<RealmFactory>,
    strict_uris: bool,
}

impl RealmRegistry {
    /// Empty registry without auto-creation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty registry that creates unknown realms with `factory`.
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Realm + Send + Sync + 'static,
    {
        Self {
            realms: DashMap::new(),
            factory: Some(Arc::new(factory)),
            strict_uris: false,
        }
    }

    /// Validate realm names with the strict URI rules.
    pub fn strict_uris(mut self, strict: bool) -> Self {
        self.strict_uris = strict;
        self
    }

    /// Registry holding every realm of `config`.
    ///
    /// `build` creates a realm from its name and roles; it also serves
    /// auto-creation (with `default_roles`) when the config enables it.
    pub fn from_config<F>(config: &HubConfig, build: F) -> Result<Self, RealmError>
    where
        F: Fn(&str, RouterRoles) -> Realm + Send + Sync + 'static,
    {
        let build = Arc::new(build);
        let factory: Option<RealmFactory> = if config.auto_create_realms {
            let build = Arc::clone(&build);
            let roles = config.default_roles;
            Some(Arc::new(move |name: &str| build(name, roles)))
        } else {
            None
        };

        let registry = Self {
            realms: DashMap::new(),
            factory,
            strict_uris: config.strict_uris,
        };
        for realm in &config.realms {
            registry.insert(build(&realm.name, realm.roles))?;
        }
        Ok(registry)
    }

    /// Add a realm. Fails if the name is taken or not a valid URI.
    pub fn insert(&self, realm: Realm) -> Result<Arc<Realm>, RealmError> {
        if !uri::check(realm.name(), self.strict_uris) {
            return Err(RealmError::InvalidRealmName(realm.name().to_string()));
        }
        match self.realms.entry(realm.name().to_string()) {
            Entry::Occupied(entry) => Err(RealmError::RealmExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                let realm = Arc::new(realm);
                entry.insert(Arc::clone(&realm));
                tracing::info!(realm = %realm.name(), "realm registered");
                Ok(realm)
            }
        }
    }

    /// Realm by name.
    pub fn get(&self, name: &str) -> Option<Arc<Realm>> {
        self.realms.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Realm a HELLO asks for, auto-created when enabled.
    pub fn resolve(&self, name: &str) -> Result<Arc<Realm>, RealmError> {
        if let Some(realm) = self.get(name) {
            return Ok(realm);
        }
        let Some(factory) = &self.factory else {
            return Err(RealmError::NoSuchRealm(name.to_string()));
        };
        if !uri::check(name, self.strict_uris) {
            return Err(RealmError::InvalidRealmName(name.to_string()));
        }

        let realm = self
            .realms
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(realm = %name, "realm auto-created");
                Arc::new(factory(name))
            })
            .value()
            .clone();
        Ok(realm)
    }

    /// Stop serving a realm.
    pub fn remove(&self, name: &str) -> Option<Arc<Realm>> {
        let removed = self.realms.remove(name).map(|(_, realm)| realm);
        if removed.is_some() {
            tracing::info!(realm = %name, "realm removed");
        }
        removed
    }

    /// Names of all realms, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.realms.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of realms.
    pub fn len(&self) -> usize {
        self.realms.len()
    }

    /// Whether no realm is registered.
    pub fn is_empty(&self) -> bool {
        self.realms.is_empty()
    }

    /// Whether unknown realms are created on demand.
    pub fn auto_creates(&self) -> bool {
        self.factory.is_some()
    }
}

impl fmt::Debug for RealmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealmRegistry")
            .field("realms", &self.names())
            .field("auto_create", &self.auto_creates())
            .field("strict_uris", &self.strict_uris)
            .finish()
    }
}
