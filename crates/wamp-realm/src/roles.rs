// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Router capability descriptor.
//!
//! Declares which advanced dealer and broker features a realm supports.
//! A realm fixes its descriptor at construction and discloses the same value
//! in every WELCOME, so two sessions joining one realm always see identical
//! capabilities.
//!
//! # Disclosure
//!
//! ```text
//! "roles": {
//!     "dealer": {"features": {"call_canceling": true, ...}},
//!     "broker": {"features": {"event_retention": true, ...}}
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn default_true() -> bool {
    true
}

/// Advanced RPC features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealerFeatures {
    /// Registrations may use prefix/wildcard matching.
    #[serde(default = "default_true")]
    pub pattern_based_registration: bool,

    /// Several callees may share one registration.
    #[serde(default = "default_true")]
    pub shared_registration: bool,

    /// Callees may learn the caller's session id.
    #[serde(default = "default_true")]
    pub caller_identification: bool,

    /// Calls may yield intermediate results.
    #[serde(default = "default_true")]
    pub progressive_call_results: bool,

    /// Callers may cancel outstanding calls.
    #[serde(default = "default_true")]
    pub call_canceling: bool,
}

impl Default for DealerFeatures {
    fn default() -> Self {
        Self {
            pattern_based_registration: true,
            shared_registration: true,
            caller_identification: true,
            progressive_call_results: true,
            call_canceling: true,
        }
    }
}

impl DealerFeatures {
    /// `features` dictionary as disclosed to peers.
    pub fn to_value(&self) -> Value {
        json!({
            "pattern_based_registration": self.pattern_based_registration,
            "shared_registration": self.shared_registration,
            "caller_identification": self.caller_identification,
            "progressive_call_results": self.progressive_call_results,
            "call_canceling": self.call_canceling,
        })
    }
}

/// Advanced pub/sub features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerFeatures {
    /// Subscribers may learn the publisher's session id.
    #[serde(default = "default_true")]
    pub publisher_identification: bool,

    /// Subscriptions may use prefix/wildcard matching.
    #[serde(default = "default_true")]
    pub pattern_based_subscription: bool,

    /// Publishers may exclude themselves from receiving their own events.
    #[serde(default = "default_true")]
    pub publisher_exclusion: bool,

    /// Publishers may restrict delivery with allow/deny lists of subscribers.
    #[serde(default = "default_true", rename = "subscriber_blackwhite_listing")]
    pub subscriber_allow_deny_listing: bool,

    /// The last event of a topic may be retained for late subscribers.
    #[serde(default = "default_true")]
    pub event_retention: bool,
}

impl Default for BrokerFeatures {
    fn default() -> Self {
        Self {
            publisher_identification: true,
            pattern_based_subscription: true,
            publisher_exclusion: true,
            subscriber_allow_deny_listing: true,
            event_retention: true,
        }
    }
}

impl BrokerFeatures {
    /// `features` dictionary as disclosed to peers.
    pub fn to_value(&self) -> Value {
        json!({
            "publisher_identification": self.publisher_identification,
            "pattern_based_subscription": self.pattern_based_subscription,
            "publisher_exclusion": self.publisher_exclusion,
            "subscriber_blackwhite_listing": self.subscriber_allow_deny_listing,
            "event_retention": self.event_retention,
        })
    }
}

/// Capability descriptor of one realm.
///
/// `Default` enables every feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterRoles {
    /// RPC role features.
    #[serde(default)]
    pub dealer: DealerFeatures,

    /// Pub/sub role features.
    #[serde(default)]
    pub broker: BrokerFeatures,
}

impl RouterRoles {
    /// The `roles` value placed in WELCOME details.
    pub fn to_roles_value(&self) -> Value {
        json!({
            "dealer": {"features": self.dealer.to_value()},
            "broker": {"features": self.broker.to_value()},
        })
    }
}
