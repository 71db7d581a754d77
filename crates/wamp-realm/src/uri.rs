// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Well-known WAMP URIs and URI validation.

use regex::Regex;
use std::sync::OnceLock;

/// Normal session close.
pub const CLOSE_NORMAL: &str = "wamp.close.normal";
/// The hub is shutting down.
pub const CLOSE_SYSTEM_SHUTDOWN: &str = "wamp.close.system_shutdown";
/// The realm the session was attached to is being closed.
pub const CLOSE_REALM: &str = "wamp.close.close_realm";
/// Reply to a peer-initiated GOODBYE.
pub const CLOSE_GOODBYE_AND_OUT: &str = "wamp.close.goodbye_and_out";

/// The peer is not allowed to join or to perform the request.
pub const ERROR_NOT_AUTHORIZED: &str = "wamp.error.not_authorized";
/// HELLO named a realm this hub does not serve.
pub const ERROR_NO_SUCH_REALM: &str = "wamp.error.no_such_realm";
/// HELLO announced no role the hub understands.
pub const ERROR_NO_SUCH_ROLE: &str = "wamp.error.no_such_role";
/// The peer broke the protocol state machine or sent a malformed message.
pub const ERROR_PROTOCOL_VIOLATION: &str = "wamp.error.protocol_violation";
/// A request carried invalid arguments.
pub const ERROR_INVALID_ARGUMENT: &str = "wamp.error.invalid_argument";
/// A request used a malformed URI.
pub const ERROR_INVALID_URI: &str = "wamp.error.invalid_uri";
/// The realm has no handler for this kind of request.
pub const ERROR_NOT_SUPPORTED: &str = "wamp.error.not_supported";

fn loose_pattern() -> &'static Regex {
    static LOOSE: OnceLock<Regex> = OnceLock::new();
    LOOSE.get_or_init(|| Regex::new(r"^([^\s\.#]+\.)*([^\s\.#]+)$").expect("valid URI pattern"))
}

fn strict_pattern() -> &'static Regex {
    static STRICT: OnceLock<Regex> = OnceLock::new();
    STRICT.get_or_init(|| Regex::new(r"^([0-9a-z_]+\.)*([0-9a-z_]+)$").expect("valid URI pattern"))
}

/// Check a URI against the loose rules (non-empty dot separated components
/// without whitespace or `#`).
pub fn is_valid_uri(uri: &str) -> bool {
    loose_pattern().is_match(uri)
}

/// Check a URI against the strict rules (lowercase letters, digits and
/// underscores only).
pub fn is_strict_uri(uri: &str) -> bool {
    strict_pattern().is_match(uri)
}

/// Strict or loose check, as configured.
pub fn check(uri: &str, strict: bool) -> bool {
    if strict {
        is_strict_uri(uri)
    } else {
        is_valid_uri(uri)
    }
}
