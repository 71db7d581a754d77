// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types and the generic ERROR envelope.
//!
//! # Envelope shapes
//!
//! ```text
//! [ERROR, REQUEST.Type|int, REQUEST.Request|id, Details|dict, Error|uri]
//! [ERROR, REQUEST.Type|int, REQUEST.Request|id, Details|dict, Error|uri, Arguments|list]
//! [ERROR, REQUEST.Type|int, REQUEST.Request|id, Details|dict, Error|uri, Arguments|list, ArgumentsKw|dict]
//! ```
//!
//! The shapes are strictly additive. Encoding picks the shortest shape that
//! still carries every populated field; decoding treats missing trailing
//! fields as empty containers, so an empty list and an absent list are the
//! same thing.

use crate::connection::Connection;
use crate::details::Details;
use crate::lifecycle::Transition;
use crate::message::{MessageType, WampMessage};
use crate::session::{SessionCloseType, SessionId, SessionState};
use crate::uri;
use serde_json::Value;
use thiserror::Error;

/// A decoded message does not have the expected layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("empty message")]
    Empty,

    #[error("message type code is not an integer")]
    InvalidTypeCode,

    #[error("unknown message type {0}")]
    UnknownType(u64),

    #[error("expected {expected} message, got {actual}")]
    WrongType {
        expected: MessageType,
        actual: MessageType,
    },

    #[error("{message_type} expects {min}..={max} fields, got {actual}")]
    Arity {
        message_type: MessageType,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("missing field {index}")]
    MissingField { index: usize },

    #[error("field {index} is not a {expected}")]
    FieldType { index: usize, expected: &'static str },
}

/// A session transition was rejected.
///
/// Rejections are always reported to the caller, who decides whether to log
/// them or abort the offending session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("session {session_id} is already active")]
    DuplicateHello { session_id: SessionId },

    #[error("session {session_id} is already closed by {close_type}")]
    AlreadyClosed {
        session_id: SessionId,
        close_type: SessionCloseType,
    },

    #[error("session {session_id} is not tracked")]
    UnknownSession { session_id: SessionId },

    #[error("{transition} is not allowed for session {session_id} in state {state}")]
    InvalidTransition {
        session_id: SessionId,
        state: SessionState,
        transition: Transition,
    },
}

impl LifecycleError {
    /// Session the rejected transition was aimed at.
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::DuplicateHello { session_id }
            | Self::AlreadyClosed { session_id, .. }
            | Self::UnknownSession { session_id }
            | Self::InvalidTransition { session_id, .. } => *session_id,
        }
    }

    /// Error URI reported to the peer.
    pub fn uri(&self) -> &'static str {
        uri::ERROR_PROTOCOL_VIOLATION
    }
}

/// Realm level failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RealmError {
    #[error("no such realm: {0}")]
    NoSuchRealm(String),

    #[error("realm already exists: {0}")]
    RealmExists(String),

    #[error("invalid realm name: {0:?}")]
    InvalidRealmName(String),

    #[error("hello rejected ({reason}): {message}")]
    HelloRejected { reason: String, message: String },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("malformed message: {0}")]
    Message(#[from] MessageError),
}

impl RealmError {
    /// Error URI reported to the peer.
    pub fn uri(&self) -> &str {
        match self {
            Self::NoSuchRealm(_) => uri::ERROR_NO_SUCH_REALM,
            Self::RealmExists(_) => uri::ERROR_INVALID_ARGUMENT,
            Self::InvalidRealmName(_) => uri::ERROR_INVALID_URI,
            Self::HelloRejected { reason, .. } => reason,
            Self::Lifecycle(e) => e.uri(),
            Self::Message(_) => uri::ERROR_PROTOCOL_VIOLATION,
        }
    }
}

/// Outcome of routing one client message that was not handled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    /// The request failed; answer it with this ERROR.
    #[error("request failed with {}", .0.error)]
    Failed(ErrorEnvelope),

    /// Clients may never send this message; the session must be aborted.
    #[error("{message_type} may not be sent by a client")]
    ProtocolViolation { message_type: MessageType },
}

impl From<ErrorEnvelope> for RouteError {
    fn from(envelope: ErrorEnvelope) -> Self {
        Self::Failed(envelope)
    }
}

/// Wire shape chosen for an ERROR message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorShape {
    /// Type, request, details, error.
    Bare,
    /// Bare plus positional arguments.
    WithArguments,
    /// Bare plus positional and keyword arguments.
    WithKeywords,
}

impl ErrorShape {
    /// Number of fields following the ERROR type code.
    pub const fn field_count(self) -> usize {
        match self {
            Self::Bare => 4,
            Self::WithArguments => 5,
            Self::WithKeywords => 6,
        }
    }
}

/// Failure of one outstanding request, correlated by request type and id.
///
/// Empty `arguments`/`arguments_keywords` mean "absent".
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEnvelope {
    pub request_type: MessageType,
    pub request_id: u64,
    pub details: Details,
    pub error: String,
    pub arguments: Vec<Value>,
    pub arguments_keywords: Details,
}

impl ErrorEnvelope {
    /// Bare envelope with empty details.
    pub fn new(request_type: MessageType, request_id: u64, error: impl Into<String>) -> Self {
        Self {
            request_type,
            request_id,
            details: Details::new(),
            error: error.into(),
            arguments: Vec::new(),
            arguments_keywords: Details::new(),
        }
    }

    /// Envelope failing the request carried by `request`.
    pub fn for_request(request: &WampMessage, error: impl Into<String>) -> Result<Self, MessageError> {
        let request_id = request
            .request_id()
            .ok_or(MessageError::MissingField { index: 0 })?;
        Ok(Self::new(request.message_type, request_id, error))
    }

    /// Replace the details dictionary.
    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }

    /// Set positional arguments.
    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Set keyword arguments.
    pub fn with_keywords(mut self, arguments_keywords: Details) -> Self {
        self.arguments_keywords = arguments_keywords;
        self
    }

    /// Shortest shape that carries every populated field.
    pub fn shape(&self) -> ErrorShape {
        if !self.arguments_keywords.is_empty() {
            ErrorShape::WithKeywords
        } else if !self.arguments.is_empty() {
            ErrorShape::WithArguments
        } else {
            ErrorShape::Bare
        }
    }

    /// Encode using the minimal shape.
    pub fn to_message(&self) -> WampMessage {
        let shape = self.shape();
        let mut fields = Vec::with_capacity(shape.field_count());
        fields.push(Value::from(self.request_type.code()));
        fields.push(Value::from(self.request_id));
        fields.push(Value::Object(self.details.clone()));
        fields.push(Value::from(self.error.as_str()));
        if shape != ErrorShape::Bare {
            fields.push(Value::Array(self.arguments.clone()));
        }
        if shape == ErrorShape::WithKeywords {
            fields.push(Value::Object(self.arguments_keywords.clone()));
        }
        WampMessage::new(MessageType::Error, fields)
    }

    /// Decode any of the three shapes.
    pub fn from_message(message: &WampMessage) -> Result<Self, MessageError> {
        message.expect_type(MessageType::Error)?;
        message.expect_arity(4, 6)?;

        let code = message.id_field(0)?;
        let request_type = MessageType::from_code(code).ok_or(MessageError::UnknownType(code))?;

        Ok(Self {
            request_type,
            request_id: message.id_field(1)?,
            details: message.dict_field(2)?.clone(),
            error: message.str_field(3)?.to_string(),
            arguments: message.list_field_or_empty(4)?,
            arguments_keywords: message.dict_field_or_empty(5)?,
        })
    }

    /// Send this envelope back through the originating connection.
    ///
    /// Delivery failures surface as connection errors, not here.
    pub fn send_to(&self, connection: &dyn Connection) {
        tracing::debug!(
            request_type = %self.request_type,
            request_id = self.request_id,
            error = %self.error,
            "sending error"
        );
        connection.send(self.to_message());
    }
}
