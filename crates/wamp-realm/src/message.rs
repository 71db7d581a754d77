// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoded WAMP v2 protocol messages.
//!
//! The hub never sees bytes: the transport and its codec hand over messages
//! as a type code followed by an ordered list of structured values, which is
//! exactly the array form every WAMP serializer produces.
//!
//! ```text
//! [HELLO, Realm|uri, Details|dict]
//! [WELCOME, Session|id, Details|dict]
//! [ABORT, Details|dict, Reason|uri]
//! [GOODBYE, Details|dict, Reason|uri]
//! [ERROR, REQUEST.Type|int, REQUEST.Request|id, Details|dict, Error|uri, ...]
//! ```

use crate::details::{CloseDetails, Details, HelloDetails, WelcomeDetails};
use crate::error::MessageError;
use crate::session::SessionId;
use serde_json::Value;
use std::fmt;

/// WAMP v2 message type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum MessageType {
    Hello = 1,
    Welcome = 2,
    Abort = 3,
    Goodbye = 6,
    Error = 8,
    Publish = 16,
    Published = 17,
    Subscribe = 32,
    Subscribed = 33,
    Unsubscribe = 34,
    Unsubscribed = 35,
    Event = 36,
    Call = 48,
    Cancel = 49,
    Result = 50,
    Register = 64,
    Registered = 65,
    Unregister = 66,
    Unregistered = 67,
    Invocation = 68,
    Interrupt = 69,
    Yield = 70,
}

/// Which routing role consumes a message sent by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingRole {
    /// Session establishment and teardown.
    Session,
    /// RPC traffic (registrations, calls, invocation replies).
    Dealer,
    /// Pub/sub traffic (subscriptions, publications).
    Broker,
    /// Messages only a router sends; a client must never emit them.
    RouterOnly,
}

impl MessageType {
    /// Numeric code on the wire.
    pub const fn code(self) -> u64 {
        self as u64
    }

    /// Look up a message type from its wire code.
    pub fn from_code(code: u64) -> Option<Self> {
        let ty = match code {
            1 => Self::Hello,
            2 => Self::Welcome,
            3 => Self::Abort,
            6 => Self::Goodbye,
            8 => Self::Error,
            16 => Self::Publish,
            17 => Self::Published,
            32 => Self::Subscribe,
            33 => Self::Subscribed,
            34 => Self::Unsubscribe,
            35 => Self::Unsubscribed,
            36 => Self::Event,
            48 => Self::Call,
            49 => Self::Cancel,
            50 => Self::Result,
            64 => Self::Register,
            65 => Self::Registered,
            66 => Self::Unregister,
            67 => Self::Unregistered,
            68 => Self::Invocation,
            69 => Self::Interrupt,
            70 => Self::Yield,
            _ => return None,
        };
        Some(ty)
    }

    /// Classify a message received from a client.
    ///
    /// ERROR coming from a client is the callee failing an INVOCATION, so it
    /// belongs to the dealer.
    pub const fn role(self) -> RoutingRole {
        match self {
            Self::Hello | Self::Abort | Self::Goodbye => RoutingRole::Session,
            Self::Register
            | Self::Unregister
            | Self::Call
            | Self::Cancel
            | Self::Yield
            | Self::Error => RoutingRole::Dealer,
            Self::Subscribe | Self::Unsubscribe | Self::Publish => RoutingRole::Broker,
            Self::Welcome
            | Self::Published
            | Self::Subscribed
            | Self::Unsubscribed
            | Self::Event
            | Self::Result
            | Self::Registered
            | Self::Unregistered
            | Self::Invocation
            | Self::Interrupt => RoutingRole::RouterOnly,
        }
    }

    /// Whether the first argument of this message is a request id.
    pub const fn carries_request_id(self) -> bool {
        matches!(
            self,
            Self::Publish
                | Self::Subscribe
                | Self::Unsubscribe
                | Self::Call
                | Self::Cancel
                | Self::Register
                | Self::Unregister
                | Self::Yield
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct WampMessage {
    /// Message type code.
    pub message_type: MessageType,
    /// Fields following the type code, in wire order.
    pub arguments: Vec<Value>,
}

impl WampMessage {
    /// Create a message from its type and fields.
    pub fn new(message_type: MessageType, arguments: Vec<Value>) -> Self {
        Self {
            message_type,
            arguments,
        }
    }

    /// Parse the array form `[code, field, ...]` produced by a codec.
    pub fn from_array(array: Vec<Value>) -> Result<Self, MessageError> {
        let mut fields = array.into_iter();
        let code = fields
            .next()
            .ok_or(MessageError::Empty)?
            .as_u64()
            .ok_or(MessageError::InvalidTypeCode)?;
        let message_type = MessageType::from_code(code).ok_or(MessageError::UnknownType(code))?;
        Ok(Self::new(message_type, fields.collect()))
    }

    /// Array form `[code, field, ...]` handed to a codec.
    pub fn into_array(self) -> Vec<Value> {
        let mut array = Vec::with_capacity(self.arguments.len() + 1);
        array.push(Value::from(self.message_type.code()));
        array.extend(self.arguments);
        array
    }

    /// `[HELLO, Realm|uri, Details|dict]`
    pub fn hello(realm: &str, details: &HelloDetails) -> Self {
        Self::new(
            MessageType::Hello,
            vec![Value::from(realm), Value::Object(details.as_map().clone())],
        )
    }

    /// `[WELCOME, Session|id, Details|dict]`
    pub fn welcome(session_id: SessionId, details: &WelcomeDetails) -> Self {
        Self::new(
            MessageType::Welcome,
            vec![
                Value::from(session_id.get()),
                Value::Object(details.as_map().clone()),
            ],
        )
    }

    /// `[ABORT, Details|dict, Reason|uri]`
    pub fn abort(details: &CloseDetails, reason: &str) -> Self {
        Self::new(
            MessageType::Abort,
            vec![Value::Object(details.as_map().clone()), Value::from(reason)],
        )
    }

    /// `[GOODBYE, Details|dict, Reason|uri]`
    pub fn goodbye(details: &CloseDetails, reason: &str) -> Self {
        Self::new(
            MessageType::Goodbye,
            vec![Value::Object(details.as_map().clone()), Value::from(reason)],
        )
    }

    /// Ensure this message has the expected type.
    pub fn expect_type(&self, expected: MessageType) -> Result<(), MessageError> {
        if self.message_type == expected {
            Ok(())
        } else {
            Err(MessageError::WrongType {
                expected,
                actual: self.message_type,
            })
        }
    }

    /// Ensure at least `min` and at most `max` fields follow the type code.
    pub fn expect_arity(&self, min: usize, max: usize) -> Result<(), MessageError> {
        let len = self.arguments.len();
        if len < min || len > max {
            return Err(MessageError::Arity {
                message_type: self.message_type,
                min,
                max,
                actual: len,
            });
        }
        Ok(())
    }

    /// Field at `index`, which must be present.
    pub fn field(&self, index: usize) -> Result<&Value, MessageError> {
        self.arguments
            .get(index)
            .ok_or(MessageError::MissingField { index })
    }

    /// Field at `index` as an unsigned integer (ids, type codes).
    pub fn id_field(&self, index: usize) -> Result<u64, MessageError> {
        self.field(index)?
            .as_u64()
            .ok_or(MessageError::FieldType {
                index,
                expected: "integer",
            })
    }

    /// Field at `index` as a string (URIs).
    pub fn str_field(&self, index: usize) -> Result<&str, MessageError> {
        self.field(index)?
            .as_str()
            .ok_or(MessageError::FieldType {
                index,
                expected: "string",
            })
    }

    /// Field at `index` as a dictionary.
    pub fn dict_field(&self, index: usize) -> Result<&Details, MessageError> {
        self.field(index)?
            .as_object()
            .ok_or(MessageError::FieldType {
                index,
                expected: "dict",
            })
    }

    /// Optional field at `index` as a list; absent means empty.
    pub fn list_field_or_empty(&self, index: usize) -> Result<Vec<Value>, MessageError> {
        match self.arguments.get(index) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(_) => Err(MessageError::FieldType {
                index,
                expected: "list",
            }),
        }
    }

    /// Optional field at `index` as a dictionary; absent means empty.
    pub fn dict_field_or_empty(&self, index: usize) -> Result<Details, MessageError> {
        match self.arguments.get(index) {
            None => Ok(Details::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(MessageError::FieldType {
                index,
                expected: "dict",
            }),
        }
    }

    /// Request id of a client request, if this message type carries one.
    pub fn request_id(&self) -> Option<u64> {
        if self.message_type.carries_request_id() {
            self.arguments.first().and_then(Value::as_u64)
        } else {
            None
        }
    }
}
