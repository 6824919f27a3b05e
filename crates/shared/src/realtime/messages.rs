//! Server Messages sent to WebSocket clients
//!
//! Envelope design optimized for bandwidth:
//! - Tag "t" (type) for quick message type identification
//! - Content "d" for message payload

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound event names. Single source of truth so the router, the
/// dispatcher and the handler never drift apart.
pub mod outbound {
    pub const ENTITY_CREATED: &str = "entity:created";
    pub const ENTITY_UPDATED: &str = "entity:updated";
    pub const ENTITY_DELETED: &str = "entity:deleted";
    pub const TICKET_ASSIGNED: &str = "ticket:assigned";
    pub const NOTIFICATION_NEW: &str = "notification:new";
    pub const USER_ONLINE: &str = "user:online";
    pub const USER_OFFLINE: &str = "user:offline";
    pub const ERROR: &str = "error";
    pub const UNAUTHORIZED: &str = "unauthorized";
}

/// Server message envelope sent to WebSocket clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", content = "d")]
pub enum ServerMessage {
    /// Response to a client command (e.g. successful admission)
    #[serde(rename = "ack")]
    Ack { id: String, status: String },

    /// A named event fanned out to the tenant or delivered to a user
    #[serde(rename = "evt")]
    Event { event: OutboundEvent },

    /// System error message
    #[serde(rename = "err")]
    Error { code: String, msg: String },
}

/// A named event with an opaque payload, as delivered to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundEvent {
    /// Event name (e.g. "entity:updated", "notification:new")
    pub name: String,
    /// Event payload; opaque to this core
    pub payload: Value,
    /// Unix timestamp in milliseconds
    pub occurred_at: i64,
}

impl ServerMessage {
    pub fn event(name: impl Into<String>, payload: Value, occurred_at: i64) -> Self {
        ServerMessage::Event {
            event: OutboundEvent {
                name: name.into(),
                payload,
                occurred_at,
            },
        }
    }

    pub fn error(code: impl Into<String>, msg: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.into(),
            msg: msg.into(),
        }
    }
}
