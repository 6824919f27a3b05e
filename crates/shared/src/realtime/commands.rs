//! Client Commands sent to the WebSocket Server

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Commands sent from client to server.
///
/// Payloads are opaque JSON maps to this core; domain-specific field shapes
/// are not validated here beyond the presence of an `id` for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "e", content = "p")]
pub enum ClientCommand {
    /// A CRM entity (lead, deal, contact) was created by this client
    #[serde(rename = "entity:create")]
    EntityCreate(Value),

    /// A CRM entity was updated by this client
    #[serde(rename = "entity:update")]
    EntityUpdate(Value),

    /// A CRM entity was deleted by this client
    #[serde(rename = "entity:delete")]
    EntityDelete(Value),

    /// A support ticket was assigned by this client
    #[serde(rename = "ticket:assign")]
    TicketAssign(Value),

    /// The client marked a notification as read
    #[serde(rename = "notification:read")]
    NotificationRead(Value),

    /// Presence heartbeat from the client
    #[serde(rename = "user:activity")]
    UserActivity(Value),

    /// Ping to keep the connection alive
    #[serde(rename = "ping")]
    Ping,
}

/// Coarse event categories, used for plan-tier subscription gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Entity,
    Ticket,
    Notification,
    Presence,
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::EntityCreate(_) => "entity:create",
            ClientCommand::EntityUpdate(_) => "entity:update",
            ClientCommand::EntityDelete(_) => "entity:delete",
            ClientCommand::TicketAssign(_) => "ticket:assign",
            ClientCommand::NotificationRead(_) => "notification:read",
            ClientCommand::UserActivity(_) => "user:activity",
            ClientCommand::Ping => "ping",
        }
    }

    /// Category this command belongs to. `Ping` carries no category and is
    /// never gated.
    pub fn category(&self) -> Option<EventCategory> {
        match self {
            ClientCommand::EntityCreate(_)
            | ClientCommand::EntityUpdate(_)
            | ClientCommand::EntityDelete(_) => Some(EventCategory::Entity),
            ClientCommand::TicketAssign(_) => Some(EventCategory::Ticket),
            ClientCommand::NotificationRead(_) => Some(EventCategory::Notification),
            ClientCommand::UserActivity(_) => Some(EventCategory::Presence),
            ClientCommand::Ping => None,
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            ClientCommand::EntityCreate(p)
            | ClientCommand::EntityUpdate(p)
            | ClientCommand::EntityDelete(p)
            | ClientCommand::TicketAssign(p)
            | ClientCommand::NotificationRead(p)
            | ClientCommand::UserActivity(p) => Some(p),
            ClientCommand::Ping => None,
        }
    }

    /// The `id` field of the payload, when present. Used for logging only.
    pub fn payload_id(&self) -> Option<&str> {
        self.payload()?.get("id")?.as_str()
    }
}
