//! Transient domain events flowing through the organization-scoped bus
//!
//! Never persisted by this subsystem; persistence is the collaborator's
//! responsibility.

use crate::shared_kernel::{ConnectionId, OrgId};
use atrio_shared::realtime::messages::outbound;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct DomainEvent {
    pub org_id: OrgId,
    /// Inbound event name as accepted from the origin connection
    pub name: String,
    pub payload: Value,
    /// Connection the event originated from, excluded from its own fan-out
    pub origin: Option<ConnectionId>,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Outbound event name this mutation is rebroadcast as. Events without a
    /// projection (presence heartbeats, read receipts) return None and are
    /// not fanned out.
    pub fn outbound_name(&self) -> Option<&'static str> {
        match self.name.as_str() {
            "entity:create" => Some(outbound::ENTITY_CREATED),
            "entity:update" => Some(outbound::ENTITY_UPDATED),
            "entity:delete" => Some(outbound::ENTITY_DELETED),
            "ticket:assign" => Some(outbound::TICKET_ASSIGNED),
            _ => None,
        }
    }
}
