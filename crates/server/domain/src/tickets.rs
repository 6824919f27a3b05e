//! Support ticket read model
//!
//! Tickets are owned by the persistence collaborator. This core only reads
//! them and emits notification events about them; it never mutates one.

use crate::shared_kernel::{OrgId, TicketId, TicketPriority, TicketStatus, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub org_id: OrgId,
    pub subject: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub creator: UserId,
    pub assignee: Option<UserId>,
    /// The customer the ticket is about, when the requester is a portal user
    pub customer: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Hours elapsed since the ticket was opened.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds() as f64 / 3600.0
    }

    /// Hours from open to last update. Only meaningful as a resolution time
    /// for terminal tickets.
    pub fn resolution_hours(&self) -> f64 {
        (self.updated_at - self.created_at).num_seconds() as f64 / 3600.0
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
