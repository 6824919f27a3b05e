use crate::ids::{ConnectionId, OrgId, TicketId, UserId};

#[derive(thiserror::Error, Debug)]
pub enum SharedError {
    #[error("User not found: {user_id}")]
    UserNotFound { user_id: UserId },

    #[error("Organization not found: {org_id}")]
    OrgNotFound { org_id: OrgId },

    #[error("Ticket not found: {ticket_id}")]
    TicketNotFound { ticket_id: TicketId },

    #[error("Connection not found: {connection_id}")]
    ConnectionNotFound { connection_id: ConnectionId },

    #[error("Invalid state transition")]
    InvalidStateTransition,
}
