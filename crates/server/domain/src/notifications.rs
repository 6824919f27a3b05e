//! Notification events and message templates
//!
//! A `NotificationEvent` is created by the dispatcher, delivered through the
//! broadcast router and retained in the in-memory ledger for escalation
//! dedup and SLA reporting. It is not a system of record.

use crate::shared_kernel::{
    DeliveryStatus, NotificationId, NotificationKind, TicketId, TicketPriority, UserId,
};
use crate::tickets::Ticket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: NotificationId,
    pub ticket_id: TicketId,
    /// Priority of the ticket at dispatch time; part of the dedup key
    pub priority: TicketPriority,
    pub kind: NotificationKind,
    pub occurred_at: DateTime<Utc>,
    pub recipients: Vec<UserId>,
    pub message: String,
    pub delivery: DeliveryStatus,
}

/// Message template for a notification kind. Placeholders use `{name}`
/// syntax; unresolved placeholders render as the empty string.
pub fn template_for(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Created => "Ticket {id} opened: {subject} ({priority})",
        NotificationKind::Updated => "Ticket {id} updated: {subject} is now {status}",
        NotificationKind::Resolved => "Ticket {id} resolved: {subject}",
        NotificationKind::Escalated => {
            "Ticket {id} escalated to {escalated_to}: {subject} ({priority}, {reason})"
        }
        NotificationKind::Overdue => "Ticket {id} overdue: {subject} ({priority})",
    }
}

/// Render a template against a ticket plus extra fields.
pub fn render_message(
    kind: NotificationKind,
    ticket: &Ticket,
    extra: &HashMap<String, String>,
) -> String {
    let mut fields: HashMap<&str, String> = HashMap::new();
    fields.insert("id", ticket.id.to_string());
    fields.insert("subject", ticket.subject.clone());
    fields.insert("priority", ticket.priority.to_string());
    fields.insert("status", ticket.status.to_string());
    fields.insert("created_at", ticket.created_at.to_rfc3339());
    fields.insert("updated_at", ticket.updated_at.to_rfc3339());

    render_template(template_for(kind), |key| {
        fields
            .get(key)
            .cloned()
            .or_else(|| extra.get(key).cloned())
    })
}

/// Substitute `{placeholder}` occurrences using `lookup`. Unknown
/// placeholders become empty strings; this function never fails.
pub fn render_template(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        match rest[open + 1..].find('}') {
            Some(close) => {
                let key = &rest[open + 1..open + 1 + close];
                if let Some(value) = lookup(key) {
                    out.push_str(&value);
                }
                rest = &rest[open + close + 2..];
            }
            None => {
                // Unbalanced brace, emit verbatim
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_kernel::{OrgId, TicketStatus};

    fn ticket() -> Ticket {
        Ticket {
            id: TicketId::new(),
            org_id: OrgId::new(),
            subject: "VPN down".to_string(),
            priority: TicketPriority::Urgent,
            status: TicketStatus::Open,
            creator: UserId::new(),
            assignee: Some(UserId::new()),
            customer: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn escalated_message_includes_extra_fields() {
        let t = ticket();
        let mut extra = HashMap::new();
        extra.insert("escalated_to".to_string(), "admin".to_string());
        extra.insert("reason".to_string(), "exceeded 1 hour threshold".to_string());

        let msg = render_message(NotificationKind::Escalated, &t, &extra);
        assert!(msg.contains("escalated to admin"));
        assert!(msg.contains("exceeded 1 hour threshold"));
        assert!(msg.contains(&t.id.to_string()));
    }

    #[test]
    fn unresolved_placeholders_render_empty() {
        let msg = render_template("a {missing} b", |_| None);
        assert_eq!(msg, "a  b");
    }

    #[test]
    fn unbalanced_brace_is_verbatim() {
        let msg = render_template("tail {open", |_| None);
        assert_eq!(msg, "tail {open");
    }
}
