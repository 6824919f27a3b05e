//! Bounded in-memory notification ledger
//!
//! Append-mostly store of dispatched notification events, used for the
//! escalation dedup check and SLA reporting. Not a system of record:
//! entries older than the retention window are pruned, and the whole thing
//! is lost on restart.
//!
//! The dedup check is backed by a `(ticket, priority)` → last-escalation
//! index so the scheduler pays O(1) per ticket rather than scanning the
//! history.

use atrio_server_domain::notifications::NotificationEvent;
use atrio_server_domain::shared_kernel::{NotificationKind, TicketId, TicketPriority};
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, DashSet};
use std::collections::VecDeque;
use std::sync::RwLock;
use tracing::debug;

#[derive(Debug)]
pub struct NotificationLedger {
    entries: RwLock<VecDeque<NotificationEvent>>,
    /// Last escalation instant per (ticket, priority)
    last_escalation: DashMap<(TicketId, TicketPriority), DateTime<Utc>>,
    /// Tickets that have escalated at least once within retention
    escalated_tickets: DashSet<TicketId>,
    retention: Duration,
}

impl NotificationLedger {
    pub fn new(retention_days: u32) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            last_escalation: DashMap::new(),
            escalated_tickets: DashSet::new(),
            retention: Duration::days(i64::from(retention_days)),
        }
    }

    /// Append a dispatched event and maintain the escalation index.
    pub fn append(&self, event: NotificationEvent) {
        if event.kind == NotificationKind::Escalated {
            self.last_escalation
                .entry((event.ticket_id, event.priority))
                .and_modify(|at| {
                    if event.occurred_at > *at {
                        *at = event.occurred_at;
                    }
                })
                .or_insert(event.occurred_at);
            self.escalated_tickets.insert(event.ticket_id);
        }

        let mut entries = self.entries.write().unwrap();
        entries.push_back(event);
    }

    /// When did this (ticket, priority) pair last escalate, if ever?
    pub fn last_escalation(
        &self,
        ticket_id: TicketId,
        priority: TicketPriority,
    ) -> Option<DateTime<Utc>> {
        self.last_escalation
            .get(&(ticket_id, priority))
            .map(|at| *at)
    }

    /// The scheduler's dedup test: was this pair escalated within the last
    /// `window_hours` hours?
    pub fn escalated_within(
        &self,
        ticket_id: TicketId,
        priority: TicketPriority,
        window_hours: u32,
        now: DateTime<Utc>,
    ) -> bool {
        match self.last_escalation(ticket_id, priority) {
            Some(at) => now - at < Duration::hours(i64::from(window_hours)),
            None => false,
        }
    }

    /// Distinct tickets with at least one escalation entry.
    pub fn escalated_ticket_count(&self) -> u64 {
        self.escalated_tickets.len() as u64
    }

    pub fn has_escalation(&self, ticket_id: TicketId) -> bool {
        self.escalated_tickets.contains(&ticket_id)
    }

    /// Drop entries older than the retention window, together with their
    /// index state. Called periodically from the scheduler tick.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;

        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        while entries
            .front()
            .is_some_and(|event| event.occurred_at < cutoff)
        {
            entries.pop_front();
        }
        let pruned = before - entries.len();
        drop(entries);

        if pruned > 0 {
            self.last_escalation.retain(|_, at| *at >= cutoff);
            let still_escalated: std::collections::HashSet<TicketId> = self
                .last_escalation
                .iter()
                .map(|entry| entry.key().0)
                .collect();
            self.escalated_tickets
                .retain(|ticket| still_escalated.contains(ticket));
            debug!(pruned, "Pruned notification ledger");
        }

        pruned
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrio_server_domain::shared_kernel::{DeliveryStatus, NotificationId, UserId};

    fn escalation(ticket_id: TicketId, at: DateTime<Utc>) -> NotificationEvent {
        NotificationEvent {
            id: NotificationId::new(),
            ticket_id,
            priority: TicketPriority::Urgent,
            kind: NotificationKind::Escalated,
            occurred_at: at,
            recipients: vec![UserId::new()],
            message: "escalated".to_string(),
            delivery: DeliveryStatus::Sent,
        }
    }

    #[test]
    fn dedup_window_suppresses_within_threshold() {
        let ledger = NotificationLedger::new(30);
        let ticket = TicketId::new();
        let now = Utc::now();

        ledger.append(escalation(ticket, now - Duration::minutes(30)));

        assert!(ledger.escalated_within(ticket, TicketPriority::Urgent, 1, now));
        assert!(!ledger.escalated_within(ticket, TicketPriority::Urgent, 1, now + Duration::hours(1)));
        // A different priority key is a different rule window
        assert!(!ledger.escalated_within(ticket, TicketPriority::High, 4, now));
    }

    #[test]
    fn prune_drops_old_entries_and_index_state() {
        let ledger = NotificationLedger::new(30);
        let old_ticket = TicketId::new();
        let fresh_ticket = TicketId::new();
        let now = Utc::now();

        ledger.append(escalation(old_ticket, now - Duration::days(45)));
        ledger.append(escalation(fresh_ticket, now - Duration::days(1)));
        assert_eq!(ledger.escalated_ticket_count(), 2);

        let pruned = ledger.prune(now);
        assert_eq!(pruned, 1);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.escalated_ticket_count(), 1);
        assert!(!ledger.has_escalation(old_ticket));
        assert!(ledger.has_escalation(fresh_ticket));
        assert!(ledger.last_escalation(old_ticket, TicketPriority::Urgent).is_none());
    }

    #[test]
    fn append_keeps_latest_escalation_instant() {
        let ledger = NotificationLedger::new(30);
        let ticket = TicketId::new();
        let now = Utc::now();

        ledger.append(escalation(ticket, now - Duration::hours(5)));
        ledger.append(escalation(ticket, now - Duration::hours(2)));

        let at = ledger
            .last_escalation(ticket, TicketPriority::Urgent)
            .unwrap();
        assert_eq!(at, now - Duration::hours(2));
    }
}
