//! SLA Reporter - on-demand aggregate statistics over a ticket set
//!
//! Pure read over the tickets it is handed plus the notification ledger.
//! No mutation, no I/O; cheap enough for dashboard refresh at arbitrary
//! frequency.

use atrio_server_domain::escalation::EscalationPolicy;
use atrio_server_domain::sla::{PriorityBucket, SlaReport};
use atrio_server_domain::tickets::Ticket;
use atrio_server_infrastructure::ledger::NotificationLedger;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

pub struct SlaReporter {
    policy: Arc<EscalationPolicy>,
    ledger: Arc<NotificationLedger>,
}

impl SlaReporter {
    pub fn new(policy: Arc<EscalationPolicy>, ledger: Arc<NotificationLedger>) -> Self {
        Self { policy, ledger }
    }

    pub fn report(&self, tickets: &[Ticket]) -> SlaReport {
        let now = Utc::now();

        let mut buckets: HashMap<_, PriorityBucket> = HashMap::new();
        let mut resolution_sums: HashMap<_, f64> = HashMap::new();
        let mut overdue = 0u64;
        let mut escalated_tickets = 0u64;
        let mut resolved_total = 0u64;
        let mut resolution_sum_all = 0.0f64;

        for ticket in tickets {
            let bucket = buckets.entry(ticket.priority).or_default();
            bucket.total += 1;

            if ticket.is_terminal() {
                bucket.resolved += 1;
                resolved_total += 1;
                let hours = ticket.resolution_hours();
                *resolution_sums.entry(ticket.priority).or_default() += hours;
                resolution_sum_all += hours;
            } else if let Some(rule) = self.policy.rule_for(ticket.priority) {
                if ticket.age_hours(now) > f64::from(rule.threshold_hours) {
                    overdue += 1;
                }
            }

            if self.ledger.has_escalation(ticket.id) {
                escalated_tickets += 1;
            }
        }

        for (priority, bucket) in buckets.iter_mut() {
            if bucket.resolved > 0 {
                bucket.mean_resolution_hours =
                    resolution_sums.get(priority).copied().unwrap_or(0.0)
                        / bucket.resolved as f64;
            }
        }

        let overall_mean_resolution_hours = if resolved_total > 0 {
            resolution_sum_all / resolved_total as f64
        } else {
            0.0
        };

        SlaReport {
            buckets,
            overall_mean_resolution_hours,
            overdue,
            escalated_tickets,
        }
    }
}
