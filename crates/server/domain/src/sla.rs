//! SLA report types
//!
//! Computed on demand by the application-layer reporter; safe to serialize
//! straight to a dashboard.

use crate::shared_kernel::TicketPriority;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-priority aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityBucket {
    pub total: u64,
    pub resolved: u64,
    /// Mean `updated_at - created_at` in hours over resolved/closed tickets.
    /// Zero when the bucket has no resolved tickets.
    pub mean_resolution_hours: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlaReport {
    pub buckets: HashMap<TicketPriority, PriorityBucket>,
    /// Mean resolution hours across all resolved tickets
    pub overall_mean_resolution_hours: f64,
    /// Tickets currently past their priority's escalation threshold
    pub overdue: u64,
    /// Distinct tickets with at least one escalation in the ledger
    pub escalated_tickets: u64,
}

impl SlaReport {
    pub fn bucket(&self, priority: TicketPriority) -> PriorityBucket {
        self.buckets.get(&priority).cloned().unwrap_or_default()
    }
}
