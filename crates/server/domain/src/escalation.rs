//! Escalation policy: per-priority time thresholds and targets
//!
//! Loaded once at startup and immutable at runtime.

use crate::identity::Role;
use crate::shared_kernel::TicketPriority;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the scheduler does when a rule fires.
///
/// `Assign` is kept as data for the medium-priority rule, but the scheduler
/// currently treats it as notify-only: reassignment target selection among
/// multiple same-role candidates is an open product decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationAction {
    Notify,
    Assign,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRule {
    /// Ticket age, in hours, beyond which the rule fires. Also the width of
    /// the re-escalation suppression window.
    pub threshold_hours: u32,
    /// Role notified when the rule fires
    pub target: Role,
    pub action: EscalationAction,
}

impl EscalationRule {
    pub fn new(threshold_hours: u32, target: Role, action: EscalationAction) -> Self {
        Self {
            threshold_hours,
            target,
            action,
        }
    }
}

/// Priority-keyed rule table. Priorities without a rule are skipped by the
/// scheduler entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPolicy {
    rules: HashMap<TicketPriority, EscalationRule>,
}

impl EscalationPolicy {
    pub fn new(rules: HashMap<TicketPriority, EscalationRule>) -> Self {
        Self { rules }
    }

    pub fn rule_for(&self, priority: TicketPriority) -> Option<&EscalationRule> {
        self.rules.get(&priority)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for EscalationPolicy {
    /// Stock policy: urgent tickets page an admin after one hour, high
    /// priority goes to a manager after four, medium after eight. Low
    /// priority tickets never escalate.
    fn default() -> Self {
        let mut rules = HashMap::new();
        rules.insert(
            TicketPriority::Urgent,
            EscalationRule::new(1, Role::Admin, EscalationAction::Notify),
        );
        rules.insert(
            TicketPriority::High,
            EscalationRule::new(4, Role::Manager, EscalationAction::Notify),
        );
        rules.insert(
            TicketPriority::Medium,
            EscalationRule::new(8, Role::Manager, EscalationAction::Assign),
        );
        Self { rules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_has_no_low_rule() {
        let policy = EscalationPolicy::default();
        assert!(policy.rule_for(TicketPriority::Low).is_none());
        assert_eq!(
            policy.rule_for(TicketPriority::Urgent).unwrap().threshold_hours,
            1
        );
    }

    #[test]
    fn medium_rule_keeps_assign_action_as_data() {
        let policy = EscalationPolicy::default();
        let rule = policy.rule_for(TicketPriority::Medium).unwrap();
        assert_eq!(rule.action, EscalationAction::Assign);
        assert_eq!(rule.target, Role::Manager);
    }
}
