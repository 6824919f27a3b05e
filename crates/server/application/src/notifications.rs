//! Notification Dispatcher
//!
//! Computes the recipient set for a ticket event, renders the message and
//! hands it to the broadcast router. Delivery failure is never fatal to the
//! caller; the outcome is recorded on the event and in the ledger either
//! way.

use atrio_server_domain::escalation::EscalationPolicy;
use atrio_server_domain::notifications::{NotificationEvent, render_message};
use atrio_server_domain::ports::DirectoryPort;
use atrio_server_domain::shared_kernel::{
    DeliveryStatus, DomainError, NotificationId, NotificationKind, UserId,
};
use atrio_server_domain::tickets::Ticket;
use atrio_server_infrastructure::ledger::NotificationLedger;
use atrio_server_infrastructure::realtime::metrics::RealtimeMetrics;
use atrio_server_infrastructure::realtime::router::{BroadcastError, BroadcastRouter};
use atrio_shared::realtime::messages::outbound;
use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to resolve recipients: {0}")]
    RecipientResolution(#[from] DomainError),

    #[error("No escalation rule for ticket priority")]
    MissingRule,
}

pub struct NotificationDispatcher {
    router: Arc<BroadcastRouter>,
    directory: Arc<dyn DirectoryPort>,
    ledger: Arc<NotificationLedger>,
    policy: Arc<EscalationPolicy>,
    metrics: Arc<RealtimeMetrics>,
}

impl NotificationDispatcher {
    pub fn new(
        router: Arc<BroadcastRouter>,
        directory: Arc<dyn DirectoryPort>,
        ledger: Arc<NotificationLedger>,
        policy: Arc<EscalationPolicy>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        Self {
            router,
            directory,
            ledger,
            policy,
            metrics,
        }
    }

    /// Dispatch one notification about `ticket`. Returns the event as
    /// appended to the ledger; `extra` fields are available to the template.
    pub async fn dispatch(
        &self,
        ticket: &Ticket,
        kind: NotificationKind,
        extra: HashMap<String, String>,
    ) -> Result<NotificationEvent, DispatchError> {
        let recipients = self.recipients(ticket, kind).await?;
        let message = render_message(kind, ticket, &extra);
        let occurred_at = Utc::now();

        let mut event = NotificationEvent {
            id: NotificationId::new(),
            ticket_id: ticket.id,
            priority: ticket.priority,
            kind,
            occurred_at,
            recipients: recipients.iter().copied().collect(),
            message: message.clone(),
            delivery: DeliveryStatus::Pending,
        };

        let payload = json!({
            "id": event.id.to_string(),
            "ticket_id": ticket.id.to_string(),
            "kind": kind.to_string(),
            "message": message,
        });

        let mut failed = false;
        for user_id in &recipients {
            match self
                .router
                .send_to_user(user_id, outbound::NOTIFICATION_NEW, payload.clone())
            {
                Ok(()) => {}
                Err(BroadcastError::Partial(failed_count, total)) => {
                    // Some of the user's connections got it; log and move on
                    warn!(
                        user_id = %user_id,
                        failed = failed_count,
                        total,
                        "Partial notification delivery"
                    );
                }
                Err(e) => {
                    failed = true;
                    warn!(user_id = %user_id, error = %e, "Notification delivery failed");
                    self.metrics.record_delivery_failure();
                }
            }
        }

        event.delivery = if failed {
            DeliveryStatus::Failed
        } else {
            DeliveryStatus::Sent
        };

        debug!(
            notification_id = %event.id,
            ticket_id = %ticket.id,
            kind = %kind,
            recipients = recipients.len(),
            delivery = %event.delivery,
            "Notification dispatched"
        );

        self.ledger.append(event.clone());
        self.metrics.record_notification_dispatched();

        Ok(event)
    }

    /// Deterministic, de-duplicated recipient set.
    ///
    /// Assignee and creator always receive the event when present; the
    /// ticket's customer only for created/updated/resolved. An escalation
    /// replaces the normal set with the rule's target role, resolved
    /// through the directory.
    async fn recipients(
        &self,
        ticket: &Ticket,
        kind: NotificationKind,
    ) -> Result<BTreeSet<UserId>, DispatchError> {
        if kind == NotificationKind::Escalated {
            let rule = self
                .policy
                .rule_for(ticket.priority)
                .ok_or(DispatchError::MissingRule)?;
            let targets = self
                .directory
                .users_with_role(&ticket.org_id, rule.target)
                .await?;
            return Ok(targets.into_iter().collect());
        }

        let mut recipients = BTreeSet::new();
        if let Some(assignee) = ticket.assignee {
            recipients.insert(assignee);
        }
        recipients.insert(ticket.creator);
        if matches!(
            kind,
            NotificationKind::Created | NotificationKind::Updated | NotificationKind::Resolved
        ) {
            if let Some(customer) = ticket.customer {
                recipients.insert(customer);
            }
        }
        Ok(recipients)
    }
}
