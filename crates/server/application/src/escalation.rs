//! Escalation Scheduler - recurring sweep over open support tickets
//!
//! Runs as a background Tokio task on a fixed tick interval. Each tick
//! fetches the non-terminal tickets, compares their age against the
//! priority-keyed policy and escalates the overdue ones that have not
//! already escalated within the current window. Per-ticket failures are
//! isolated; a bad ticket record never aborts the rest of the sweep.

use crate::notifications::NotificationDispatcher;
use atrio_server_domain::escalation::EscalationPolicy;
use atrio_server_domain::ports::TicketStorePort;
use atrio_server_domain::shared_kernel::{NotificationKind, TicketId};
use atrio_server_domain::tickets::Ticket;
use atrio_server_infrastructure::ledger::NotificationLedger;
use atrio_server_infrastructure::realtime::metrics::RealtimeMetrics;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct EscalationSchedulerConfig {
    /// How often the sweep runs (default: 5 minutes)
    pub tick_interval: Duration,
}

impl Default for EscalationSchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(300),
        }
    }
}

/// Scheduler statistics for logging and dashboards.
#[derive(Debug, Default, Clone)]
pub struct SchedulerStats {
    pub total_ticks: u64,
    pub total_escalations: u64,
    pub total_errors: u64,
    /// Ticks skipped because the previous one was still running
    pub skipped_ticks: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_escalation_at: Option<DateTime<Utc>>,
}

pub struct EscalationScheduler {
    ticket_store: Arc<dyn TicketStorePort>,
    dispatcher: Arc<NotificationDispatcher>,
    policy: Arc<EscalationPolicy>,
    ledger: Arc<NotificationLedger>,
    metrics: Arc<RealtimeMetrics>,
    config: EscalationSchedulerConfig,
    stats: Arc<std::sync::Mutex<SchedulerStats>>,
    /// Single-flight guard: two ticks never run concurrently
    tick_in_flight: AtomicBool,
}

impl EscalationScheduler {
    pub fn new(
        ticket_store: Arc<dyn TicketStorePort>,
        dispatcher: Arc<NotificationDispatcher>,
        policy: Arc<EscalationPolicy>,
        ledger: Arc<NotificationLedger>,
        metrics: Arc<RealtimeMetrics>,
        config: Option<EscalationSchedulerConfig>,
    ) -> Self {
        Self {
            ticket_store,
            dispatcher,
            policy,
            ledger,
            metrics,
            config: config.unwrap_or_default(),
            stats: Arc::new(std::sync::Mutex::new(SchedulerStats::default())),
            tick_in_flight: AtomicBool::new(false),
        }
    }

    /// Spawn the tick loop. Runs until a shutdown signal arrives.
    pub fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let tick_interval = self.config.tick_interval;
        info!(?tick_interval, "Starting EscalationScheduler");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.run_tick().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("EscalationScheduler shutting down");
                        break;
                    }
                }
            }
        });
    }

    /// Run one sweep. Returns the tickets escalated this tick so callers
    /// can log or assert on them. Skips (and counts the skip) when a
    /// previous tick is still in flight.
    pub async fn run_tick(&self) -> Vec<TicketId> {
        if self
            .tick_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Escalation tick still running, skipping this one");
            self.stats.lock().unwrap().skipped_ticks += 1;
            return Vec::new();
        }

        let started = Instant::now();
        let escalated = self.sweep().await;
        let elapsed = started.elapsed();

        {
            let mut stats = self.stats.lock().unwrap();
            stats.total_ticks += 1;
            stats.total_escalations += escalated.len() as u64;
            stats.last_tick_at = Some(Utc::now());
            if !escalated.is_empty() {
                stats.last_escalation_at = Some(Utc::now());
            }
        }
        self.metrics.record_scheduler_tick(elapsed.as_secs_f64());

        if elapsed > self.config.tick_interval * 2 {
            warn!(
                ?elapsed,
                tick_interval = ?self.config.tick_interval,
                "Escalation tick exceeded twice the tick interval"
            );
        }

        self.tick_in_flight.store(false, Ordering::SeqCst);
        escalated
    }

    async fn sweep(&self) -> Vec<TicketId> {
        let now = Utc::now();

        // Retention housekeeping rides along on the sweep
        self.ledger.prune(now);

        let tickets = match self.ticket_store.fetch_open_tickets().await {
            Ok(tickets) => tickets,
            Err(e) => {
                // Retried on the next tick; no immediate retry loop against
                // a degraded dependency
                warn!(error = %e, "Ticket fetch failed, skipping sweep");
                self.stats.lock().unwrap().total_errors += 1;
                return Vec::new();
            }
        };

        let mut escalated = Vec::new();
        for ticket in &tickets {
            if ticket.is_terminal() {
                continue;
            }
            if let Err(e) = self.consider(ticket, now, &mut escalated).await {
                self.stats.lock().unwrap().total_errors += 1;
                error!(ticket_id = %ticket.id, error = %e, "Escalation failed for ticket");
            }
        }

        escalated
    }

    async fn consider(
        &self,
        ticket: &Ticket,
        now: DateTime<Utc>,
        escalated: &mut Vec<TicketId>,
    ) -> Result<(), crate::notifications::DispatchError> {
        let Some(rule) = self.policy.rule_for(ticket.priority) else {
            return Ok(());
        };

        if ticket.age_hours(now) <= f64::from(rule.threshold_hours) {
            return Ok(());
        }

        if self
            .ledger
            .escalated_within(ticket.id, ticket.priority, rule.threshold_hours, now)
        {
            return Ok(());
        }

        let mut extra = HashMap::new();
        extra.insert("escalated_to".to_string(), rule.target.to_string());
        extra.insert(
            "reason".to_string(),
            format!("exceeded {} hour threshold", rule.threshold_hours),
        );

        self.dispatcher
            .dispatch(ticket, NotificationKind::Escalated, extra)
            .await?;

        self.metrics.record_escalation();
        info!(
            ticket_id = %ticket.id,
            priority = %ticket.priority,
            target = %rule.target,
            "Ticket escalated"
        );
        escalated.push(ticket.id);
        Ok(())
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.lock().unwrap().clone()
    }
}
