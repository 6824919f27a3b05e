//! Realtime Metrics
//!
//! Prometheus metrics for connection lifecycle, message throughput, ingress
//! rate limiting and the escalation sweep.

use prometheus::{Counter, Gauge, Histogram, HistogramOpts, Registry};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RealtimeMetrics {
    inner: Arc<RealtimeMetricsInner>,
}

#[derive(Debug)]
struct RealtimeMetricsInner {
    connections_active: Gauge,
    connections_total: Counter,
    messages_sent_total: Counter,
    messages_dropped_total: Counter,
    rate_limit_denials_total: Counter,
    broadcasts_total: Counter,
    broadcast_duration_ms: Histogram,
    notifications_dispatched_total: Counter,
    delivery_failures_total: Counter,
    escalations_total: Counter,
    scheduler_ticks_total: Counter,
    scheduler_tick_duration_seconds: Histogram,
    session_errors: Counter,
}

impl Default for RealtimeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RealtimeMetricsInner {
                connections_active: Gauge::new("realtime_connections_active", "Active connections")
                    .unwrap(),
                connections_total: Counter::new(
                    "realtime_connections_total",
                    "Total connections admitted",
                )
                .unwrap(),
                messages_sent_total: Counter::new("realtime_messages_sent_total", "Messages sent")
                    .unwrap(),
                messages_dropped_total: Counter::new(
                    "realtime_messages_dropped_total",
                    "Messages dropped",
                )
                .unwrap(),
                rate_limit_denials_total: Counter::new(
                    "realtime_rate_limit_denials_total",
                    "Inbound events denied by the rate limiter",
                )
                .unwrap(),
                broadcasts_total: Counter::new("realtime_broadcasts_total", "Broadcast operations")
                    .unwrap(),
                broadcast_duration_ms: Histogram::with_opts(HistogramOpts::new(
                    "realtime_broadcast_duration_ms",
                    "Broadcast duration in milliseconds",
                ))
                .unwrap(),
                notifications_dispatched_total: Counter::new(
                    "realtime_notifications_dispatched_total",
                    "Notification events dispatched",
                )
                .unwrap(),
                delivery_failures_total: Counter::new(
                    "realtime_delivery_failures_total",
                    "Notification deliveries marked failed",
                )
                .unwrap(),
                escalations_total: Counter::new(
                    "realtime_escalations_total",
                    "Tickets escalated by the scheduler",
                )
                .unwrap(),
                scheduler_ticks_total: Counter::new(
                    "realtime_scheduler_ticks_total",
                    "Escalation sweep ticks",
                )
                .unwrap(),
                scheduler_tick_duration_seconds: Histogram::with_opts(HistogramOpts::new(
                    "realtime_scheduler_tick_duration_seconds",
                    "Escalation sweep duration in seconds",
                ))
                .unwrap(),
                session_errors: Counter::new("realtime_session_errors", "Session errors").unwrap(),
            }),
        }
    }

    pub fn register(&self, registry: &mut Registry) {
        registry
            .register(Box::new(self.inner.connections_active.clone()))
            .unwrap();
        registry
            .register(Box::new(self.inner.connections_total.clone()))
            .unwrap();
        registry
            .register(Box::new(self.inner.messages_sent_total.clone()))
            .unwrap();
        registry
            .register(Box::new(self.inner.messages_dropped_total.clone()))
            .unwrap();
        registry
            .register(Box::new(self.inner.rate_limit_denials_total.clone()))
            .unwrap();
        registry
            .register(Box::new(self.inner.broadcasts_total.clone()))
            .unwrap();
        registry
            .register(Box::new(self.inner.broadcast_duration_ms.clone()))
            .unwrap();
        registry
            .register(Box::new(self.inner.notifications_dispatched_total.clone()))
            .unwrap();
        registry
            .register(Box::new(self.inner.delivery_failures_total.clone()))
            .unwrap();
        registry
            .register(Box::new(self.inner.escalations_total.clone()))
            .unwrap();
        registry
            .register(Box::new(self.inner.scheduler_ticks_total.clone()))
            .unwrap();
        registry
            .register(Box::new(self.inner.scheduler_tick_duration_seconds.clone()))
            .unwrap();
        registry
            .register(Box::new(self.inner.session_errors.clone()))
            .unwrap();
    }

    pub fn connection_active_inc(&self) {
        self.inner.connections_active.inc();
        self.inner.connections_total.inc();
    }

    pub fn connection_active_dec(&self) {
        self.inner.connections_active.dec();
    }

    pub fn record_message_sent(&self) {
        self.inner.messages_sent_total.inc();
    }

    pub fn record_message_dropped(&self, count: u64) {
        self.inner.messages_dropped_total.inc_by(count as f64);
    }

    pub fn record_rate_limit_denial(&self) {
        self.inner.rate_limit_denials_total.inc();
    }

    pub fn record_broadcast(&self, duration_ms: f64) {
        self.inner.broadcasts_total.inc();
        self.inner.broadcast_duration_ms.observe(duration_ms);
    }

    pub fn record_notification_dispatched(&self) {
        self.inner.notifications_dispatched_total.inc();
    }

    pub fn record_delivery_failure(&self) {
        self.inner.delivery_failures_total.inc();
    }

    pub fn record_escalation(&self) {
        self.inner.escalations_total.inc();
    }

    pub fn record_scheduler_tick(&self, duration_seconds: f64) {
        self.inner.scheduler_ticks_total.inc();
        self.inner
            .scheduler_tick_duration_seconds
            .observe(duration_seconds);
    }

    pub fn record_session_error(&self) {
        self.inner.session_errors.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_without_collision() {
        let metrics = RealtimeMetrics::new();
        let mut registry = Registry::new();
        metrics.register(&mut registry);
        assert!(!registry.gather().is_empty());
    }
}
