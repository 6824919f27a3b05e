//! Broadcast Router - Tenant-Partitioned Event Fan-Out
//!
//! Delivery is best-effort and non-blocking per recipient: a slow or dead
//! connection is logged and skipped, never allowed to stall the rest of the
//! partition. Ordering holds per origin connection only; no global order is
//! promised across origins.

use crate::realtime::metrics::RealtimeMetrics;
use crate::realtime::registry::ConnectionRegistry;
use crate::realtime::session::SessionError;
use atrio_server_domain::shared_kernel::{ConnectionId, OrgId, UserId};
use atrio_shared::realtime::messages::ServerMessage;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("All sessions closed")]
    AllSessionsClosed,

    #[error("Partial broadcast: {0} failed of {1} total")]
    Partial(usize, usize),
}

#[derive(Debug)]
pub struct BroadcastRouter {
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<RealtimeMetrics>,
}

impl BroadcastRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, metrics: Arc<RealtimeMetrics>) -> Self {
        Self { registry, metrics }
    }

    /// Deliver an event to every live connection of a tenant, except the
    /// originator when given. Takes a snapshot of the partition before
    /// iterating, so concurrent removal never causes a delivery error.
    pub fn broadcast_to_tenant(
        &self,
        org_id: &OrgId,
        event_name: &str,
        payload: Value,
        exclude: Option<ConnectionId>,
    ) -> Result<(), BroadcastError> {
        let message = ServerMessage::event(event_name, payload, Utc::now().timestamp_millis());
        let raw = serde_json::to_string(&message)
            .map_err(|e| BroadcastError::Serialization(e.to_string()))?;

        let targets: Vec<ConnectionId> = self
            .registry
            .live_connections(org_id)
            .into_iter()
            .filter(|id| Some(*id) != exclude)
            .collect();

        self.deliver(&targets, &raw)
    }

    /// Deliver an event to every connection owned by one user. A user may
    /// hold several simultaneous connections; each gets its own copy.
    pub fn send_to_user(
        &self,
        user_id: &UserId,
        event_name: &str,
        payload: Value,
    ) -> Result<(), BroadcastError> {
        let message = ServerMessage::event(event_name, payload, Utc::now().timestamp_millis());
        let raw = serde_json::to_string(&message)
            .map_err(|e| BroadcastError::Serialization(e.to_string()))?;

        let targets = self.registry.connections_of_user(user_id);
        self.deliver(&targets, &raw)
    }

    fn deliver(&self, targets: &[ConnectionId], raw: &str) -> Result<(), BroadcastError> {
        let start = Instant::now();
        let mut success_count = 0usize;
        let mut fail_count = 0usize;

        for connection_id in targets {
            let Some(session) = self.registry.session(*connection_id) else {
                // Removed between snapshot and delivery; not an error
                continue;
            };
            match session.send_raw(raw.to_string()) {
                Ok(()) => success_count += 1,
                Err(SessionError::Closed) => {
                    fail_count += 1;
                    // Dead transport: evict so the partition stays honest
                    self.registry.remove(*connection_id);
                    debug!(connection_id = %connection_id, "Evicted closed session during delivery");
                }
                Err(SessionError::Backpressure) => {
                    fail_count += 1;
                    warn!(connection_id = %connection_id, "Backpressure during delivery");
                }
                Err(SessionError::Serialization(e)) => {
                    return Err(BroadcastError::Serialization(e));
                }
            }
        }

        self.metrics
            .record_broadcast(start.elapsed().as_secs_f64() * 1000.0);

        if fail_count == 0 {
            Ok(())
        } else if success_count == 0 {
            Err(BroadcastError::AllSessionsClosed)
        } else {
            Err(BroadcastError::Partial(
                fail_count,
                success_count + fail_count,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::rate_limit::IngressRateLimiter;
    use crate::realtime::session::Session;
    use atrio_server_domain::identity::{Identity, Role};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        router: BroadcastRouter,
        metrics: Arc<RealtimeMetrics>,
    }

    fn fixture() -> Fixture {
        let metrics = Arc::new(RealtimeMetrics::new());
        let registry = Arc::new(ConnectionRegistry::new(
            Arc::new(IngressRateLimiter::new(60)),
            metrics.clone(),
        ));
        let router = BroadcastRouter::new(registry.clone(), metrics.clone());
        Fixture {
            registry,
            router,
            metrics,
        }
    }

    fn admit(
        fx: &Fixture,
        org: OrgId,
        user: UserId,
    ) -> (ConnectionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        let session = Arc::new(Session::new(ConnectionId::new(), tx, fx.metrics.clone()));
        let id = session.id();
        fx.registry.admit(
            session,
            &Identity {
                user_id: user,
                org_id: org,
                role: Role::Agent,
            },
        );
        (id, rx)
    }

    async fn recv(rx: &mut mpsc::Receiver<String>) -> Option<String> {
        tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn broadcast_excludes_originator_and_other_tenants() {
        let fx = fixture();
        let org_a = OrgId::new();
        let org_b = OrgId::new();

        let (c1, mut rx1) = admit(&fx, org_a, UserId::new());
        let (_c2, mut rx2) = admit(&fx, org_a, UserId::new());
        let (_c3, mut rx3) = admit(&fx, org_b, UserId::new());

        fx.router
            .broadcast_to_tenant(&org_a, "entity:updated", json!({"id": "x"}), Some(c1))
            .unwrap();

        assert!(recv(&mut rx1).await.is_none(), "originator must not receive");
        let received = recv(&mut rx2).await.expect("peer in tenant receives");
        assert!(received.contains("entity:updated"));
        assert!(recv(&mut rx3).await.is_none(), "other tenant must not receive");
    }

    #[tokio::test]
    async fn send_to_user_reaches_all_their_connections() {
        let fx = fixture();
        let org = OrgId::new();
        let user = UserId::new();

        let (_c1, mut rx1) = admit(&fx, org, user);
        let (_c2, mut rx2) = admit(&fx, org, user);
        let (_c3, mut rx3) = admit(&fx, org, UserId::new());

        fx.router
            .send_to_user(&user, "notification:new", json!({"id": "n1"}))
            .unwrap();

        assert!(recv(&mut rx1).await.is_some());
        assert!(recv(&mut rx2).await.is_some());
        assert!(recv(&mut rx3).await.is_none());
    }

    #[tokio::test]
    async fn dead_recipient_does_not_abort_the_broadcast() {
        let fx = fixture();
        let org = OrgId::new();

        let (_alive, mut rx_alive) = admit(&fx, org, UserId::new());
        let (dead, rx_dead) = admit(&fx, org, UserId::new());
        drop(rx_dead);

        let err = fx
            .router
            .broadcast_to_tenant(&org, "entity:created", json!({"id": "y"}), None)
            .unwrap_err();
        assert!(matches!(err, BroadcastError::Partial(1, 2)));

        assert!(recv(&mut rx_alive).await.is_some());
        // The dead session was evicted
        assert!(fx.registry.session(dead).is_none());
    }

    #[tokio::test]
    async fn broadcast_to_empty_partition_is_ok() {
        let fx = fixture();
        let org = OrgId::new();
        assert!(fx
            .router
            .broadcast_to_tenant(&org, "entity:created", json!({}), None)
            .is_ok());
    }
}
