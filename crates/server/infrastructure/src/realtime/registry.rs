//! Connection Registry for WebSocket Sessions
//!
//! The only shared mutable structure in the realtime core. Maps each tenant
//! to its live connections and each connection to its identity. Registry
//! state is intentionally lost on process restart; reconnecting clients
//! re-admit themselves.

use crate::realtime::metrics::RealtimeMetrics;
use crate::realtime::rate_limit::IngressRateLimiter;
use crate::realtime::session::Session;
use atrio_server_domain::identity::{Identity, Role};
use atrio_server_domain::shared_kernel::{ConnectionId, OrgId, UserId};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tracing::debug;

/// Identity attributes of an admitted connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub user_id: UserId,
    pub org_id: OrgId,
    pub role: Role,
    pub admitted_at: DateTime<Utc>,
}

#[derive(Debug)]
struct RegisteredConnection {
    session: Arc<Session>,
    info: ConnectionInfo,
}

#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, RegisteredConnection>,
    /// Tenant partition index. Invariant: a connection id appears in at most
    /// one partition at a time.
    partitions: DashMap<OrgId, DashSet<ConnectionId>>,
    /// A user may hold several simultaneous connections
    by_user: DashMap<UserId, DashSet<ConnectionId>>,
    rate_limiter: Arc<IngressRateLimiter>,
    metrics: Arc<RealtimeMetrics>,
}

impl ConnectionRegistry {
    pub fn new(rate_limiter: Arc<IngressRateLimiter>, metrics: Arc<RealtimeMetrics>) -> Self {
        Self {
            connections: DashMap::new(),
            partitions: DashMap::new(),
            by_user: DashMap::new(),
            rate_limiter,
            metrics,
        }
    }

    /// Register an authenticated connection under its tenant partition.
    pub fn admit(&self, session: Arc<Session>, identity: &Identity) {
        let connection_id = session.id();
        let info = ConnectionInfo {
            user_id: identity.user_id,
            org_id: identity.org_id,
            role: identity.role,
            admitted_at: Utc::now(),
        };

        self.partitions
            .entry(identity.org_id)
            .or_default()
            .insert(connection_id);
        self.by_user
            .entry(identity.user_id)
            .or_default()
            .insert(connection_id);
        self.connections
            .insert(connection_id, RegisteredConnection { session, info });

        self.metrics.connection_active_inc();
        debug!(connection_id = %connection_id, org_id = %identity.org_id, "Connection admitted");
    }

    /// Remove a connection. Idempotent; a second call is a no-op. Empty
    /// partitions are dropped so the map does not grow unboundedly, and the
    /// rate limiter forgets the connection.
    pub fn remove(&self, connection_id: ConnectionId) -> Option<Arc<Session>> {
        let (_, registered) = self.connections.remove(&connection_id)?;

        if let Some(partition) = self.partitions.get(&registered.info.org_id) {
            partition.remove(&connection_id);
        }
        self.partitions
            .remove_if(&registered.info.org_id, |_, set| set.is_empty());

        if let Some(conns) = self.by_user.get(&registered.info.user_id) {
            conns.remove(&connection_id);
        }
        self.by_user
            .remove_if(&registered.info.user_id, |_, set| set.is_empty());

        self.rate_limiter.remove(connection_id);
        self.metrics.connection_active_dec();
        debug!(connection_id = %connection_id, "Connection removed");

        Some(registered.session)
    }

    /// Snapshot of the live connections in a tenant partition. Broadcasts
    /// iterate this snapshot, so a connection removed mid-broadcast simply
    /// may or may not receive that one event.
    pub fn live_connections(&self, org_id: &OrgId) -> Vec<ConnectionId> {
        self.partitions
            .get(org_id)
            .map(|set| set.iter().map(|id| *id).collect())
            .unwrap_or_default()
    }

    pub fn count_in_tenant(&self, org_id: &OrgId) -> usize {
        self.partitions.get(org_id).map(|set| set.len()).unwrap_or(0)
    }

    /// Snapshot of all connections owned by a user, across tenants.
    pub fn connections_of_user(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.by_user
            .get(user_id)
            .map(|set| set.iter().map(|id| *id).collect())
            .unwrap_or_default()
    }

    pub fn session(&self, connection_id: ConnectionId) -> Option<Arc<Session>> {
        self.connections
            .get(&connection_id)
            .map(|entry| entry.session.clone())
    }

    pub fn info(&self, connection_id: ConnectionId) -> Option<ConnectionInfo> {
        self.connections
            .get(&connection_id)
            .map(|entry| entry.info.clone())
    }

    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn active_partitions(&self) -> usize {
        self.partitions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn registry() -> ConnectionRegistry {
        let metrics = Arc::new(RealtimeMetrics::new());
        ConnectionRegistry::new(Arc::new(IngressRateLimiter::new(60)), metrics)
    }

    fn identity(org_id: OrgId) -> Identity {
        Identity {
            user_id: UserId::new(),
            org_id,
            role: Role::Agent,
        }
    }

    fn session(registry: &ConnectionRegistry) -> (Arc<Session>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        let session = Arc::new(Session::new(
            ConnectionId::new(),
            tx,
            registry.metrics.clone(),
        ));
        (session, rx)
    }

    #[tokio::test]
    async fn admit_and_remove_round_trip() {
        let registry = registry();
        let org = OrgId::new();
        let before = registry.count_in_tenant(&org);

        let (s, _rx) = session(&registry);
        let id = s.id();
        registry.admit(s, &identity(org));
        registry.rate_limiter.allow(id);
        assert_eq!(registry.count_in_tenant(&org), before + 1);

        let removed = registry.remove(id);
        assert!(removed.is_some());
        assert_eq!(registry.count_in_tenant(&org), before);
        assert_eq!(registry.rate_limiter.tracked_connections(), 0);
        assert_eq!(registry.active_partitions(), 0);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = registry();
        let org = OrgId::new();
        let (s, _rx) = session(&registry);
        let id = s.id();
        registry.admit(s, &identity(org));

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
    }

    #[tokio::test]
    async fn user_index_tracks_multiple_connections() {
        let registry = registry();
        let org = OrgId::new();
        let who = identity(org);

        let (s1, _rx1) = session(&registry);
        let (s2, _rx2) = session(&registry);
        registry.admit(s1.clone(), &who);
        registry.admit(s2.clone(), &who);

        assert_eq!(registry.connections_of_user(&who.user_id).len(), 2);
        registry.remove(s1.id());
        assert_eq!(registry.connections_of_user(&who.user_id).len(), 1);
    }

    #[tokio::test]
    async fn concurrent_admissions_and_removals_converge() {
        let registry = Arc::new(registry());
        let org = OrgId::new();

        let mut keep = Vec::new();
        let mut handles = Vec::new();
        for i in 0..50 {
            let (s, rx) = session(&registry);
            let id = s.id();
            let who = identity(org);
            let reg = registry.clone();
            // Leak the receivers so sessions stay open for the test
            std::mem::forget(rx);
            let remove_it = i % 2 == 0;
            if !remove_it {
                keep.push(id);
            }
            handles.push(tokio::spawn(async move {
                reg.admit(s, &who);
                if remove_it {
                    reg.remove(id);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(registry.count_in_tenant(&org), keep.len());
        let live = registry.live_connections(&org);
        for id in keep {
            assert!(live.contains(&id));
        }
    }
}
