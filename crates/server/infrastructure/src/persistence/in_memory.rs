//! In-memory implementations of the persistence ports
//!
//! Backing store for tests and for running the server without a hosted
//! database. Each adapter can be flipped into a degraded state to exercise
//! the `PersistenceUnavailable` paths.

use async_trait::async_trait;
use atrio_server_domain::identity::Role;
use atrio_server_domain::ports::{
    DirectoryPort, OrganizationPort, OrganizationProfile, TicketStorePort, UserRecord,
};
use atrio_server_domain::shared_kernel::{DomainError, OrgId, Result, UserId};
use atrio_server_domain::tickets::Ticket;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

fn unavailable() -> DomainError {
    DomainError::PersistenceUnavailable {
        message: "store offline".to_string(),
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: Mutex<HashMap<UserId, UserRecord>>,
    degraded: AtomicBool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserRecord) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    pub fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::Relaxed);
    }
}

#[async_trait]
impl DirectoryPort for InMemoryDirectory {
    async fn fetch_active_user(&self, user_id: &UserId) -> Result<Option<UserRecord>> {
        if self.degraded.load(Ordering::Relaxed) {
            return Err(unavailable());
        }
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }

    async fn users_with_role(&self, org_id: &OrgId, role: Role) -> Result<Vec<UserId>> {
        if self.degraded.load(Ordering::Relaxed) {
            return Err(unavailable());
        }
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.org_id == *org_id && u.role == role && u.active)
            .map(|u| u.id)
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    tickets: Mutex<Vec<Ticket>>,
    degraded: AtomicBool,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, ticket: Ticket) {
        self.tickets.lock().unwrap().push(ticket);
    }

    pub fn replace_all(&self, tickets: Vec<Ticket>) {
        *self.tickets.lock().unwrap() = tickets;
    }

    pub fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::Relaxed);
    }
}

#[async_trait]
impl TicketStorePort for InMemoryTicketStore {
    async fn fetch_open_tickets(&self) -> Result<Vec<Ticket>> {
        if self.degraded.load(Ordering::Relaxed) {
            return Err(unavailable());
        }
        Ok(self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.is_terminal())
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryOrganizations {
    orgs: Mutex<HashMap<OrgId, OrganizationProfile>>,
    degraded: AtomicBool,
}

impl InMemoryOrganizations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: OrganizationProfile) {
        self.orgs.lock().unwrap().insert(profile.id, profile);
    }

    pub fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::Relaxed);
    }
}

#[async_trait]
impl OrganizationPort for InMemoryOrganizations {
    async fn fetch_organization(&self, org_id: &OrgId) -> Result<Option<OrganizationProfile>> {
        if self.degraded.load(Ordering::Relaxed) {
            return Err(unavailable());
        }
        Ok(self.orgs.lock().unwrap().get(org_id).cloned())
    }
}
