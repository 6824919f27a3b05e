//! Ports to the persistence collaborator
//!
//! The CRM's row store lives behind these traits; this core performs only
//! the reads named here. A failing read surfaces as
//! `DomainError::PersistenceUnavailable` and is retried on the next natural
//! trigger (next tick, next connection attempt), never in a tight loop.

use crate::identity::Role;
use crate::shared_kernel::{OrgId, PlanTier, Result, UserId};
use crate::tickets::Ticket;
use async_trait::async_trait;
use atrio_shared::realtime::EventCategory;
use serde::{Deserialize, Serialize};

/// A user row as stored by the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub org_id: OrgId,
    pub role: Role,
    pub active: bool,
}

/// Organization profile, used to gate which event categories a tenant may
/// subscribe to by plan tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationProfile {
    pub id: OrgId,
    pub plan: PlanTier,
    pub allowed_events: Vec<EventCategory>,
}

impl OrganizationProfile {
    /// Profile with the default category set for a plan tier.
    pub fn with_tier_defaults(id: OrgId, plan: PlanTier) -> Self {
        let allowed_events = match plan {
            PlanTier::Free => vec![
                EventCategory::Entity,
                EventCategory::Ticket,
                EventCategory::Notification,
            ],
            PlanTier::Pro | PlanTier::Enterprise => vec![
                EventCategory::Entity,
                EventCategory::Ticket,
                EventCategory::Notification,
                EventCategory::Presence,
            ],
        };
        Self {
            id,
            plan,
            allowed_events,
        }
    }

    pub fn admits(&self, category: EventCategory) -> bool {
        self.allowed_events.contains(&category)
    }
}

/// User directory reads.
#[async_trait]
pub trait DirectoryPort: Send + Sync {
    /// Load a user by id. Returns the stored record even when inactive;
    /// callers decide what inactive means for them.
    async fn fetch_active_user(&self, user_id: &UserId) -> Result<Option<UserRecord>>;

    /// All active users of an organization holding `role`. Used to resolve
    /// escalation targets.
    async fn users_with_role(&self, org_id: &OrgId, role: Role) -> Result<Vec<UserId>>;
}

/// Support ticket reads.
#[async_trait]
pub trait TicketStorePort: Send + Sync {
    /// All tickets not yet in a terminal status, across organizations.
    async fn fetch_open_tickets(&self) -> Result<Vec<Ticket>>;
}

/// Organization reads.
#[async_trait]
pub trait OrganizationPort: Send + Sync {
    async fn fetch_organization(&self, org_id: &OrgId) -> Result<Option<OrganizationProfile>>;
}
