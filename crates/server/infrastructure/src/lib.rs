// Atrio CRM Realtime Core - Infrastructure Layer
// Concrete implementations organized by concern:
// - realtime: connection registry, sessions, broadcast router, rate limiter, metrics
// - ledger: bounded in-memory notification ledger with escalation dedup index
// - persistence: in-memory adapters for the persistence ports (tests/dev mode)

pub mod ledger;
pub mod persistence;
pub mod realtime;

pub use ledger::NotificationLedger;
