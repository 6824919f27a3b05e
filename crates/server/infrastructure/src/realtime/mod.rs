//! Realtime WebSocket Infrastructure
//!
//! Tenant-partitioned connection tracking and event fan-out.

pub mod metrics;
pub mod rate_limit;
pub mod registry;
pub mod router;
pub mod session;

// Re-exports
pub use metrics::RealtimeMetrics;
pub use rate_limit::IngressRateLimiter;
pub use registry::{ConnectionInfo, ConnectionRegistry};
pub use router::{BroadcastError, BroadcastRouter};
pub use session::{SESSION_CHANNEL_CAPACITY, Session, SessionError};
