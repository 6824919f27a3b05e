// Atrio CRM Realtime Core - Application Layer
// Services coordinating the domain against the realtime infrastructure:
// - notifications: recipient computation, template rendering, delivery
// - escalation: recurring overdue-ticket sweep with windowed dedup
// - sla: on-demand aggregate reporting

pub mod escalation;
pub mod notifications;
pub mod sla;

pub use escalation::{EscalationScheduler, EscalationSchedulerConfig, SchedulerStats};
pub use notifications::{DispatchError, NotificationDispatcher};
pub use sla::SlaReporter;
