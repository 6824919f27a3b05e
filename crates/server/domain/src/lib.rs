// Atrio CRM Realtime Core - Domain Layer
// Bounded contexts:
// - shared_kernel: errores y Result compartidos
// - tickets: modelo de lectura de tickets de soporte
// - escalation: reglas y política de escalado por prioridad
// - notifications: eventos de notificación y plantillas
// - identity: identidad verificada y errores de autenticación
// - ports: colaborador de persistencia (directorio, tickets, organizaciones)
// - events: eventos de dominio transitorios del bus
// - sla: tipos del informe SLA

pub mod escalation;
pub mod events;
pub mod identity;
pub mod notifications;
pub mod ports;
pub mod shared_kernel;
pub mod sla;
pub mod tickets;

pub use escalation::*;
pub use events::*;
pub use identity::*;
pub use notifications::*;
pub use ports::*;
pub use shared_kernel::*;
pub use sla::*;
pub use tickets::*;
