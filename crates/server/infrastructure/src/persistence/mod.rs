//! Persistence adapters
//!
//! The hosted row store is an external collaborator; only its read ports
//! are implemented here. The in-memory adapters serve tests and dev mode.

pub mod in_memory;

pub use in_memory::{InMemoryDirectory, InMemoryOrganizations, InMemoryTicketStore};
