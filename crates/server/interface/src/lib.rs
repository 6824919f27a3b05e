// Atrio CRM Realtime Core - Interface Layer
// Connection-oriented channel exposed to the UI collaborator.

pub mod websocket;

pub use websocket::{IdentityVerifier, WebSocketState, handle_websocket};
