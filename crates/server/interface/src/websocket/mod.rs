//! WebSocket Handler Module for Real-time Updates
//!
//! Exposes the connection-oriented channel of the Atrio realtime core:
//!
//! 1. Extract bearer token from the handshake
//! 2. Verify identity against the user directory
//! 3. Fetch the organization profile for plan gating
//! 4. Admit the connection into the ConnectionRegistry
//! 5. Handle inbound named events through a single dispatch table
//! 6. Stream tenant fan-out and direct notifications to the client
//!
//! ## Security
//!
//! - Bearer token format: `Authorization: Bearer <token>` (a `token` query
//!   parameter is accepted as a fallback for browser clients)
//! - Token validation includes signature, expiration and issuer checks
//! - A refused connection receives one terminal error event, then close

mod handler;
mod jwt;
mod verifier;

pub use handler::{WebSocketState, handle_websocket};
pub use jwt::{JwtClaims, JwtConfig, JwtError, extract_token_from_header};
pub use verifier::IdentityVerifier;

// Re-export wire types from the shared crate
pub use atrio_shared::realtime::commands::ClientCommand;
pub use atrio_shared::realtime::messages::ServerMessage;
