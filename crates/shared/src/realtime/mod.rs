//! Wire types shared between the websocket server and its clients.

pub mod commands;
pub mod messages;

pub use commands::{ClientCommand, EventCategory};
pub use messages::{OutboundEvent, ServerMessage, outbound};
