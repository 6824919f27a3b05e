//! Configuration module for the Atrio realtime core
//!
//! Principles:
//!
//! 1. **Single Source of Truth**: configuration is loaded once at startup
//! 2. **Fail Fast**: errors are reported immediately, no silent fallbacks
//! 3. **DTO Pattern**: configuration is immutable and passed via dependency injection
//! 4. **Env File Priority**: `.env` file > environment variables > defaults
//!
//! # Environment Variables
//!
//! - `ATRIO_BIND`: websocket server bind address (default `0.0.0.0:8080`)
//! - `ATRIO_METRICS_BIND`: metrics/health HTTP bind address (default `0.0.0.0:9091`)
//! - `ATRIO_JWT_SECRET`: HMAC secret for token verification (required)
//! - `ATRIO_JWT_ISSUER`: expected token issuer (optional)
//! - `ATRIO_TICK_INTERVAL_SECS`: escalation sweep interval (default 300)
//! - `ATRIO_INGRESS_EVENTS_PER_MINUTE`: per-connection ingress ceiling (default 60)
//! - `ATRIO_LEDGER_RETENTION_DAYS`: notification ledger retention (default 30)
//! - `ATRIO_LOG`: log level filter (default `info`)

mod dto;
mod error;
mod loader;
mod validator;

pub use dto::{
    AtrioConfig, AuthConfig, EscalationConfig, IngressConfig, LedgerConfig, LoggingConfig,
    ServerConfig,
};
pub use error::{ConfigError, Result};
pub use loader::ConfigLoader;
pub use validator::validate_config;
