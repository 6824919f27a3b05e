//! Configuration Data Transfer Objects (DTOs)
//!
//! Immutable configuration loaded once at startup and passed to every
//! service via constructor injection.

use super::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Top-level configuration for the Atrio realtime server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtrioConfig {
    /// Websocket server configuration
    pub server: ServerConfig,

    /// Token verification configuration
    pub auth: AuthConfig,

    /// Escalation sweep configuration
    pub escalation: EscalationConfig,

    /// Per-connection ingress rate limiting
    pub ingress: IngressConfig,

    /// Notification ledger retention
    pub ledger: LedgerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Websocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the websocket server (e.g. "0.0.0.0:8080")
    pub bind_address: SocketAddr,

    /// Bind address for the metrics/health HTTP surface
    pub metrics_bind_address: SocketAddr,
}

/// Token verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to verify bearer tokens. Issuance happens elsewhere.
    pub jwt_secret: String,

    /// Expected issuer claim, if any
    pub jwt_issuer: Option<String>,
}

/// Escalation sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Seconds between scheduler ticks
    pub tick_interval_secs: u64,
}

/// Per-connection ingress rate limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressConfig {
    /// Inbound events admitted per connection per wall-clock minute
    pub events_per_minute: u32,
}

/// Notification ledger retention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Days a ledger entry survives before pruning
    pub retention_days: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level filter when `RUST_LOG` is unset
    pub level: String,
}

impl AtrioConfig {
    /// Build configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig {
                bind_address: parse_var("ATRIO_BIND", "0.0.0.0:8080")?,
                metrics_bind_address: parse_var("ATRIO_METRICS_BIND", "0.0.0.0:9091")?,
            },
            auth: AuthConfig {
                jwt_secret: require_var("ATRIO_JWT_SECRET")?,
                jwt_issuer: optional_var("ATRIO_JWT_ISSUER"),
            },
            escalation: EscalationConfig {
                tick_interval_secs: parse_var("ATRIO_TICK_INTERVAL_SECS", "300")?,
            },
            ingress: IngressConfig {
                events_per_minute: parse_var("ATRIO_INGRESS_EVENTS_PER_MINUTE", "60")?,
            },
            ledger: LedgerConfig {
                retention_days: parse_var("ATRIO_LEDGER_RETENTION_DAYS", "30")?,
            },
            logging: LoggingConfig {
                level: optional_var("ATRIO_LOG").unwrap_or_else(|| "info".to_string()),
            },
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn require_var(name: &str) -> Result<String> {
    optional_var(name).ok_or_else(|| ConfigError::MissingRequired {
        name: name.to_string(),
    })
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = optional_var(name).unwrap_or_else(|| default.to_string());
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        name: name.to_string(),
        value: raw.clone(),
        reason: e.to_string(),
    })
}
