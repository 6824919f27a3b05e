//! Configuration validation
//!
//! Rejects configurations that would silently disable a subsystem.

use super::dto::AtrioConfig;
use super::error::{ConfigError, Result};

pub fn validate_config(config: &AtrioConfig) -> Result<()> {
    if config.auth.jwt_secret.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            name: "ATRIO_JWT_SECRET".to_string(),
            value: String::new(),
            reason: "secret must not be empty".to_string(),
        });
    }

    if config.escalation.tick_interval_secs == 0 {
        return Err(ConfigError::InvalidValue {
            name: "ATRIO_TICK_INTERVAL_SECS".to_string(),
            value: "0".to_string(),
            reason: "tick interval must be positive".to_string(),
        });
    }

    if config.ingress.events_per_minute == 0 {
        return Err(ConfigError::InvalidValue {
            name: "ATRIO_INGRESS_EVENTS_PER_MINUTE".to_string(),
            value: "0".to_string(),
            reason: "rate limit ceiling must be positive".to_string(),
        });
    }

    if config.ledger.retention_days == 0 {
        return Err(ConfigError::InvalidValue {
            name: "ATRIO_LEDGER_RETENTION_DAYS".to_string(),
            value: "0".to_string(),
            reason: "retention must be at least one day".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::dto::*;

    fn valid_config() -> AtrioConfig {
        AtrioConfig {
            server: ServerConfig {
                bind_address: "127.0.0.1:8080".parse().unwrap(),
                metrics_bind_address: "127.0.0.1:9091".parse().unwrap(),
            },
            auth: AuthConfig {
                jwt_secret: "secret".to_string(),
                jwt_issuer: None,
            },
            escalation: EscalationConfig {
                tick_interval_secs: 300,
            },
            ingress: IngressConfig {
                events_per_minute: 60,
            },
            ledger: LedgerConfig { retention_days: 30 },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn accepts_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn rejects_empty_secret() {
        let mut config = valid_config();
        config.auth.jwt_secret = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let mut config = valid_config();
        config.escalation.tick_interval_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_rate_ceiling() {
        let mut config = valid_config();
        config.ingress.events_per_minute = 0;
        assert!(validate_config(&config).is_err());
    }
}
