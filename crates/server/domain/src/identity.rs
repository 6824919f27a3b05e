//! Verified identity and authentication errors

use crate::shared_kernel::{OrgId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role of a user within its organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Manager,
    Admin,
    Customer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Agent => write!(f, "agent"),
            Role::Manager => write!(f, "manager"),
            Role::Admin => write!(f, "admin"),
            Role::Customer => write!(f, "customer"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "agent" => Ok(Role::Agent),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The outcome of a successful connection-time verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub org_id: OrgId,
    pub role: Role,
}

/// Errors fatal to a connection attempt. A refused connection receives one
/// terminal error event and is never admitted to the registry.
#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    Expired,

    #[error("User not found or inactive")]
    UserNotFound,

    #[error("Token tenant does not match stored tenant")]
    TenantMismatch,
}

impl AuthError {
    /// Stable wire code delivered to the refused client.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::Expired => "token_expired",
            AuthError::UserNotFound => "user_not_found",
            AuthError::TenantMismatch => "tenant_mismatch",
        }
    }
}
