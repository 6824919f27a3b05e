pub use atrio_shared::*;

/// Errores del dominio
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("User not found or inactive: {user_id}")]
    UserNotFound { user_id: UserId },

    #[error("Organization not found: {org_id}")]
    OrgNotFound { org_id: OrgId },

    #[error("Persistence unavailable: {message}")]
    PersistenceUnavailable { message: String },

    #[error("Infrastructure error: {message}")]
    InfrastructureError { message: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
