//! Identity Verifier
//!
//! Gates connection establishment: validates the bearer token, loads the
//! claimed user from the directory, confirms the user is active and that
//! the token's tenant matches the stored tenant. Exactly one read against
//! the persistence collaborator, no other side effects.

use crate::websocket::jwt::{JwtConfig, JwtError};
use atrio_server_domain::identity::{AuthError, Identity};
use atrio_server_domain::ports::DirectoryPort;
use atrio_server_domain::shared_kernel::{OrgId, UserId};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct IdentityVerifier {
    jwt: JwtConfig,
    directory: Arc<dyn DirectoryPort>,
}

impl IdentityVerifier {
    pub fn new(jwt: JwtConfig, directory: Arc<dyn DirectoryPort>) -> Self {
        Self { jwt, directory }
    }

    /// Verify a handshake. `claimed_org` is the tenant the client asked to
    /// join; it must match both the token claim and the stored user row.
    pub async fn verify(
        &self,
        token: Option<&str>,
        claimed_org: OrgId,
    ) -> Result<Identity, AuthError> {
        let token = token.ok_or(AuthError::MissingToken)?;

        let claims = self.jwt.validate_token(token).map_err(|e| match e {
            JwtError::ExpiredToken => AuthError::Expired,
            other => AuthError::InvalidToken(other.to_string()),
        })?;

        let user_id = UserId::from_str(&claims.subject)
            .map_err(|_| AuthError::InvalidToken("subject is not a valid user id".to_string()))?;
        let token_org = OrgId::from_str(&claims.org)
            .map_err(|_| AuthError::InvalidToken("org claim is not a valid id".to_string()))?;

        if token_org != claimed_org {
            warn!(user_id = %user_id, "Token org does not match requested org");
            return Err(AuthError::TenantMismatch);
        }

        let user = self
            .directory
            .fetch_active_user(&user_id)
            .await
            .map_err(|e| {
                warn!(error = %e, "Directory read failed during admission");
                // The attempt fails; the client retries on its next connect
                AuthError::UserNotFound
            })?
            .ok_or(AuthError::UserNotFound)?;

        if !user.active {
            return Err(AuthError::UserNotFound);
        }

        if user.org_id != claimed_org {
            return Err(AuthError::TenantMismatch);
        }

        debug!(user_id = %user.id, org_id = %user.org_id, "Identity verified");
        Ok(Identity {
            user_id: user.id,
            org_id: user.org_id,
            role: user.role,
        })
    }
}
