//! JWT Token Management for WebSocket Authentication
//!
//! Validates bearer tokens presented at handshake time. Token issuance is
//! the auth service's business; only verification happens here.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// JWT claims carried by Atrio CRM tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User identifier
    #[serde(rename = "sub")]
    pub subject: String,
    /// Organization (tenant) the token claims membership of
    pub org: String,
    /// Token expiration timestamp (Unix seconds)
    #[serde(default)]
    pub exp: Option<u64>,
    /// Token issued at timestamp (Unix seconds)
    #[serde(default)]
    pub iat: Option<u64>,
}

/// Errors that can occur during JWT validation
#[derive(Debug, Error, PartialEq)]
pub enum JwtError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Invalid Authorization header format")]
    InvalidHeaderFormat,

    #[error("Invalid token scheme (expected Bearer)")]
    InvalidScheme,

    #[error("Token validation failed: {0}")]
    ValidationFailed(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Invalid token issuer")]
    InvalidIssuer,

    #[error("Token decoding failed: {0}")]
    DecodeError(String),
}

/// JWT configuration for token validation
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for validating tokens
    secret: Vec<u8>,
    /// Expected issuer
    issuer: Option<String>,
    /// Required algorithms
    algorithms: Vec<Algorithm>,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, issuer: Option<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer,
            algorithms: vec![Algorithm::HS256],
        }
    }

    /// Validate a JWT token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, JwtError> {
        let header = decode_header(token)
            .map_err(|e| JwtError::DecodeError(format!("Failed to decode header: {}", e)))?;

        if !self.algorithms.contains(&header.alg) {
            return Err(JwtError::ValidationFailed(format!(
                "Unsupported algorithm: {:?}",
                header.alg
            )));
        }

        let mut validation = Validation::new(header.alg);
        if let Some(ref issuer) = self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let decoding_key = DecodingKey::from_secret(&self.secret);

        decode::<JwtClaims>(token, &decoding_key, &validation)
            .map(|token_data| {
                debug!(subject = %token_data.claims.subject, "Token validated");
                token_data.claims
            })
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    warn!("Token has expired");
                    JwtError::ExpiredToken
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    warn!("Invalid token signature");
                    JwtError::InvalidSignature
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    warn!("Invalid token issuer");
                    JwtError::InvalidIssuer
                }
                _ => {
                    let message = e.to_string();
                    warn!(error = %message, "Token validation failed");
                    JwtError::ValidationFailed(message)
                }
            })
    }
}

/// Extract JWT token from Authorization header
pub fn extract_token_from_header(auth_header: &str) -> Result<&str, JwtError> {
    if !auth_header.starts_with("Bearer ") {
        warn!("Invalid authorization scheme");
        return Err(JwtError::InvalidScheme);
    }

    let token = auth_header.trim_start_matches("Bearer ");
    if token.is_empty() {
        warn!("Empty token after Bearer prefix");
        return Err(JwtError::InvalidHeaderFormat);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::SystemTime;

    fn create_test_token(claims: &JwtClaims, secret: &str, expires_in_seconds: i64) -> String {
        let mut claims = claims.clone();

        let exp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
            + expires_in_seconds;
        claims.exp = Some(if exp > 0 { exp as u64 } else { 0 });

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims() -> JwtClaims {
        JwtClaims {
            subject: "2c5f1f6e-8c63-4b8e-9f60-0d5a3a1f9d11".to_string(),
            org: "7f8f4a40-1111-4222-8333-444455556666".to_string(),
            exp: None,
            iat: None,
        }
    }

    #[test]
    fn test_extract_token_from_header_valid() {
        let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.test";
        let header = format!("Bearer {}", token);

        let result = extract_token_from_header(&header);
        assert_eq!(result.unwrap(), token);
    }

    #[test]
    fn test_extract_token_from_header_missing_bearer() {
        let result = extract_token_from_header("InvalidToken");
        assert_eq!(result.unwrap_err(), JwtError::InvalidScheme);
    }

    #[test]
    fn test_extract_token_from_header_empty() {
        let result = extract_token_from_header("Bearer ");
        assert_eq!(result.unwrap_err(), JwtError::InvalidHeaderFormat);
    }

    #[test]
    fn test_validate_token_valid() {
        let secret = "test-secret";
        let token = create_test_token(&claims(), secret, 3600);
        let config = JwtConfig::new(secret, None);

        let validated = config.validate_token(&token).unwrap();
        assert_eq!(validated.subject, claims().subject);
        assert_eq!(validated.org, claims().org);
    }

    #[test]
    fn test_validate_token_expired() {
        let secret = "test-secret";
        let token = create_test_token(&claims(), secret, -3600);
        let config = JwtConfig::new(secret, None);

        assert_eq!(
            config.validate_token(&token).unwrap_err(),
            JwtError::ExpiredToken
        );
    }

    #[test]
    fn test_validate_token_invalid_signature() {
        let token = create_test_token(&claims(), "secret-1", 3600);
        let config = JwtConfig::new("secret-2", None);

        assert_eq!(
            config.validate_token(&token).unwrap_err(),
            JwtError::InvalidSignature
        );
    }
}
