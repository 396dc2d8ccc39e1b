use thiserror::Error;

use crate::errors::ServiceError;

/// Business errors for auth workflows
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid credentials")]
    Unauthorized,
    #[error("insufficient role")]
    Forbidden,
    #[error("hashing error: {0}")]
    HashError(String),
    #[error("token error: {0}")]
    TokenError(String),
    #[error("repository error: {0}")]
    Repository(String),
}

impl AuthError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            AuthError::Validation(_) => 1001,
            AuthError::Unauthorized => 1004,
            AuthError::Forbidden => 1005,
            AuthError::HashError(_) => 1101,
            AuthError::TokenError(_) => 1102,
            AuthError::Repository(_) => 1200,
        }
    }
}

impl From<ServiceError> for AuthError {
    fn from(e: ServiceError) -> Self { AuthError::Repository(e.to_string()) }
}

impl From<AuthError> for ServiceError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(msg) => ServiceError::invalid("credentials", msg),
            AuthError::Unauthorized => ServiceError::Unauthorized("invalid credentials".into()),
            AuthError::TokenError(_) => ServiceError::Unauthorized("invalid or expired token".into()),
            AuthError::Forbidden => ServiceError::Forbidden("insufficient role".into()),
            AuthError::HashError(msg) | AuthError::Repository(msg) => ServiceError::Infrastructure(msg),
        }
    }
}
