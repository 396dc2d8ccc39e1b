use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Failure classes surfaced to callers; the HTTP layer maps these to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    ValidationFailed,
    NotFound,
    Conflict,
    WriteFailure,
    Unauthorized,
    Forbidden,
    Cancelled,
    Infrastructure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::WriteFailure => "write_failure",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Infrastructure => "infrastructure",
        }
    }
}

/// A single field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed ({} field errors)", .0.len())]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// The message is safe to show; I/O detail is logged where it happens.
    #[error("{0}")]
    WriteFailure(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl ServiceError {
    pub fn not_found(entity: &str, id: Uuid) -> Self {
        Self::NotFound(format!("{} {} not found", entity, id))
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::ValidationFailed,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::WriteFailure(_) => ErrorKind::WriteFailure,
            ServiceError::Unauthorized(_) => ErrorKind::Unauthorized,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::Cancelled | ServiceError::DeadlineExceeded => ErrorKind::Cancelled,
            ServiceError::Infrastructure(_) => ErrorKind::Infrastructure,
        }
    }

    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 1001,
            ServiceError::NotFound(_) => 1002,
            ServiceError::Conflict(_) => 1003,
            ServiceError::Unauthorized(_) => 1004,
            ServiceError::Forbidden(_) => 1005,
            ServiceError::WriteFailure(_) => 1101,
            ServiceError::Cancelled => 1201,
            ServiceError::DeadlineExceeded => 1202,
            ServiceError::Infrastructure(_) => 1300,
        }
    }
}

/// Merge extra field errors into a parse result, keeping every message.
pub fn with_field_errors<T>(parsed: Result<T, ServiceError>, extra: Vec<FieldError>) -> Result<T, ServiceError> {
    match parsed {
        Ok(v) if extra.is_empty() => Ok(v),
        Ok(_) => Err(ServiceError::Validation(extra)),
        Err(ServiceError::Validation(mut errs)) => {
            errs.extend(extra);
            Err(ServiceError::Validation(errs))
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_codes_are_stable() {
        assert_eq!(ServiceError::invalid("brand", "is required").kind(), ErrorKind::ValidationFailed);
        assert_eq!(ServiceError::DeadlineExceeded.kind(), ErrorKind::Cancelled);
        assert_eq!(ServiceError::Conflict("x".into()).code(), 1003);
        assert_eq!(ErrorKind::WriteFailure.as_str(), "write_failure");
    }

    #[test]
    fn merge_keeps_parse_and_extra_errors() {
        let parsed: Result<(), _> = Err(ServiceError::invalid("year", "must be a number"));
        let merged = with_field_errors(parsed, vec![FieldError::new("images", "too many files")]);
        match merged {
            Err(ServiceError::Validation(errs)) => {
                assert_eq!(errs.len(), 2);
                assert_eq!(errs[1].to_string(), "images: too many files");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(with_field_errors(Ok(1), vec![]).is_ok());
    }
}
