//! Uniform response envelope returned by every service operation.
//!
//! The wire shape is always `{succeeded, payload, message, errors}`. On
//! success `message` is null and `errors` empty; on failure `payload` is null.

use serde::Serialize;
use tracing::error;

use crate::errors::{ErrorKind, ServiceError};

const INTERNAL_MESSAGE: &str = "An internal error occurred";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub succeeded: bool,
    pub payload: Option<T>,
    pub message: Option<String>,
    pub errors: Vec<String>,
    /// Failure class for transport mapping; not part of the wire shape.
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
}

impl<T> Envelope<T> {
    pub fn success(payload: T) -> Self {
        Self { succeeded: true, payload: Some(payload), message: None, errors: Vec::new(), kind: None }
    }

    /// Map a failure to the fixed envelope shape.
    ///
    /// Infrastructure errors are logged here and replaced by a generic
    /// message so no internal detail reaches the boundary.
    pub fn failure(err: ServiceError) -> Self {
        let kind = err.kind();
        let (message, errors) = match err {
            ServiceError::Validation(fields) => (
                "Validation failed".to_string(),
                fields.iter().map(ToString::to_string).collect(),
            ),
            ServiceError::Infrastructure(detail) => {
                error!(code = 1300, error = %detail, "infrastructure failure mapped to envelope");
                (INTERNAL_MESSAGE.to_string(), Vec::new())
            }
            ServiceError::Cancelled => ("The operation was cancelled".to_string(), Vec::new()),
            ServiceError::DeadlineExceeded => ("The operation timed out".to_string(), Vec::new()),
            other => (other.to_string(), Vec::new()),
        };
        Self { succeeded: false, payload: None, message: Some(message), errors, kind: Some(kind) }
    }

    pub fn from_result(res: Result<T, ServiceError>) -> Self {
        match res {
            Ok(v) => Self::success(v),
            Err(e) => Self::failure(e),
        }
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FieldError;

    #[test]
    fn success_serializes_all_four_keys() {
        let env = Envelope::success(vec![1, 2]);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json, serde_json::json!({"succeeded": true, "payload": [1, 2], "message": null, "errors": []}));
    }

    #[test]
    fn unit_payload_serializes_as_null() {
        let env = Envelope::success(());
        let json = serde_json::to_value(&env).unwrap();
        assert!(json["payload"].is_null());
        assert_eq!(json["succeeded"], true);
    }

    #[test]
    fn validation_lists_field_errors() {
        let env: Envelope<()> = Envelope::failure(ServiceError::Validation(vec![
            FieldError::new("brand", "is required"),
            FieldError::new("year", "must be a whole number"),
        ]));
        assert!(!env.succeeded);
        assert!(env.is_kind(ErrorKind::ValidationFailed));
        assert_eq!(env.errors, vec!["brand: is required", "year: must be a whole number"]);
        assert_eq!(env.message.as_deref(), Some("Validation failed"));
    }

    #[test]
    fn infrastructure_detail_is_hidden() {
        let env: Envelope<()> = Envelope::failure(ServiceError::Infrastructure("connection reset by 10.0.0.7".into()));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["message"], INTERNAL_MESSAGE);
        assert!(json["payload"].is_null());
        assert_eq!(json["errors"], serde_json::json!([]));
        assert!(!json.to_string().contains("10.0.0.7"));
    }
}
