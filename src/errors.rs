use http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ModelError;
use crate::validation::SubmissionReport;

/// Error body for whatever presentation layer sits in front of the services.
/// The CLI prints it on stdout when a command fails under `--json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status category (e.g. "Not Found", "Unprocessable Entity")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Field-level failures for rejected submissions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// RFC 3339 timestamp when the error was produced
    pub timestamp: String,
}

impl From<&ServiceError> for ErrorResponse {
    fn from(error: &ServiceError) -> Self {
        let status = error.status_code();
        let details = match error {
            ServiceError::SubmissionRejected(report) => serde_json::to_value(report).ok(),
            _ => None,
        };
        Self {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: error.response_message(),
            details,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Submission rejected: {0}")]
    SubmissionRejected(SubmissionReport),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Coupon {0} is sold out")]
    SoldOut(Uuid),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<ModelError> for ServiceError {
    fn from(err: ModelError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::StorageError(err.to_string())
    }
}

impl ServiceError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} with ID {} not found", entity, id))
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::SubmissionRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) | Self::SoldOut(_) => StatusCode::CONFLICT,
            Self::StorageError(_) | Self::SerializationError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for end users.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::StorageError(_) => "Storage error".to_string(),
            Self::SerializationError(_) | Self::Other(_) => "Internal server error".to_string(),
            Self::SubmissionRejected(report) => {
                format!("Submission rejected: {} field(s) failed validation", report.len())
            }
            _ => self.to_string(),
        }
    }

    pub fn submission_report(&self) -> Option<&SubmissionReport> {
        match self {
            Self::SubmissionRejected(report) => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{CodeConflict, SubmissionField, ValidationFailure};

    fn rejected() -> ServiceError {
        let mut report = SubmissionReport::default();
        report.insert(
            SubmissionField::BaseCode,
            ValidationFailure::new(CodeConflict::DuplicateBaseCode, "code 'A10' is taken"),
        );
        ServiceError::SubmissionRejected(report)
    }

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(rejected().status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            ServiceError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::SoldOut(Uuid::nil()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::StorageError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn service_error_response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::StorageError("/var/lib/snapshot.json: permission denied".into())
                .response_message(),
            "Storage error"
        );
        assert_eq!(
            ServiceError::Other(anyhow::anyhow!("boom")).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::NotFound("Coupon not found".into()).response_message(),
            "Not found: Coupon not found"
        );
    }

    #[test]
    fn error_response_carries_field_failures() {
        let err = rejected();
        let body = ErrorResponse::from(&err);
        assert_eq!(body.error, "Unprocessable Entity");
        let details = body.details.expect("details");
        assert_eq!(details["code"]["kind"], "duplicate_base_code");
    }

    #[test]
    fn model_errors_become_invalid_input() {
        let err: ServiceError = ModelError::EmptyCode.into();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
