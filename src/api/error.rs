//! Error responses shared by every endpoint.
//!
//! Handlers return `ApiError`; it renders as `{ "error": { code, message,
//! details? } }` with the status implied by the code. Validation failures
//! carry a per-field message map in `details` so clients can highlight the
//! offending inputs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-field validation messages, keyed by field name
pub type FieldErrors = HashMap<String, Vec<String>>;

/// Machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    /// A field failed shape or range checks
    ValidationError,
    /// A unique column (e.g. email) already holds this value
    UniquenessConflict,
    /// A referenced row (e.g. an item's owner) does not exist
    ForeignKeyViolation,
    InternalError,
    DatabaseError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::UniquenessConflict => StatusCode::CONFLICT,
            Self::BadRequest | Self::ValidationError | Self::ForeignKeyViolation => {
                StatusCode::BAD_REQUEST
            }
            Self::InternalError | Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::ValidationError => "validation_error",
            Self::UniquenessConflict => "uniqueness_conflict",
            Self::ForeignKeyViolation => "foreign_key_violation",
            Self::InternalError => "internal_error",
            Self::DatabaseError => "database_error",
        }
    }
}

/// Inner object of the wire envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldErrors>,
}

/// Wire envelope: `{ "error": { ... } }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<FieldErrors>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// The code, mostly useful in tests and logs
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// 409, a unique column already holds the supplied value
    pub fn uniqueness_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UniquenessConflict, message)
    }

    /// 400, a referenced row is missing
    pub fn foreign_key_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ForeignKeyViolation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// 400 with the whole field-error map attached. The top-level message
    /// repeats the single failure when there is exactly one, so simple
    /// clients need not dig into `details`.
    pub fn validation(errors: FieldErrors) -> Self {
        let message = match errors.len() {
            1 => errors
                .values()
                .next()
                .and_then(|msgs| msgs.first())
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string()),
            n => format!("Validation failed for {} fields", n),
        };

        let mut err = Self::new(ErrorCode::ValidationError, message);
        err.details = Some(errors);
        err
    }

    /// Validation failure on one field
    pub fn validation_field(field: &str, message: impl Into<String>) -> Self {
        Self::validation(FieldErrors::from([(
            field.to_string(),
            vec![message.into()],
        )]))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        let envelope = ErrorResponse {
            error: ErrorBody {
                code: self.code.as_str().to_string(),
                message: self.message,
                details: self.details,
            },
        };
        (status, Json(envelope)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

/// SQLite reports constraint violations as database errors with a message
/// prefix; translate the two the schema can produce into their own codes.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);

        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Resource not found"),
            sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE constraint failed") => {
                ApiError::uniqueness_conflict("A resource with this identifier already exists")
            }
            sqlx::Error::Database(db_err)
                if db_err.message().contains("FOREIGN KEY constraint failed") =>
            {
                ApiError::foreign_key_violation("Referenced resource does not exist")
            }
            _ => ApiError::database("A database error occurred"),
        }
    }
}

/// Collects field failures across a request body, then yields one
/// `validation_error` covering all of them, or nothing.
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    errors: FieldErrors,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Ok(()) when nothing was recorded, otherwise the combined error
    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::ValidationError.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::UniquenessConflict.status(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::ForeignKeyViolation.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ErrorCode::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::DatabaseError.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_single_field_message_is_lifted() {
        let err = ApiError::validation_field("email", "Invalid email format");
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.message, "Invalid email format");
    }

    #[test]
    fn test_multi_field_message_counts() {
        let mut errors = FieldErrors::new();
        errors.insert("name".to_string(), vec!["Name is required".to_string()]);
        errors.insert(
            "price".to_string(),
            vec!["Price must be greater than 0".to_string()],
        );

        let err = ApiError::validation(errors);
        assert!(err.message.contains("2 fields"));
    }

    #[test]
    fn test_builder_accumulates_per_field() {
        let mut builder = ValidationErrorBuilder::new();
        builder.add("name", "Name is required");
        builder.add("email", "Invalid email format");
        builder.add("name", "Name is too long");
        assert!(!builder.is_empty());

        let err = builder.finish().unwrap_err();
        let details = err.details.expect("details should be set");
        assert_eq!(details["name"].len(), 2);
        assert_eq!(details["email"].len(), 1);
    }

    #[test]
    fn test_empty_builder_is_ok() {
        assert!(ValidationErrorBuilder::new().finish().is_ok());
    }

    #[test]
    fn test_envelope_shape() {
        let err = ApiError::uniqueness_conflict("A user with this email already exists");
        let json = serde_json::to_string(&ErrorResponse {
            error: ErrorBody {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: None,
            },
        })
        .unwrap();
        assert!(json.contains("\"uniqueness_conflict\""));
        assert!(!json.contains("details"));
    }
}
