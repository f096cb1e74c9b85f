use thiserror::Error;

use crate::actors::messages::ExternalServiceError;

/// Raised when a completion arrives but does not parse into the structured
/// shape a stage asked for.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    /// The payload could not be read as a JSON object, even after repair.
    #[error("response is not a JSON object: {0}")]
    NotJson(String),

    /// A field the stage cannot do without was absent.
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),

    /// A field was present but carried an unusable value.
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Application-wide error type, consolidating all possible errors into a single enum.
#[derive(Debug, Error, Clone)]
pub enum AppError {
    /// The completion service timed out, answered with a failure status, or
    /// could not be reached.
    #[error("External service error: {0}")]
    ExternalService(#[from] ExternalServiceError),

    /// A structured completion did not match the expected schema.
    #[error("Schema violation: {0}")]
    Schema(#[from] SchemaViolation),

    /// Represents data validation errors (e.g., an empty utterance).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Represents configuration-related errors (e.g., missing environment variables).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::ExternalService(err.into())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Schema(SchemaViolation::NotJson(err.to_string()))
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Config(format!("URL parse error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("Validation errors: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_violation_messages() {
        let err = AppError::from(SchemaViolation::MissingField("intent"));
        assert_eq!(
            err.to_string(),
            "Schema violation: required field `intent` is missing"
        );
    }

    #[test]
    fn test_json_error_becomes_schema_violation() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = AppError::from(json_err);
        assert!(matches!(err, AppError::Schema(SchemaViolation::NotJson(_))));
    }

    #[test]
    fn test_url_error_is_config() {
        let err = AppError::from(url::Url::parse("not a url").unwrap_err());
        assert!(matches!(err, AppError::Config(_)));
    }
}
