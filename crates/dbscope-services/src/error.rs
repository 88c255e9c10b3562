use dbscope_core::{DbscopeError, ReadOnlyViolation};
use dbscope_schema::SchemaError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Tool-level errors, worded for the agent reading them
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} parameter is required")]
    MissingParameter(&'static str),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid component: {0}")]
    InvalidComponent(String),

    #[error("failed to get database: {0}")]
    DatabaseNotFound(#[source] DbscopeError),

    #[error(transparent)]
    ReadOnlyViolation(#[from] ReadOnlyViolation),

    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("operation was cancelled")]
    Cancelled,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("failed to execute query: {0}")]
    Query(#[source] DbscopeError),

    #[error("failed to encode result: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

impl ServiceError {
    /// Map deadline and cancellation to their tool-level form
    pub(crate) fn from_schema(error: SchemaError, timeout_ms: u64) -> Self {
        match error {
            SchemaError::Timeout { .. } => ServiceError::Timeout { timeout_ms },
            SchemaError::Cancelled { .. } => ServiceError::Cancelled,
            other => ServiceError::Schema(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn messages() {
        assert_eq!(
            ServiceError::MissingParameter("component").to_string(),
            "component parameter is required"
        );
        assert_eq!(
            ServiceError::InvalidComponent("views".into()).to_string(),
            "invalid component: views"
        );
        assert_eq!(
            ServiceError::Timeout { timeout_ms: 250 }.to_string(),
            "operation timed out after 250ms"
        );
    }

    #[test]
    fn interruptions_lose_their_operation_label() {
        let timeout = SchemaError::Timeout {
            operation: "tables".into(),
        };
        assert!(matches!(
            ServiceError::from_schema(timeout, 10_000),
            ServiceError::Timeout { timeout_ms: 10_000 }
        ));

        let exhausted = SchemaError::NoCandidates {
            operation: "tables".into(),
        };
        assert!(matches!(
            ServiceError::from_schema(exhausted, 10_000),
            ServiceError::Schema(_)
        ));
    }
}
