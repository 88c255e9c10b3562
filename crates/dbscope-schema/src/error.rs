//! Error types for schema introspection

use dbscope_core::DbscopeError;
use thiserror::Error;

/// Errors raised while introspecting a database schema
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("{operation} failed after trying {attempts} fallback queries: {source}")]
    CandidatesExhausted {
        operation: String,
        attempts: usize,
        #[source]
        source: DbscopeError,
    },

    #[error("{operation}: no candidate queries for this dialect")]
    NoCandidates { operation: String },

    #[error("table parameter is required for {facet}")]
    TableRequired { facet: &'static str },

    #[error("{operation}: failed to read rows: {source}")]
    RowRead {
        operation: String,
        #[source]
        source: DbscopeError,
    },

    #[error("{operation} did not complete before the deadline")]
    Timeout { operation: String },

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },
}

impl SchemaError {
    /// Whether the error comes from a deadline or cancellation rather than
    /// from the database.
    ///
    /// Tolerant facets degrade on ordinary failures but must pass these on.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled { .. })
    }
}

/// Result type alias for schema introspection
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_message_names_operation_and_attempts() {
        let err = SchemaError::CandidatesExhausted {
            operation: "columns(orders)".into(),
            attempts: 2,
            source: DbscopeError::Query("permission denied".into()),
        };
        assert_eq!(
            err.to_string(),
            "columns(orders) failed after trying 2 fallback queries: Query error: permission denied"
        );
        assert!(!err.is_interruption());
    }

    #[test]
    fn deadline_and_cancel_are_interruptions() {
        assert!(SchemaError::Timeout { operation: "tables".into() }.is_interruption());
        assert!(SchemaError::Cancelled { operation: "tables".into() }.is_interruption());
        assert!(!SchemaError::TableRequired { facet: "columns" }.is_interruption());
    }
}
