//! Read-only query tool

use dbscope_connection::DatabaseManager;
use dbscope_core::{Row, Value, validate_read_only};
use dbscope_schema::{IntrospectionContext, StatementError, Submission, run_statement};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{ServiceError, ServiceResult};
use crate::schema_explorer::required;

/// Timeout used when neither the caller nor the database configures one
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5_000;

/// Arguments of the `dbQuery` tool
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct QueryArgs {
    /// SQL query to execute
    pub query: Option<String>,
    /// Positional parameters for the query
    #[serde(default)]
    pub params: Vec<String>,
    /// Query timeout in milliseconds (default: the database's query timeout, else 5000)
    pub timeout: Option<u64>,
    /// Database ID to use
    pub database: Option<String>,
}

impl QueryArgs {
    pub fn new(database: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            database: Some(database.into()),
            ..Default::default()
        }
    }

    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }
}

/// Result of a `dbQuery` call
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutput {
    pub results: Vec<Row>,
    pub query: String,
    pub params: Vec<String>,
    #[serde(rename = "rowCount")]
    pub row_count: usize,
}

/// The `dbQuery` tool
pub struct QueryTool {
    databases: Arc<DatabaseManager>,
}

impl QueryTool {
    pub fn new(databases: Arc<DatabaseManager>) -> Self {
        Self { databases }
    }

    pub async fn call(&self, args: QueryArgs) -> ServiceResult<QueryOutput> {
        self.call_with_cancellation(args, CancellationToken::new())
            .await
    }

    /// Run one statement, stopping early when `token` is cancelled
    #[tracing::instrument(skip(self, args, token), fields(database = ?args.database))]
    pub async fn call_with_cancellation(
        &self,
        args: QueryArgs,
        token: CancellationToken,
    ) -> ServiceResult<QueryOutput> {
        let query = required(args.query.as_deref(), "query")?;
        validate_read_only(query)?;
        let database = required(args.database.as_deref(), "database")?;
        let conn = self
            .databases
            .get(database)
            .map_err(ServiceError::DatabaseNotFound)?;

        let timeout_ms = args
            .timeout
            .filter(|ms| *ms > 0)
            .or_else(|| {
                conn.default_query_timeout()
                    .map(|t| t.as_millis() as u64)
                    .filter(|ms| *ms > 0)
            })
            .unwrap_or(DEFAULT_QUERY_TIMEOUT_MS);
        let ctx = IntrospectionContext::with_timeout(Duration::from_millis(timeout_ms))
            .with_cancellation(token);

        let values: Vec<Value> = args.params.iter().map(|p| Value::from(p.as_str())).collect();
        let started = std::time::Instant::now();

        let outcome = run_statement(
            conn.as_ref(),
            &ctx,
            query,
            &values,
            Submission::ReadOnly,
            "query",
        )
        .await;
        let results = match outcome {
            Ok(rows) => rows,
            Err(StatementError::Driver(e)) => return Err(ServiceError::Query(e)),
            Err(StatementError::Interrupted(e)) => {
                return Err(ServiceError::from_schema(e, timeout_ms));
            }
        };

        tracing::debug!(
            row_count = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query executed"
        );

        Ok(QueryOutput {
            row_count: results.len(),
            results,
            query: query.to_string(),
            params: args.params,
        })
    }
}
