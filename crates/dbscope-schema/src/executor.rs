//! Statement execution with per-statement cancellation, and sequential
//! fallback over query candidates

use dbscope_core::{Connection, DbscopeError, QueryTicket, Row, Value};

use crate::{CandidateList, IntrospectionContext, SchemaError, SchemaResult, collect_rows};

/// How a statement is handed to the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Catalog queries built by the dialects
    Introspection,
    /// Agent-supplied SQL, run inside a read-only transaction where the
    /// driver supports one
    ReadOnly,
}

/// Why a statement produced no rows
#[derive(Debug)]
pub enum StatementError {
    /// The database rejected the statement or failed mid-result
    Driver(DbscopeError),
    /// Deadline or cancellation; nothing further may run for the call
    Interrupted(SchemaError),
}

/// Submit one statement and read all of its rows under `ctx`.
///
/// When the deadline passes or the context is cancelled, only this
/// statement is cancelled on the server. Nothing is cancelled if the
/// statement was never submitted. Driver-reported timeouts and
/// cancellations count as interruptions.
pub async fn run_statement(
    conn: &dyn Connection,
    ctx: &IntrospectionContext,
    sql: &str,
    params: &[Value],
    submission: Submission,
    operation: &str,
) -> Result<Vec<Row>, StatementError> {
    let ticket = QueryTicket::new();
    let outcome = read_statement(conn, ctx, sql, params, submission, operation, &ticket).await;
    match &outcome {
        Err(StatementError::Interrupted(_)) => {
            if ticket.cancel() {
                tracing::debug!(operation = %operation, "cancel sent for interrupted statement");
            }
        }
        _ => ticket.finish(),
    }
    outcome
}

async fn read_statement(
    conn: &dyn Connection,
    ctx: &IntrospectionContext,
    sql: &str,
    params: &[Value],
    submission: Submission,
    operation: &str,
    ticket: &QueryTicket,
) -> Result<Vec<Row>, StatementError> {
    let submit = match submission {
        Submission::Introspection => conn.query_cursor_tracked(sql, params, ticket),
        Submission::ReadOnly => conn.query_read_only(sql, params, ticket),
    };
    let cursor = ctx
        .run(operation, submit)
        .await
        .map_err(StatementError::Interrupted)?
        .map_err(|e| driver_failure(e, operation, ticket))?;

    collect_rows(cursor, ctx, operation)
        .await
        .map_err(|e| match e {
            SchemaError::RowRead { source, .. } => driver_failure(source, operation, ticket),
            other if other.is_interruption() => StatementError::Interrupted(other),
            other => StatementError::Driver(DbscopeError::Other(other.to_string())),
        })
}

/// The driver already ended the statement, so there is nothing left to
/// cancel. Its own timeouts and cancellations still stop the call like a
/// context interruption does.
fn driver_failure(error: DbscopeError, operation: &str, ticket: &QueryTicket) -> StatementError {
    ticket.finish();
    let operation = operation.to_string();
    match error {
        DbscopeError::Cancelled => StatementError::Interrupted(SchemaError::Cancelled { operation }),
        DbscopeError::Timeout(_) => StatementError::Interrupted(SchemaError::Timeout { operation }),
        other => StatementError::Driver(other),
    }
}

/// Run `candidates` in order and return the rows of the first that succeeds.
///
/// Failures are logged and the next candidate is tried. Exhausting the list
/// fails with the last candidate's error and the number of attempts. A
/// deadline or cancellation stops immediately.
pub async fn execute_with_fallbacks(
    conn: &dyn Connection,
    ctx: &IntrospectionContext,
    candidates: &CandidateList,
    operation: &str,
) -> SchemaResult<Vec<Row>> {
    let mut last_error = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let args = candidate.values();
        let outcome = run_statement(
            conn,
            ctx,
            candidate.sql(),
            &args,
            Submission::Introspection,
            operation,
        )
        .await;
        match outcome {
            Ok(rows) => {
                tracing::debug!(
                    operation = %operation,
                    attempt = index + 1,
                    row_count = rows.len(),
                    "fallback query succeeded"
                );
                return Ok(rows);
            }
            Err(StatementError::Interrupted(e)) => {
                tracing::warn!(operation = %operation, attempt = index + 1, error = %e, "introspection interrupted");
                return Err(e);
            }
            Err(StatementError::Driver(e)) => {
                tracing::warn!(
                    operation = %operation,
                    attempt = index + 1,
                    sql = %candidate.preview(),
                    error = %e,
                    "fallback query failed"
                );
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(source) => Err(SchemaError::CandidatesExhausted {
            operation: operation.to_string(),
            attempts: candidates.len(),
            source,
        }),
        None => Err(SchemaError::NoCandidates {
            operation: operation.to_string(),
        }),
    }
}
