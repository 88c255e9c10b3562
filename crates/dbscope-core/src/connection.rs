//! Connection trait and per-statement cancellation

use crate::{BufferedCursor, QueryResult, Result, RowCursor, Value};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Cancels one statement on the server.
///
/// A handle only ever targets the statement it was created for; it must
/// not disturb other statements running on the same connection.
pub trait QueryCancelHandle: Send + Sync {
    fn cancel(&self);
}

#[derive(Default)]
enum TicketState {
    #[default]
    Pending,
    Running(Box<dyn QueryCancelHandle>),
    Finished,
    Cancelled,
}

/// Links one submitted statement to the handle that can cancel it.
///
/// The caller creates a ticket per statement and passes it to
/// [`Connection::query_cursor_tracked`]. Once the statement is on the wire
/// the driver attaches a handle. The caller then either calls
/// [`QueryTicket::finish`] after reading the results, or
/// [`QueryTicket::cancel`] when interrupted. Cancelling a ticket whose
/// statement was never submitted fires nothing.
///
/// Dropping the last clone of a ticket drops its handle, which releases
/// whatever the driver tied to the statement.
#[derive(Clone, Default)]
pub struct QueryTicket {
    state: Arc<Mutex<TicketState>>,
}

impl QueryTicket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handle for the statement just submitted.
    ///
    /// A ticket cancelled before the statement was submitted fires the
    /// handle straight away.
    pub fn attach(&self, handle: Box<dyn QueryCancelHandle>) {
        let mut state = self.state.lock();
        match *state {
            TicketState::Pending => *state = TicketState::Running(handle),
            TicketState::Cancelled => {
                drop(state);
                handle.cancel();
            }
            TicketState::Running(_) | TicketState::Finished => {}
        }
    }

    /// Cancel the attached statement. Returns whether a handle was fired.
    pub fn cancel(&self) -> bool {
        let previous = std::mem::replace(&mut *self.state.lock(), TicketState::Cancelled);
        match previous {
            TicketState::Running(handle) => {
                handle.cancel();
                true
            }
            TicketState::Finished => {
                *self.state.lock() = TicketState::Finished;
                false
            }
            TicketState::Pending | TicketState::Cancelled => false,
        }
    }

    /// Mark the statement complete and release its handle
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if !matches!(*state, TicketState::Cancelled) {
            *state = TicketState::Finished;
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), TicketState::Running(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(*self.state.lock(), TicketState::Cancelled)
    }
}

/// A query-capable database handle.
///
/// Implementations must be safe to share between concurrent callers; the
/// introspection layer never serializes access on their behalf.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "postgres", "mysql")
    fn driver_name(&self) -> &str;

    /// Execute a query that returns rows and buffer the whole result
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Execute a query and return a cursor over its rows.
    ///
    /// The default implementation buffers through [`Connection::query`];
    /// drivers that can stream rows override it.
    async fn query_cursor(&self, sql: &str, params: &[Value]) -> Result<Box<dyn RowCursor>> {
        let result = self.query(sql, params).await?;
        Ok(Box::new(BufferedCursor::new(result)))
    }

    /// Like [`Connection::query_cursor`], attaching a cancel handle for the
    /// submitted statement to `ticket`.
    ///
    /// The default cannot cancel on the server and attaches nothing.
    async fn query_cursor_tracked(
        &self,
        sql: &str,
        params: &[Value],
        _ticket: &QueryTicket,
    ) -> Result<Box<dyn RowCursor>> {
        self.query_cursor(sql, params).await
    }

    /// Run an agent-supplied statement inside a read-only transaction.
    ///
    /// The default only runs the statement; drivers whose engine supports
    /// read-only transactions override it.
    async fn query_read_only(
        &self,
        sql: &str,
        params: &[Value],
        ticket: &QueryTicket,
    ) -> Result<Box<dyn RowCursor>> {
        self.query_cursor_tracked(sql, params, ticket).await
    }

    /// Query timeout configured for this database, if any
    fn default_query_timeout(&self) -> Option<Duration> {
        None
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
