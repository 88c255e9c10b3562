#![allow(dead_code)]

use async_trait::async_trait;
use dbscope_core::{
    BufferedCursor, ColumnMeta, Connection, DbscopeError, QueryCancelHandle, QueryResult,
    QueryTicket, Result, RowCursor, Value,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Build a result from string cells
pub fn result(columns: &[&str], rows: &[&[&str]]) -> QueryResult {
    QueryResult::from_values(
        columns,
        rows.iter()
            .map(|row| row.iter().map(|cell| Value::from(*cell)).collect())
            .collect(),
    )
}

#[derive(Clone)]
enum Response {
    Rows(QueryResult),
    Fail(String),
    DriverTimeout,
    Hang,
}

struct Rule {
    needle: String,
    param: Option<Value>,
    response: Response,
}

/// A query seen by the mock, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedQuery {
    pub sql: String,
    pub params: Vec<Value>,
    /// Submitted through the read-only transaction path
    pub read_only: bool,
}

#[derive(Default)]
struct Counters {
    cancels: AtomicUsize,
    cancelled_sql: Mutex<Vec<String>>,
    closed_cursors: AtomicUsize,
}

/// Scripted connection: the first rule whose needle occurs in the SQL (and
/// whose parameter, if any, was bound) answers. Unmatched queries fail.
pub struct MockConnection {
    driver: &'static str,
    rules: Mutex<Vec<Rule>>,
    log: Mutex<Vec<LoggedQuery>>,
    counters: Arc<Counters>,
    latency: Option<Duration>,
}

impl MockConnection {
    pub fn new(driver: &'static str) -> Self {
        Self {
            driver,
            rules: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
            latency: None,
        }
    }

    pub fn postgres() -> Self {
        Self::new("postgres")
    }

    pub fn mysql() -> Self {
        Self::new("mysql")
    }

    /// Delay every query by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn push(self, needle: &str, param: Option<&str>, response: Response) -> Self {
        self.rules.lock().push(Rule {
            needle: needle.to_string(),
            param: param.map(Value::from),
            response,
        });
        self
    }

    pub fn on(self, needle: &str, result: QueryResult) -> Self {
        self.push(needle, None, Response::Rows(result))
    }

    pub fn on_table(self, needle: &str, table: &str, result: QueryResult) -> Self {
        self.push(needle, Some(table), Response::Rows(result))
    }

    pub fn fail(self, needle: &str, message: &str) -> Self {
        self.push(needle, None, Response::Fail(message.to_string()))
    }

    pub fn fail_table(self, needle: &str, table: &str, message: &str) -> Self {
        self.push(needle, Some(table), Response::Fail(message.to_string()))
    }

    /// Answer with a driver-side statement timeout
    pub fn time_out(self, needle: &str) -> Self {
        self.push(needle, None, Response::DriverTimeout)
    }

    /// Never answer
    pub fn hang(self, needle: &str) -> Self {
        self.push(needle, None, Response::Hang)
    }

    pub fn hang_table(self, needle: &str, table: &str) -> Self {
        self.push(needle, Some(table), Response::Hang)
    }

    pub fn queries(&self) -> Vec<LoggedQuery> {
        self.log.lock().clone()
    }

    pub fn query_count(&self) -> usize {
        self.log.lock().len()
    }

    /// Number of logged queries whose SQL contains `needle`
    pub fn count_matching(&self, needle: &str) -> usize {
        self.log.lock().iter().filter(|q| q.sql.contains(needle)).count()
    }

    pub fn cancel_count(&self) -> usize {
        self.counters.cancels.load(Ordering::SeqCst)
    }

    /// SQL of every statement a cancel was sent for
    pub fn cancelled_queries(&self) -> Vec<String> {
        self.counters.cancelled_sql.lock().clone()
    }

    pub fn closed_cursor_count(&self) -> usize {
        self.counters.closed_cursors.load(Ordering::SeqCst)
    }

    fn respond(&self, sql: &str, params: &[Value]) -> Option<Response> {
        self.rules
            .lock()
            .iter()
            .find(|rule| {
                sql.contains(&rule.needle)
                    && rule.param.as_ref().is_none_or(|param| params.contains(param))
            })
            .map(|rule| rule.response.clone())
    }

    async fn cursor(
        &self,
        sql: &str,
        params: &[Value],
        read_only: bool,
    ) -> Result<Box<dyn RowCursor>> {
        let result = self.answer(sql, params, read_only).await?;
        Ok(Box::new(TrackingCursor {
            inner: BufferedCursor::new(result),
            counters: Arc::clone(&self.counters),
        }))
    }

    async fn answer(&self, sql: &str, params: &[Value], read_only: bool) -> Result<QueryResult> {
        self.log.lock().push(LoggedQuery {
            sql: sql.to_string(),
            params: params.to_vec(),
            read_only,
        });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.respond(sql, params) {
            Some(Response::Rows(result)) => Ok(result),
            Some(Response::Fail(message)) => Err(DbscopeError::Query(message)),
            Some(Response::DriverTimeout) => Err(DbscopeError::Timeout(
                "canceling statement due to statement timeout".into(),
            )),
            Some(Response::Hang) => std::future::pending().await,
            None => Err(DbscopeError::Query("relation does not exist".into())),
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        self.driver
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.answer(sql, params, false).await
    }

    async fn query_cursor(&self, sql: &str, params: &[Value]) -> Result<Box<dyn RowCursor>> {
        self.cursor(sql, params, false).await
    }

    async fn query_cursor_tracked(
        &self,
        sql: &str,
        params: &[Value],
        ticket: &QueryTicket,
    ) -> Result<Box<dyn RowCursor>> {
        ticket.attach(Box::new(CountingCancel {
            counters: Arc::clone(&self.counters),
            sql: sql.to_string(),
        }));
        self.cursor(sql, params, false).await
    }

    async fn query_read_only(
        &self,
        sql: &str,
        params: &[Value],
        ticket: &QueryTicket,
    ) -> Result<Box<dyn RowCursor>> {
        ticket.attach(Box::new(CountingCancel {
            counters: Arc::clone(&self.counters),
            sql: sql.to_string(),
        }));
        self.cursor(sql, params, true).await
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

/// Records which statement a cancel was aimed at
struct CountingCancel {
    counters: Arc<Counters>,
    sql: String,
}

impl QueryCancelHandle for CountingCancel {
    fn cancel(&self) {
        self.counters.cancels.fetch_add(1, Ordering::SeqCst);
        self.counters.cancelled_sql.lock().push(self.sql.clone());
    }
}

struct TrackingCursor {
    inner: BufferedCursor,
    counters: Arc<Counters>,
}

#[async_trait]
impl RowCursor for TrackingCursor {
    fn columns(&self) -> &[ColumnMeta] {
        self.inner.columns()
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        self.inner.next_row().await
    }

    async fn close(&mut self) -> Result<()> {
        if !self.inner.is_closed() {
            self.counters.closed_cursors.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.close().await
    }
}
