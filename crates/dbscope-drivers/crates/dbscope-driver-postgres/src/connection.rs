//! PostgreSQL connection implementation

use async_trait::async_trait;
use dbscope_core::{
    BufferedCursor, ColumnMeta, Connection, DbscopeError, QueryCancelHandle, QueryResult,
    QueryTicket, Result, Row, RowCursor, TlsConfig, TlsMode, Value,
};
use futures::TryStreamExt;
use postgres_native_tls::MakeTlsConnector;
use postgres_types::ToSql;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_postgres::{CancelToken, Client, NoTls, RowStream, Statement};

use crate::driver::PostgresConnectOptions;
use crate::tls::{build_tls_connector, ssl_mode};
use crate::values::{PgCell, PgValue};

/// Transport for connecting to the server, also used for cancel requests
#[derive(Clone)]
pub(crate) enum ServerTls {
    Plain,
    Tls(MakeTlsConnector),
}

impl ServerTls {
    pub(crate) fn for_config(config: &TlsConfig) -> Result<Self> {
        if config.mode == TlsMode::Disable {
            Ok(Self::Plain)
        } else {
            build_tls_connector(config).map(Self::Tls)
        }
    }

    async fn cancel(&self, token: &CancelToken) -> std::result::Result<(), tokio_postgres::Error> {
        match self {
            Self::Plain => token.cancel_query(NoTls).await,
            Self::Tls(connector) => token.cancel_query(connector.clone()).await,
        }
    }
}

/// Cancels one statement on the server.
///
/// The connection runs one statement at a time and the handle holds that
/// turn, so a cancel request can only reach the statement it was created
/// for. The turn is released once the cancel request (and the rollback of
/// a read-only transaction) has been sent, or when the handle is dropped.
pub struct PostgresCancelHandle {
    cancel_token: CancelToken,
    tls: ServerTls,
    client: Arc<Client>,
    runtime: Handle,
    turn: parking_lot::Mutex<Option<OwnedMutexGuard<()>>>,
    in_transaction: bool,
}

impl PostgresCancelHandle {
    /// Whether cancel requests are sent over TLS
    pub fn uses_tls(&self) -> bool {
        matches!(self.tls, ServerTls::Tls(_))
    }
}

impl QueryCancelHandle for PostgresCancelHandle {
    fn cancel(&self) {
        tracing::debug!("sending cancel request to PostgreSQL server");
        let cancel_token = self.cancel_token.clone();
        let tls = self.tls.clone();
        let client = Arc::clone(&self.client);
        let turn = self.turn.lock().take();
        let in_transaction = self.in_transaction;
        self.runtime.spawn(async move {
            if let Err(e) = tls.cancel(&cancel_token).await {
                tracing::warn!(error = %e, "failed to cancel PostgreSQL query");
            }
            if in_transaction {
                if let Err(e) = client.batch_execute("ROLLBACK").await {
                    tracing::warn!(error = %e, "failed to roll back cancelled transaction");
                }
            }
            drop(turn);
        });
    }
}

pub(crate) fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    for (label, extra) in [
        ("detail", db_error.detail()),
        ("hint", db_error.hint()),
        ("column", db_error.column()),
    ] {
        if let Some(extra) = extra.filter(|s| !s.trim().is_empty()) {
            message.push_str(&format!(" ({}: {})", label, extra));
        }
    }

    match db_error.code().code() {
        "42501" => format!("permission denied: {}", message),
        "42P01" => format!("undefined table: {}", message),
        "42703" => format!("undefined column: {}", message),
        "57014" => format!("query cancelled: {}", message),
        code => format!("{} (code: {})", message, code),
    }
}

/// PostgreSQL connection wrapper.
///
/// Concurrent callers share one backend and take turns: one statement runs
/// at a time, so a cancel request always reaches the statement it was sent
/// for.
pub struct PostgresConnection {
    client: Arc<Client>,
    cancel_token: CancelToken,
    tls: ServerTls,
    runtime: Handle,
    turn: Arc<Mutex<()>>,
    closed: Arc<AtomicBool>,
    query_timeout: Option<Duration>,
}

impl PostgresConnection {
    /// Connect to a PostgreSQL database.
    ///
    /// Must be called from within a Tokio runtime; the connection task is
    /// spawned onto it.
    pub async fn connect(options: &PostgresConnectOptions) -> Result<Self> {
        tracing::info!(
            host = %options.host,
            port = options.port,
            database = %options.database,
            ssl_mode = ?options.tls.mode,
            "connecting to PostgreSQL database"
        );

        let mut config = tokio_postgres::Config::new();
        config
            .host(&options.host)
            .port(options.port)
            .dbname(&options.database)
            .ssl_mode(ssl_mode(options.tls.mode));
        if let Some(user) = &options.user {
            config.user(user);
        }
        if let Some(password) = &options.password {
            config.password(password);
        }
        if let Some(application_name) = &options.application_name {
            config.application_name(application_name);
        }
        if let Some(timeout) = options.connect_timeout {
            config.connect_timeout(timeout);
        }

        let runtime = Handle::try_current().map_err(|e| {
            DbscopeError::Connection(format!("PostgreSQL driver requires a Tokio runtime: {}", e))
        })?;
        let closed = Arc::new(AtomicBool::new(false));

        let tls = ServerTls::for_config(&options.tls)?;
        let client = match &tls {
            ServerTls::Plain => {
                let (client, connection) = config.connect(NoTls).await.map_err(connect_error)?;
                spawn_connection_task(&runtime, connection, Arc::clone(&closed));
                client
            }
            ServerTls::Tls(connector) => {
                let (client, connection) = config
                    .connect(connector.clone())
                    .await
                    .map_err(connect_error)?;
                spawn_connection_task(&runtime, connection, Arc::clone(&closed));
                client
            }
        };

        tracing::info!(
            host = %options.host,
            port = options.port,
            database = %options.database,
            "PostgreSQL connection established"
        );
        Ok(Self {
            cancel_token: client.cancel_token(),
            client: Arc::new(client),
            tls,
            runtime,
            turn: Arc::new(Mutex::new(())),
            closed,
            query_timeout: options.query_timeout,
        })
    }

    /// Wait for this caller's turn on the backend
    async fn take_turn(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.turn).lock_owned().await
    }

    /// Take a turn and hand it to a cancel handle attached to `ticket`
    async fn take_tracked_turn(&self, ticket: &QueryTicket, in_transaction: bool) -> Result<()> {
        let turn = self.take_turn().await;
        ticket.attach(Box::new(self.cancel_handle_for(turn, in_transaction)));
        if ticket.is_cancelled() {
            return Err(DbscopeError::Cancelled);
        }
        Ok(())
    }

    fn cancel_handle_for(
        &self,
        turn: OwnedMutexGuard<()>,
        in_transaction: bool,
    ) -> PostgresCancelHandle {
        PostgresCancelHandle {
            cancel_token: self.cancel_token.clone(),
            tls: self.tls.clone(),
            client: Arc::clone(&self.client),
            runtime: self.runtime.clone(),
            turn: parking_lot::Mutex::new(Some(turn)),
            in_transaction,
        }
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start_time = Instant::now();
        let (statement, pg_params) = self.prepare_and_bind(sql, params).await?;
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let pg_rows = self
            .client
            .query(&statement, &param_refs)
            .await
            .map_err(|e| {
                DbscopeError::Query(format!(
                    "Failed to execute query: {}",
                    format_postgres_error(&e)
                ))
            })?;

        let columns = column_meta(&statement);
        let names: Arc<[String]> = columns.iter().map(|c| c.name.clone()).collect();
        let rows = pg_rows
            .iter()
            .map(|pg_row| row_values(pg_row).map(|values| Row::new(Arc::clone(&names), values)))
            .collect::<Result<Vec<_>>>()?;

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            execution_time_ms = execution_time_ms,
            "query executed successfully"
        );

        Ok(QueryResult {
            id: uuid::Uuid::new_v4(),
            columns,
            rows,
            execution_time_ms,
            warnings: Vec::new(),
        })
    }

    async fn stream(
        &self,
        sql: &str,
        params: &[Value],
        turn: Option<OwnedMutexGuard<()>>,
    ) -> Result<Box<dyn RowCursor>> {
        let (statement, pg_params) = self.prepare_and_bind(sql, params).await?;
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let stream = self
            .client
            .query_raw(&statement, param_refs)
            .await
            .map_err(|e| {
                DbscopeError::Query(format!(
                    "Failed to execute query: {}",
                    format_postgres_error(&e)
                ))
            })?;

        Ok(Box::new(PostgresCursor {
            columns: column_meta(&statement),
            stream: Some(Box::pin(stream)),
            turn,
        }))
    }

    async fn prepare_and_bind(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<(Statement, Vec<PgValue>)> {
        let statement = self.client.prepare(sql).await.map_err(|e| {
            DbscopeError::Query(format!("Failed to prepare query: {}", format_postgres_error(&e)))
        })?;
        if statement.params().len() != params.len() {
            return Err(DbscopeError::Query(format!(
                "query expects {} parameters but {} were supplied",
                statement.params().len(),
                params.len()
            )));
        }
        let pg_params = params
            .iter()
            .zip(statement.params())
            .map(|(value, target)| PgValue::for_type(value, target))
            .collect();
        Ok((statement, pg_params))
    }
}

fn connect_error(e: tokio_postgres::Error) -> DbscopeError {
    DbscopeError::Connection(format!(
        "Failed to connect to PostgreSQL: {}",
        format_postgres_error(&e)
    ))
}

fn spawn_connection_task<S, T>(
    runtime: &Handle,
    connection: tokio_postgres::Connection<S, T>,
    closed: Arc<AtomicBool>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    runtime.spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "PostgreSQL connection error");
        }
        closed.store(true, Ordering::SeqCst);
    });
}

fn column_meta(statement: &Statement) -> Vec<ColumnMeta> {
    statement
        .columns()
        .iter()
        .enumerate()
        .map(|(ordinal, col)| ColumnMeta::new(col.name(), col.type_().name(), ordinal))
        .collect()
}

fn row_values(row: &tokio_postgres::Row) -> Result<Vec<Value>> {
    (0..row.len())
        .map(|idx| {
            row.try_get::<_, PgCell>(idx).map(|cell| cell.0).map_err(|e| {
                DbscopeError::Query(format!(
                    "Failed to decode column {}: {}",
                    row.columns()[idx].name(),
                    e
                ))
            })
        })
        .collect()
}

/// Streaming cursor over a PostgreSQL result.
///
/// Rows are pulled from the server as [`RowCursor::next_row`] is called.
/// Closing (or dropping) the cursor discards whatever the server still sends.
/// An untracked cursor holds the backend turn until it is closed; a tracked
/// one leaves the turn to its cancel handle.
pub struct PostgresCursor {
    columns: Vec<ColumnMeta>,
    stream: Option<Pin<Box<RowStream>>>,
    turn: Option<OwnedMutexGuard<()>>,
}

#[async_trait]
impl RowCursor for PostgresCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        let next = stream.try_next().await;
        match next {
            Ok(Some(row)) => row_values(&row).map(Some),
            Ok(None) => {
                self.stream = None;
                Ok(None)
            }
            Err(e) => {
                self.stream = None;
                Err(DbscopeError::Query(format!(
                    "Failed to read row: {}",
                    format_postgres_error(&e)
                )))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream = None;
        self.turn = None;
        Ok(())
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgres"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let _turn = self.take_turn().await;
        self.fetch_all(sql, params).await
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query_cursor(&self, sql: &str, params: &[Value]) -> Result<Box<dyn RowCursor>> {
        let turn = self.take_turn().await;
        self.stream(sql, params, Some(turn)).await
    }

    #[tracing::instrument(skip(self, sql, params, ticket), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query_cursor_tracked(
        &self,
        sql: &str,
        params: &[Value],
        ticket: &QueryTicket,
    ) -> Result<Box<dyn RowCursor>> {
        self.take_tracked_turn(ticket, false).await?;
        self.stream(sql, params, None).await
    }

    #[tracing::instrument(skip(self, sql, params, ticket), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query_read_only(
        &self,
        sql: &str,
        params: &[Value],
        ticket: &QueryTicket,
    ) -> Result<Box<dyn RowCursor>> {
        self.take_tracked_turn(ticket, true).await?;
        self.client
            .batch_execute("BEGIN READ ONLY")
            .await
            .map_err(|e| {
                DbscopeError::Query(format!(
                    "Failed to start read-only transaction: {}",
                    format_postgres_error(&e)
                ))
            })?;
        let outcome = self.fetch_all(sql, params).await;
        let ended = self.client.batch_execute("ROLLBACK").await;
        let result = outcome?;
        ended.map_err(|e| {
            DbscopeError::Query(format!(
                "Failed to end read-only transaction: {}",
                format_postgres_error(&e)
            ))
        })?;
        Ok(Box::new(BufferedCursor::new(result)))
    }

    fn default_query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing PostgreSQL connection");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.client.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_tls_cancels_over_the_tls_connector() {
        let config = TlsConfig {
            mode: TlsMode::Require,
            ..Default::default()
        };
        let tls = ServerTls::for_config(&config).expect("connector should build");
        assert!(matches!(tls, ServerTls::Tls(_)));
    }

    #[test]
    fn disabled_tls_cancels_in_plain_text() {
        let config = TlsConfig {
            mode: TlsMode::Disable,
            ..Default::default()
        };
        let tls = ServerTls::for_config(&config).expect("plain transport");
        assert!(matches!(tls, ServerTls::Plain));
    }
}
