//! MySQL connection implementation

use async_trait::async_trait;
use dbscope_core::{
    BufferedCursor, ColumnMeta, Connection, DbscopeError, QueryCancelHandle, QueryResult,
    QueryTicket, Result, Row, RowCursor, Value,
};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, TxOpts};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::Mutex;

use crate::bind_literals;
use crate::driver::MySqlConnectOptions;

/// Pooled connection checked out for one statement
type ParkedConn = Arc<Mutex<Option<Conn>>>;

/// Cancels one statement with `KILL QUERY` sent over a separate connection.
///
/// The connection that runs the statement stays parked until the kill has
/// been delivered, so the pool cannot hand it to another caller first.
pub struct MySqlKillQuery {
    opts: Opts,
    connection_id: u32,
    parked: ParkedConn,
    runtime: Handle,
}

impl QueryCancelHandle for MySqlKillQuery {
    fn cancel(&self) {
        tracing::debug!(connection_id = self.connection_id, "killing MySQL query");
        let opts = self.opts.clone();
        let connection_id = self.connection_id;
        let parked = Arc::clone(&self.parked);
        self.runtime.spawn(async move {
            match Conn::new(opts).await {
                Ok(mut killer) => {
                    if let Err(e) = killer.query_drop(kill_statement(connection_id)).await {
                        tracing::warn!(connection_id, error = %e, "failed to kill MySQL query");
                    }
                    if let Err(e) = killer.disconnect().await {
                        tracing::debug!(error = %e, "error closing MySQL kill connection");
                    }
                }
                Err(e) => {
                    tracing::warn!(connection_id, error = %e, "failed to open MySQL kill connection")
                }
            }
            drop(parked.lock().await.take());
        });
    }
}

fn kill_statement(connection_id: u32) -> String {
    format!("KILL QUERY {}", connection_id)
}

/// MySQL connection wrapper backed by a small connection pool.
///
/// Statements run as server-side prepared statements, which the server
/// refuses to prepare when the text holds more than one statement.
pub struct MySqlConnection {
    pool: Pool,
    opts: Opts,
    runtime: Handle,
    database_name: Option<String>,
    closed: AtomicBool,
    query_timeout: Option<Duration>,
}

impl MySqlConnection {
    /// Connect to a MySQL database.
    ///
    /// Acquires one connection up front so configuration errors surface here
    /// rather than on the first query.
    pub async fn connect(options: &MySqlConnectOptions) -> Result<Self> {
        tracing::info!(
            host = %options.host,
            port = options.port,
            database = ?options.database,
            "connecting to MySQL database"
        );

        let constraints = PoolConstraints::new(1, options.max_connections.max(1)).ok_or_else(|| {
            DbscopeError::Configuration(format!(
                "invalid MySQL pool size: {}",
                options.max_connections
            ))
        })?;
        let pool_opts = PoolOpts::default()
            .with_constraints(constraints)
            .with_reset_connection(false);

        let opts: Opts = OptsBuilder::default()
            .ip_or_hostname(options.host.clone())
            .tcp_port(options.port)
            .db_name(options.database.clone())
            .user(options.user.clone())
            .pass(options.password.clone())
            .pool_opts(pool_opts)
            .into();

        let runtime = Handle::try_current().map_err(|e| {
            DbscopeError::Connection(format!("MySQL driver requires a Tokio runtime: {}", e))
        })?;
        let pool = Pool::new(opts.clone());
        let first_conn = pool.get_conn();
        let conn = match options.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, first_conn).await.map_err(|_| {
                DbscopeError::Timeout(format!("connecting to MySQL took longer than {:?}", limit))
            })?,
            None => first_conn.await,
        }
        .map_err(|e| DbscopeError::Connection(format!("Failed to connect to MySQL: {}", e)))?;
        drop(conn);

        tracing::info!(
            host = %options.host,
            port = options.port,
            database = ?options.database,
            "MySQL connection established"
        );
        Ok(Self {
            pool,
            opts,
            runtime,
            database_name: options.database.clone(),
            closed: AtomicBool::new(false),
            query_timeout: options.query_timeout,
        })
    }

    /// Database selected at connect time, if any
    pub fn default_database(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    async fn get_conn(&self) -> Result<Conn> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbscopeError::Connection("MySQL connection is closed".into()));
        }
        self.pool
            .get_conn()
            .await
            .map_err(|e| DbscopeError::Connection(format!("Failed to get MySQL connection: {}", e)))
    }

    /// Run one statement on a pooled connection.
    ///
    /// With a ticket, a `KILL QUERY` handle for the connection is attached
    /// before the statement is sent. With `read_only`, the statement runs in
    /// a read-only transaction that is always rolled back.
    async fn execute(
        &self,
        sql: &str,
        params: &[Value],
        ticket: Option<&QueryTicket>,
        read_only: bool,
    ) -> Result<QueryResult> {
        let start_time = Instant::now();
        let final_sql = bind_literals(sql, params)?;
        let conn = self.get_conn().await?;
        let connection_id = conn.id();
        let parked: ParkedConn = Arc::new(Mutex::new(Some(conn)));
        let mut slot = Arc::clone(&parked).lock_owned().await;

        if let Some(ticket) = ticket {
            ticket.attach(Box::new(MySqlKillQuery {
                opts: self.opts.clone(),
                connection_id,
                parked: Arc::clone(&parked),
                runtime: self.runtime.clone(),
            }));
        }

        let conn = slot
            .as_mut()
            .ok_or_else(|| DbscopeError::Connection("MySQL connection was released".into()))?;
        let (columns, rows) = if read_only {
            let mut tx = conn
                .start_transaction(TxOpts::default().with_readonly(true).clone())
                .await
                .map_err(|e| {
                    DbscopeError::Query(format!("Failed to start read-only transaction: {}", e))
                })?;
            let outcome = read_result(&mut tx, final_sql).await;
            let ended = tx.rollback().await;
            let outcome = outcome?;
            ended.map_err(|e| {
                DbscopeError::Query(format!("Failed to end read-only transaction: {}", e))
            })?;
            outcome
        } else {
            read_result(conn, final_sql).await?
        };
        drop(slot.take());

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
}

/// Prepare and run `sql`, reading every row of its result
async fn read_result<Q: Queryable>(
    queryable: &mut Q,
    sql: String,
) -> Result<(Vec<ColumnMeta>, Vec<Row>)> {
    let mut result = queryable
        .exec_iter(sql, ())
        .await
        .map_err(|e| DbscopeError::Query(format!("Failed to execute query: {}", e)))?;

    // Column metadata is known before any row arrives, so empty results
    // still report their columns.
    let mysql_columns = result.columns().unwrap_or_else(|| Arc::from(Vec::new()));
    let columns: Vec<ColumnMeta> = mysql_columns
        .iter()
        .enumerate()
        .map(|(ordinal, col)| {
            ColumnMeta::new(col.name_str(), format!("{:?}", col.column_type()), ordinal)
        })
        .collect();
    let names: Arc<[String]> = columns.iter().map(|c| c.name.clone()).collect();

    let mut rows = Vec::new();
    while let Some(mut mysql_row) = result
        .next()
        .await
        .map_err(|e| DbscopeError::Query(format!("Failed to read row: {}", e)))?
    {
        let values = mysql_columns
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let raw = mysql_row
                    .take::<mysql_async::Value, _>(idx)
                    .unwrap_or(mysql_async::Value::NULL);
                mysql_value_to_value(raw, col.column_type())
            })
            .collect();
        rows.push(Row::new(Arc::clone(&names), values));
    }
    result
        .drop_result()
        .await
        .map_err(|e| DbscopeError::Query(format!("Failed to finish query: {}", e)))?;

    Ok((columns, rows))
}

/// Convert a MySQL value to a dbscope value. Byte strings, which both
/// protocols use for text and decimals, are interpreted by column type.
fn mysql_value_to_value(val: mysql_async::Value, col_type: ColumnType) -> Value {
    match val {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => {
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => return Value::Bytes(e.into_bytes()),
            };
            match col_type {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_YEAR => text
                    .parse::<i64>()
                    .map(Value::Int64)
                    .unwrap_or(Value::Decimal(text)),
                ColumnType::MYSQL_TYPE_FLOAT => text
                    .parse::<f32>()
                    .map(Value::Float32)
                    .unwrap_or(Value::String(text)),
                ColumnType::MYSQL_TYPE_DOUBLE => text
                    .parse::<f64>()
                    .map(Value::Float64)
                    .unwrap_or(Value::String(text)),
                ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                    Value::Decimal(text)
                }
                ColumnType::MYSQL_TYPE_DATE => chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                    .map(Value::Date)
                    .unwrap_or(Value::String(text)),
                ColumnType::MYSQL_TYPE_DATETIME | ColumnType::MYSQL_TYPE_TIMESTAMP => {
                    chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
                        .map(Value::DateTime)
                        .unwrap_or(Value::String(text))
                }
                ColumnType::MYSQL_TYPE_JSON => serde_json::from_str(&text)
                    .map(Value::Json)
                    .unwrap_or(Value::String(text)),
                _ => Value::String(text),
            }
        }
        mysql_async::Value::Int(i) => Value::Int64(i),
        mysql_async::Value::UInt(u) => i64::try_from(u)
            .map(Value::Int64)
            .unwrap_or_else(|_| Value::Decimal(u.to_string())),
        mysql_async::Value::Float(f) => Value::Float32(f),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = chrono::NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32);
            match date.and_then(|d| d.and_hms_micro_opt(hour as u32, min as u32, sec as u32, micro))
            {
                Some(dt) if hour == 0 && min == 0 && sec == 0 && micro == 0 => {
                    Value::Date(dt.date())
                }
                Some(dt) => Value::DateTime(dt),
                None => Value::String(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, min, sec
                )),
            }
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            let total_hours = days * 24 + hours as u32;
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    fn driver_name(&self) -> &str {
        "mysql"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.execute(sql, params, None, false).await
    }

    async fn query_cursor_tracked(
        &self,
        sql: &str,
        params: &[Value],
        ticket: &QueryTicket,
    ) -> Result<Box<dyn RowCursor>> {
        let result = self.execute(sql, params, Some(ticket), false).await?;
        Ok(Box::new(BufferedCursor::new(result)))
    }

    #[tracing::instrument(skip(self, sql, params, ticket), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query_read_only(
        &self,
        sql: &str,
        params: &[Value],
        ticket: &QueryTicket,
    ) -> Result<Box<dyn RowCursor>> {
        let result = self.execute(sql, params, Some(ticket), true).await?;
        Ok(Box::new(BufferedCursor::new(result)))
    }

    fn default_query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing MySQL connection");
        self.closed.store(true, Ordering::SeqCst);
        self.pool
            .clone()
            .disconnect()
            .await
            .map_err(|e| DbscopeError::Connection(format!("Failed to close MySQL pool: {}", e)))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
