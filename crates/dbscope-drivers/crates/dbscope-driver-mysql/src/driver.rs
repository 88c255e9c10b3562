//! MySQL driver implementation

use async_trait::async_trait;
use dbscope_core::{Connection, ConnectionConfig, DatabaseDriver, DbscopeError, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::MySqlConnection;

const DEFAULT_PORT: u16 = 3306;
const DEFAULT_MAX_CONNECTIONS: usize = 4;

/// Resolved connection settings for one MySQL database
#[derive(Debug, Clone, PartialEq)]
pub struct MySqlConnectOptions {
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub max_connections: usize,
    pub connect_timeout: Option<Duration>,
    pub query_timeout: Option<Duration>,
}

impl MySqlConnectOptions {
    /// Read settings from a generic connection configuration.
    ///
    /// Recognized params: `max_connections` and `connect_timeout` (seconds).
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        let number = |key: &str| -> Result<Option<u64>> {
            config
                .get_string(key)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|_| {
                        DbscopeError::Configuration(format!("invalid {}: {}", key, raw))
                    })
                })
                .transpose()
        };

        Ok(Self {
            host: config
                .get_string("host")
                .unwrap_or_else(|| "localhost".to_string()),
            port: config.port_or(DEFAULT_PORT),
            database: config.get_string("database"),
            user: config.get_string("user"),
            password: config.get_string("password"),
            max_connections: number("max_connections")?
                .map(|n| n as usize)
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            connect_timeout: number("connect_timeout")?.map(Duration::from_secs),
            query_timeout: config.query_timeout,
        })
    }
}

/// MySQL database driver
pub struct MySqlDriver;

impl MySqlDriver {
    /// Create a new MySQL driver instance
    pub fn new() -> Self {
        tracing::debug!("MySQL driver initialized");
        Self
    }
}

impl Default for MySqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for MySqlDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn display_name(&self) -> &'static str {
        "MySQL"
    }

    fn default_port(&self) -> Option<u16> {
        Some(DEFAULT_PORT)
    }

    #[tracing::instrument(skip(self, config), fields(database_id = %config.id))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let options = MySqlConnectOptions::from_config(config)?;
        let conn = MySqlConnection::connect(&options).await.map_err(|e| {
            tracing::error!(error = %e, "failed to connect to MySQL database");
            e
        })?;
        Ok(Arc::new(conn))
    }
}
