//! PostgreSQL driver implementation

use async_trait::async_trait;
use dbscope_core::{
    Connection, ConnectionConfig, DatabaseDriver, DbscopeError, Result, TlsConfig, TlsMode,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::PostgresConnection;

const DEFAULT_PORT: u16 = 5432;

/// Resolved connection settings for one PostgreSQL database
#[derive(Debug, Clone, PartialEq)]
pub struct PostgresConnectOptions {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub application_name: Option<String>,
    pub connect_timeout: Option<Duration>,
    pub query_timeout: Option<Duration>,
    pub tls: TlsConfig,
}

impl PostgresConnectOptions {
    /// Read settings from a generic connection configuration.
    ///
    /// Recognized params: `ssl_mode`, `ssl_root_cert`, `ssl_cert`, `ssl_key`,
    /// `application_name` and `connect_timeout` (seconds).
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        let mode = match config.get_string("ssl_mode") {
            Some(mode) => mode.parse::<TlsMode>()?,
            None => TlsMode::default(),
        };
        let path = |key: &str| config.get_string(key).filter(|p| !p.is_empty()).map(PathBuf::from);
        let tls = TlsConfig {
            mode,
            ca_cert: path("ssl_root_cert"),
            client_cert: path("ssl_cert"),
            client_key: path("ssl_key"),
        };
        tls.validate()?;

        let connect_timeout = config
            .get_string("connect_timeout")
            .map(|raw| {
                raw.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
                    DbscopeError::Configuration(format!("invalid connect_timeout: {}", raw))
                })
            })
            .transpose()?;

        Ok(Self {
            host: config
                .get_string("host")
                .unwrap_or_else(|| "localhost".to_string()),
            port: config.port_or(DEFAULT_PORT),
            database: config
                .get_string("database")
                .unwrap_or_else(|| "postgres".to_string()),
            user: config.get_string("user"),
            password: config.get_string("password"),
            application_name: config.get_string("application_name"),
            connect_timeout,
            query_timeout: config.query_timeout,
            tls,
        })
    }
}

/// PostgreSQL database driver
pub struct PostgresDriver;

impl PostgresDriver {
    /// Create a new PostgreSQL driver instance
    pub fn new() -> Self {
        tracing::debug!("PostgreSQL driver initialized");
        Self
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn display_name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn default_port(&self) -> Option<u16> {
        Some(DEFAULT_PORT)
    }

    #[tracing::instrument(skip(self, config), fields(database_id = %config.id))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let options = PostgresConnectOptions::from_config(config)?;
        let conn = PostgresConnection::connect(&options).await.map_err(|e| {
            tracing::error!(error = %e, "failed to connect to PostgreSQL database");
            e
        })?;
        Ok(Arc::new(conn))
    }
}
