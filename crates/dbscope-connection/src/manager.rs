//! Database manager for configured databases and their live connections

use dbscope_core::{Connection, DbscopeError, Result};
use dbscope_drivers::DriverRegistry;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::{DatabaseConnectionConfig, MultiDbConfig};

/// Manages configured databases and the connections opened for them
pub struct DatabaseManager {
    /// Driver registry
    drivers: DriverRegistry,

    /// Configured databases, in file order
    configs: RwLock<IndexMap<String, DatabaseConnectionConfig>>,

    /// Active connections keyed by database id
    active: RwLock<HashMap<String, Arc<dyn Connection>>>,
}

impl DatabaseManager {
    /// Create a manager with all built-in drivers
    pub fn new() -> Self {
        Self::with_registry(DriverRegistry::with_defaults())
    }

    /// Create a manager backed by a specific driver registry
    pub fn with_registry(drivers: DriverRegistry) -> Self {
        Self {
            drivers,
            configs: RwLock::new(IndexMap::new()),
            active: RwLock::new(HashMap::new()),
        }
    }

    /// Get the driver registry
    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    /// Load database definitions from a JSON document.
    ///
    /// Definitions replace earlier ones with the same id. Returns the number
    /// of databases read.
    pub fn load_config(&self, json: &str) -> Result<usize> {
        let parsed = MultiDbConfig::from_json(json)?;
        Ok(self.add_configs(parsed))
    }

    /// Load database definitions from a JSON file
    pub async fn load_config_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let parsed = MultiDbConfig::load(path).await?;
        Ok(self.add_configs(parsed))
    }

    fn add_configs(&self, parsed: MultiDbConfig) -> usize {
        let count = parsed.connections.len();
        let mut configs = self.configs.write();
        for config in parsed.connections {
            configs.insert(config.id.clone(), config);
        }
        tracing::info!(databases = count, "loaded database configuration");
        count
    }

    /// Connect every configured database that is not connected yet.
    ///
    /// Individual failures are logged and skipped; the call fails only when
    /// no database could be connected. Returns the number of connected
    /// databases.
    pub async fn connect_all(&self) -> Result<usize> {
        let pending: Vec<DatabaseConnectionConfig> = {
            let active = self.active.read();
            self.configs
                .read()
                .values()
                .filter(|config| !active.contains_key(&config.id))
                .cloned()
                .collect()
        };

        let total = self.configs.read().len();
        for config in &pending {
            if let Err(e) = self.connect_config(config).await {
                tracing::warn!(
                    database_id = %config.id,
                    error = %e,
                    "failed to connect to database"
                );
            }
        }

        let connected = self.active.read().len();
        tracing::info!(
            connected,
            configured = total,
            "connected to {} out of {} configured databases",
            connected,
            total
        );
        if connected == 0 {
            return Err(DbscopeError::Connection(format!(
                "failed to connect to any databases: all {} connection attempts failed",
                pending.len()
            )));
        }
        Ok(connected)
    }

    /// Connect a single configured database, reusing a live connection
    pub async fn connect(&self, id: &str) -> Result<Arc<dyn Connection>> {
        if let Some(conn) = self.active.read().get(id).filter(|c| !c.is_closed()) {
            return Ok(Arc::clone(conn));
        }
        let config = self.config(id).ok_or_else(|| not_found(id))?;
        self.connect_config(&config).await
    }

    #[tracing::instrument(skip(self, config), fields(database_id = %config.id, db_type = %config.db_type))]
    async fn connect_config(&self, config: &DatabaseConnectionConfig) -> Result<Arc<dyn Connection>> {
        tracing::info!("connecting to configured database");
        let driver_name = config.driver_name();
        let driver = self
            .drivers
            .get(&driver_name)
            .ok_or_else(|| DbscopeError::Driver(format!("Unknown driver: {}", driver_name)))?;

        let conn = driver
            .connect(&config.to_connection_config())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to connect");
                e
            })?;

        self.active
            .write()
            .insert(config.id.clone(), Arc::clone(&conn));
        tracing::info!("database connected");
        Ok(conn)
    }

    /// Register an already open connection under a database id
    pub fn register_connection(&self, id: &str, conn: Arc<dyn Connection>) {
        tracing::debug!(database_id = %id, "registering connection");
        self.active.write().insert(id.to_string(), conn);
    }

    /// Get the live connection for a database id
    pub fn get(&self, id: &str) -> Result<Arc<dyn Connection>> {
        let conn = self.active.read().get(id).cloned();
        conn.ok_or_else(|| {
            tracing::debug!(database_id = %id, "database connection not found");
            not_found(id)
        })
    }

    /// Database kind of a connected database, as reported by its driver
    pub fn database_type(&self, id: &str) -> Result<String> {
        Ok(self.get(id)?.driver_name().to_string())
    }

    /// Configuration of a database id
    pub fn config(&self, id: &str) -> Option<DatabaseConnectionConfig> {
        self.configs.read().get(id).cloned()
    }

    /// All configured database ids, in configuration order
    pub fn list_databases(&self) -> Vec<String> {
        self.configs.read().keys().cloned().collect()
    }

    /// Ids of databases with a live connection, sorted
    pub fn connected_databases(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.read().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Close and forget the connection for one database
    pub async fn close(&self, id: &str) -> Result<()> {
        let conn = self.active.write().remove(id);
        match conn {
            Some(conn) => {
                tracing::info!(database_id = %id, "closing database connection");
                conn.close().await
            }
            None => Err(not_found(id)),
        }
    }

    /// Close all connections; the first failure is reported after every
    /// connection has been attempted
    pub async fn close_all(&self) -> Result<()> {
        let drained: Vec<(String, Arc<dyn Connection>)> = self.active.write().drain().collect();
        let mut first_error = None;
        for (id, conn) in drained {
            if let Err(e) = conn.close().await {
                tracing::warn!(database_id = %id, error = %e, "failed to close connection");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for DatabaseManager {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: &str) -> DbscopeError {
    DbscopeError::NotFound(format!("database connection {} not found", id))
}
