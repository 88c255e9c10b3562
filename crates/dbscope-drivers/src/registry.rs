//! Driver registry for managing available database drivers

use dbscope_core::DatabaseDriver;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available database drivers, keyed by driver name
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn DatabaseDriver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Create a registry with all built-in drivers registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "postgres")]
        registry.register(Arc::new(crate::postgres::PostgresDriver::new()));
        #[cfg(feature = "mysql")]
        registry.register(Arc::new(crate::mysql::MySqlDriver::new()));

        registry
    }

    /// Register a new driver, replacing any driver with the same name
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let name = driver.name().to_string();
        tracing::info!(driver = %name, "registering database driver");
        self.drivers.insert(name, driver);
    }

    /// Get a driver by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn DatabaseDriver>> {
        let driver = self.drivers.get(name).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %name, "driver not found in registry");
        }
        driver
    }

    /// List all registered driver names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a driver is registered
    pub fn has(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dbscope_core::{Connection, ConnectionConfig, DbscopeError, Result};

    struct StubDriver;

    #[async_trait]
    impl DatabaseDriver for StubDriver {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn connect(&self, _config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
            Err(DbscopeError::NotSupported("stub driver".into()))
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = DriverRegistry::new();
        assert!(!registry.has("stub"));

        registry.register(Arc::new(StubDriver));

        assert!(registry.has("stub"));
        assert_eq!(registry.get("stub").map(|d| d.name()), Some("stub"));
        assert!(registry.get("oracle").is_none());
    }

    #[cfg(all(feature = "postgres", feature = "mysql"))]
    #[test]
    fn defaults_include_builtin_drivers() {
        let registry = DriverRegistry::with_defaults();
        assert_eq!(registry.list(), vec!["mysql", "postgres"]);
    }
}
