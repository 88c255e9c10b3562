//! Multi-database configuration file format

use dbscope_core::{ConnectionConfig, DbscopeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Database kinds accepted in the configuration file
const SUPPORTED_TYPES: &[&str] = &["postgres", "postgresql", "mysql"];

/// One configured database, as written in the JSON configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConnectionConfig {
    /// Identifier tool callers use to select this database
    pub id: String,
    /// Database kind ("postgres" or "mysql")
    #[serde(rename = "type")]
    pub db_type: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Database name
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_root_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,

    /// Connect timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u64>,
    /// Default query timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_timeout: Option<u64>,
    /// Upper bound on pooled connections (MySQL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_open_conns: Option<usize>,

    /// Extra driver parameters passed through verbatim
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl DatabaseConnectionConfig {
    /// Check required fields and the database kind
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DbscopeError::Configuration(
                "database connection ID cannot be empty".into(),
            ));
        }
        if !SUPPORTED_TYPES.contains(&self.normalized_type().as_str()) {
            return Err(DbscopeError::Configuration(format!(
                "unsupported database type for connection {}: {}",
                self.id, self.db_type
            )));
        }
        Ok(())
    }

    /// Lower-cased database kind
    pub fn normalized_type(&self) -> String {
        self.db_type.trim().to_ascii_lowercase()
    }

    /// Registry name of the driver serving this database
    pub fn driver_name(&self) -> String {
        match self.normalized_type().as_str() {
            "postgresql" => "postgres".to_string(),
            other => other.to_string(),
        }
    }

    /// Label shown to users, falling back to the identifier
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.id)
    }

    /// Build the driver-facing configuration
    pub fn to_connection_config(&self) -> ConnectionConfig {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        let mut config = ConnectionConfig::new(&self.id, &self.driver_name());
        config.host = self.host.clone();
        config.port = self.port;
        config.database = non_empty(&self.name);
        config.username = non_empty(&self.user);
        config.password = non_empty(&self.password);
        config.query_timeout = self
            .query_timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        for (key, value) in &self.options {
            config = config.with_param(key, value.as_str());
        }

        let optional = [
            ("ssl_mode", &self.ssl_mode),
            ("ssl_cert", &self.ssl_cert),
            ("ssl_key", &self.ssl_key),
            ("ssl_root_cert", &self.ssl_root_cert),
            ("application_name", &self.application_name),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                config = config.with_param(key, value);
            }
        }
        if let Some(secs) = self.connect_timeout.filter(|secs| *secs > 0) {
            config = config.with_param("connect_timeout", secs);
        }
        if let Some(max) = self.max_open_conns.filter(|max| *max > 0) {
            config = config.with_param("max_connections", max);
        }

        config
    }
}

/// Top-level configuration file: a list of databases
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiDbConfig {
    #[serde(default)]
    pub connections: Vec<DatabaseConnectionConfig>,
}

impl MultiDbConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            DbscopeError::Configuration(format!("failed to parse config JSON: {}", e))
        })?;
        for connection in &config.connections {
            connection.validate()?;
        }
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading database configuration");
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }
}
