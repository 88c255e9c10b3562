//! Schema explorer tool
//!
//! Answers `tables`, `columns`, `relationships` and `full` requests for one
//! configured database. Full schemas are cached per database id.

use dbscope_connection::DatabaseManager;
use dbscope_schema::{
    ColumnInfo, ForeignKey, IntrospectionContext, SchemaAssembler, SchemaCache, SchemaDocument,
    TableInfo,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{ServiceError, ServiceResult};

/// Timeout applied when the caller gives none
pub const DEFAULT_SCHEMA_TIMEOUT_MS: u64 = 10_000;

/// Arguments of the `dbSchema` tool
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SchemaExplorerArgs {
    /// Schema component to explore: tables, columns, relationships or full
    pub component: Option<String>,
    /// Table name, required for the columns component
    pub table: Option<String>,
    /// Query timeout in milliseconds (default: 10000)
    pub timeout: Option<u64>,
    /// Database ID to use
    pub database: Option<String>,
}

impl SchemaExplorerArgs {
    pub fn new(database: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            component: Some(component.into()),
            database: Some(database.into()),
            ..Default::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }
}

/// Which part of the schema to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaComponent {
    Tables,
    Columns,
    Relationships,
    Full,
}

impl FromStr for SchemaComponent {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tables" => Ok(Self::Tables),
            "columns" => Ok(Self::Columns),
            "relationships" => Ok(Self::Relationships),
            "full" => Ok(Self::Full),
            other => Err(ServiceError::InvalidComponent(other.to_string())),
        }
    }
}

/// Result of a `dbSchema` call; the JSON shape depends on the component
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SchemaOutput {
    Tables {
        tables: Vec<TableInfo>,
        #[serde(rename = "dbType")]
        db_type: String,
    },
    Columns {
        table: String,
        columns: Vec<ColumnInfo>,
        #[serde(rename = "dbType")]
        db_type: String,
    },
    Relationships {
        relationships: Vec<ForeignKey>,
        #[serde(rename = "dbType")]
        db_type: String,
        table: String,
    },
    Full(SchemaDocument),
}

/// The `dbSchema` tool
pub struct SchemaExplorer {
    databases: Arc<DatabaseManager>,
    cache: Arc<SchemaCache<SchemaDocument>>,
}

impl SchemaExplorer {
    pub fn new(databases: Arc<DatabaseManager>, cache: Arc<SchemaCache<SchemaDocument>>) -> Self {
        Self { databases, cache }
    }

    pub fn cache(&self) -> &Arc<SchemaCache<SchemaDocument>> {
        &self.cache
    }

    /// Forget the cached full schema of one database
    pub fn invalidate(&self, database: &str) -> bool {
        self.cache.invalidate(database)
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub async fn call(&self, args: SchemaExplorerArgs) -> ServiceResult<SchemaOutput> {
        self.call_with_cancellation(args, CancellationToken::new())
            .await
    }

    /// Run one call, stopping early when `token` is cancelled
    #[tracing::instrument(
        skip(self, args, token),
        fields(component = ?args.component, database = ?args.database, table = ?args.table)
    )]
    pub async fn call_with_cancellation(
        &self,
        args: SchemaExplorerArgs,
        token: CancellationToken,
    ) -> ServiceResult<SchemaOutput> {
        let component = required(args.component.as_deref(), "component")?;
        let database = required(args.database.as_deref(), "database")?;
        let conn = self
            .databases
            .get(database)
            .map_err(ServiceError::DatabaseNotFound)?;
        let component = component.parse::<SchemaComponent>()?;

        let timeout_ms = args
            .timeout
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_SCHEMA_TIMEOUT_MS);
        let ctx = IntrospectionContext::with_timeout(Duration::from_millis(timeout_ms))
            .with_cancellation(token);
        let assembler = SchemaAssembler::new(conn, ctx);
        let db_type = assembler.db_type().to_string();
        let table = args.table.unwrap_or_default();

        let interrupted = move |e| ServiceError::from_schema(e, timeout_ms);

        let output = match component {
            SchemaComponent::Tables => SchemaOutput::Tables {
                tables: assembler.tables().await.map_err(interrupted)?,
                db_type,
            },
            SchemaComponent::Columns => SchemaOutput::Columns {
                columns: assembler.columns(&table).await.map_err(interrupted)?,
                table,
                db_type,
            },
            SchemaComponent::Relationships => SchemaOutput::Relationships {
                relationships: assembler.relationships(&table).await.map_err(interrupted)?,
                db_type,
                table,
            },
            SchemaComponent::Full => {
                if let Some(schema) = self.cache.get(database) {
                    return Ok(SchemaOutput::Full(schema));
                }
                let schema = assembler.full_schema().await.map_err(interrupted)?;
                self.cache.set(database, schema.clone());
                SchemaOutput::Full(schema)
            }
        };
        Ok(output)
    }
}

pub(crate) fn required<'a>(value: Option<&'a str>, name: &'static str) -> ServiceResult<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ServiceError::MissingParameter(name))
}
