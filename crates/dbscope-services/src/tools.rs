//! Name-based dispatch over the database tools

use dbscope_connection::DatabaseManager;
use dbscope_schema::{SchemaCache, SchemaDocument};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{ServiceError, ServiceResult};
use crate::{QueryArgs, QueryTool, SchemaExplorer, SchemaExplorerArgs};

pub const SCHEMA_TOOL: &str = "dbSchema";
pub const QUERY_TOOL: &str = "dbQuery";

/// Name, description and JSON input schema of one tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Both tools over one set of databases and one schema cache
pub struct DatabaseTools {
    schema: SchemaExplorer,
    query: QueryTool,
}

impl DatabaseTools {
    pub fn new(databases: Arc<DatabaseManager>, cache: Arc<SchemaCache<SchemaDocument>>) -> Self {
        Self {
            schema: SchemaExplorer::new(Arc::clone(&databases), cache),
            query: QueryTool::new(databases),
        }
    }

    pub fn schema_explorer(&self) -> &SchemaExplorer {
        &self.schema
    }

    pub fn query_tool(&self) -> &QueryTool {
        &self.query
    }

    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: SCHEMA_TOOL,
                description: "Auto-discover database structure and relationships",
                input_schema: input_schema::<SchemaExplorerArgs>(),
            },
            ToolDefinition {
                name: QUERY_TOOL,
                description: "Execute a read-only SQL query",
                input_schema: input_schema::<QueryArgs>(),
            },
        ]
    }

    /// Run the tool `name` with JSON arguments and return its JSON result
    pub async fn call(
        &self,
        name: &str,
        arguments: serde_json::Value,
        token: CancellationToken,
    ) -> ServiceResult<serde_json::Value> {
        match name {
            SCHEMA_TOOL => {
                let output = self
                    .schema
                    .call_with_cancellation(parse_args(arguments)?, token)
                    .await?;
                to_json(&output)
            }
            QUERY_TOOL => {
                let output = self
                    .query
                    .call_with_cancellation(parse_args(arguments)?, token)
                    .await?;
                to_json(&output)
            }
            other => Err(ServiceError::UnknownTool(other.to_string())),
        }
    }
}

fn input_schema<T: schemars::JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

fn parse_args<T: DeserializeOwned>(arguments: serde_json::Value) -> ServiceResult<T> {
    let arguments = match arguments {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| ServiceError::InvalidArguments(e.to_string()))
}

fn to_json<T: Serialize>(output: &T) -> ServiceResult<serde_json::Value> {
    Ok(serde_json::to_value(output)?)
}
