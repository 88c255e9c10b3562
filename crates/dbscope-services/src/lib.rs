//! dbscope tool layer
//!
//! Tool entry points that sit between the agent-facing transport and the
//! introspection engine.
//!
//! ```text
//! Transport / CLI (dbscope-cli)
//!     ↓
//! Tool layer (dbscope-services) ← This crate
//!     ↓
//! Introspection (dbscope-schema), databases (dbscope-connection)
//!     ↓
//! Infrastructure (dbscope-core, dbscope-drivers)
//! ```
//!
//! # Tools
//!
//! - [`SchemaExplorer`] - `dbSchema`: tables, columns, relationships and the
//!   full schema document, with caching
//! - [`QueryTool`] - `dbQuery`: read-only statements
//!
//! Every call validates its arguments before touching a database and runs
//! under its own timeout.

mod error;
mod query_tool;
mod schema_explorer;
mod tools;

pub use error::{ServiceError, ServiceResult};
pub use query_tool::{DEFAULT_QUERY_TIMEOUT_MS, QueryArgs, QueryOutput, QueryTool};
pub use schema_explorer::{
    DEFAULT_SCHEMA_TIMEOUT_MS, SchemaComponent, SchemaExplorer, SchemaExplorerArgs, SchemaOutput,
};
pub use tools::{DatabaseTools, QUERY_TOOL, SCHEMA_TOOL, ToolDefinition};
