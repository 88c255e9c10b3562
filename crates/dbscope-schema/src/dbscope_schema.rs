//! dbscope schema - read-only schema introspection
//!
//! This crate provides:
//! - Per-dialect fallback query candidates for each schema facet
//! - Sequential fallback execution bounded by a deadline and cancellation
//! - Row normalization from driver cursors
//! - Typed schema records and the assembled schema document
//! - A TTL cache for assembled documents

mod assembler;
mod cache;
mod context;
pub mod dialect;
mod document;
mod error;
mod executor;
mod normalizer;

pub use assembler::SchemaAssembler;
pub use cache::{DEFAULT_TTL, SchemaCache, TTL_ENV_VAR, parse_ttl};
pub use context::IntrospectionContext;
pub use dialect::{CandidateList, Dialect, Facet, IntrospectionStrategy, QueryArg, QueryCandidate};
pub use document::{
    ColumnInfo, EnumCatalog, EnumRecord, ForeignKey, IndexInfo, PrimaryKey, SchemaDocument,
    TableInfo, TableSchema, TableStats, UniqueConstraint, parse_enum_definition,
};
pub use error::{SchemaError, SchemaResult};
pub use executor::{StatementError, Submission, execute_with_fallbacks, run_statement};
pub use normalizer::collect_rows;
