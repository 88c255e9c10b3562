//! Per-dialect query candidates for each schema facet
//!
//! Each dialect lists, per facet, the queries to try in order. Every query
//! is restricted to the schema the caller can see: `public` on PostgreSQL
//! and `DATABASE()` on MySQL.

mod candidate;
mod generic;
mod mysql;
mod postgres;

pub use candidate::{CandidateList, QueryArg, QueryCandidate};
pub use generic::GenericDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;

use crate::ColumnInfo;

/// One category of schema information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Tables,
    Columns,
    Relationships,
    PrimaryKeys,
    Indexes,
    EnumValues,
    UniqueConstraints,
    TableStats,
}

impl Facet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Tables => "tables",
            Facet::Columns => "columns",
            Facet::Relationships => "relationships",
            Facet::PrimaryKeys => "primary_keys",
            Facet::Indexes => "indexes",
            Facet::EnumValues => "enum_values",
            Facet::UniqueConstraints => "unique_constraints",
            Facet::TableStats => "table_stats",
        }
    }

    /// Operation label used in logs and errors, e.g. `columns(orders)`
    pub fn operation(&self, table: &str) -> String {
        if table.is_empty() {
            self.as_str().to_string()
        } else {
            format!("{}({})", self.as_str(), table)
        }
    }
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query producers for every facet of one dialect.
///
/// Table-scoped producers treat an empty table name as "all tables".
pub trait IntrospectionStrategy: Send + Sync {
    fn tables_queries(&self) -> CandidateList;
    fn columns_queries(&self, table: &str) -> CandidateList;
    fn relationships_queries(&self, table: &str) -> CandidateList;
    fn primary_keys_queries(&self, table: &str) -> CandidateList;
    fn indexes_queries(&self, table: &str) -> CandidateList;
    fn enum_values_queries(&self) -> CandidateList;
    fn unique_constraints_queries(&self, table: &str) -> CandidateList;
    fn table_stats_queries(&self, table: &str) -> CandidateList;

    /// Enum catalog keys that may hold the labels of `column`, best first
    fn enum_keys(&self, table: &str, column: &ColumnInfo) -> Vec<String>;

    /// Candidates for `facet`
    fn queries(&self, facet: Facet, table: &str) -> CandidateList {
        match facet {
            Facet::Tables => self.tables_queries(),
            Facet::Columns => self.columns_queries(table),
            Facet::Relationships => self.relationships_queries(table),
            Facet::PrimaryKeys => self.primary_keys_queries(table),
            Facet::Indexes => self.indexes_queries(table),
            Facet::EnumValues => self.enum_values_queries(),
            Facet::UniqueConstraints => self.unique_constraints_queries(table),
            Facet::TableStats => self.table_stats_queries(table),
        }
    }
}

/// The closed set of supported dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    /// Unrecognized driver: PostgreSQL-style candidates, then MySQL-style
    Generic,
}

impl Dialect {
    /// Select the dialect for a driver name
    pub fn for_driver(driver_name: &str) -> Self {
        match driver_name {
            "postgres" | "postgresql" => Dialect::Postgres,
            "mysql" => Dialect::MySql,
            other => {
                tracing::warn!(driver = %other, "unknown database driver, using generic strategy");
                Dialect::Generic
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Generic => "generic",
        }
    }

    pub fn strategy(&self) -> &'static dyn IntrospectionStrategy {
        match self {
            Dialect::Postgres => &PostgresDialect,
            Dialect::MySql => &MySqlDialect,
            Dialect::Generic => &GenericDialect,
        }
    }
}

/// `AND <column> = <placeholder>` for one table, or the leading ORDER BY
/// key for the all-tables form
fn table_filter(
    table: &str,
    column: &str,
    placeholder: &str,
    all_tables_order: &'static str,
) -> (String, &'static str) {
    if table.is_empty() {
        (String::new(), all_tables_order)
    } else {
        (format!("\n                AND {column} = {placeholder}"), "")
    }
}

fn bind_table(candidate: QueryCandidate, table: &str) -> QueryCandidate {
    if table.is_empty() {
        candidate
    } else {
        candidate.bind("table", table)
    }
}

#[cfg(test)]
mod tests;
