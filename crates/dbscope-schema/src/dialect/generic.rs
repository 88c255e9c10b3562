//! Fallback dialect for unrecognized drivers

use super::{CandidateList, IntrospectionStrategy, MySqlDialect, PostgresDialect};
use crate::ColumnInfo;

/// Tries every PostgreSQL candidate, then every MySQL candidate
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericDialect;

impl IntrospectionStrategy for GenericDialect {
    fn tables_queries(&self) -> CandidateList {
        PostgresDialect
            .tables_queries()
            .chain(MySqlDialect.tables_queries())
    }

    fn columns_queries(&self, table: &str) -> CandidateList {
        PostgresDialect
            .columns_queries(table)
            .chain(MySqlDialect.columns_queries(table))
    }

    fn relationships_queries(&self, table: &str) -> CandidateList {
        PostgresDialect
            .relationships_queries(table)
            .chain(MySqlDialect.relationships_queries(table))
    }

    fn primary_keys_queries(&self, table: &str) -> CandidateList {
        PostgresDialect
            .primary_keys_queries(table)
            .chain(MySqlDialect.primary_keys_queries(table))
    }

    fn indexes_queries(&self, table: &str) -> CandidateList {
        PostgresDialect
            .indexes_queries(table)
            .chain(MySqlDialect.indexes_queries(table))
    }

    fn enum_values_queries(&self) -> CandidateList {
        PostgresDialect
            .enum_values_queries()
            .chain(MySqlDialect.enum_values_queries())
    }

    fn unique_constraints_queries(&self, table: &str) -> CandidateList {
        PostgresDialect
            .unique_constraints_queries(table)
            .chain(MySqlDialect.unique_constraints_queries(table))
    }

    fn table_stats_queries(&self, table: &str) -> CandidateList {
        PostgresDialect
            .table_stats_queries(table)
            .chain(MySqlDialect.table_stats_queries(table))
    }

    fn enum_keys(&self, table: &str, column: &ColumnInfo) -> Vec<String> {
        let mut keys = PostgresDialect.enum_keys(table, column);
        keys.extend(MySqlDialect.enum_keys(table, column));
        keys
    }
}
