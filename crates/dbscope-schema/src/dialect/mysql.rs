//! MySQL candidates, restricted to the current database

use super::{CandidateList, IntrospectionStrategy, QueryCandidate, bind_table, table_filter};
use crate::ColumnInfo;

const FOREIGN_KEYS_CONSTRAINTS: &str = "
    SELECT
        tc.table_schema AS table_schema,
        tc.constraint_name AS constraint_name,
        tc.table_name AS table_name,
        kcu.column_name AS column_name,
        kcu.referenced_table_schema AS foreign_table_schema,
        kcu.referenced_table_name AS foreign_table_name,
        kcu.referenced_column_name AS foreign_column_name
    FROM information_schema.table_constraints AS tc
    JOIN information_schema.key_column_usage AS kcu
        ON tc.constraint_name = kcu.constraint_name
        AND tc.table_schema = kcu.table_schema
    WHERE tc.constraint_type = 'FOREIGN KEY'
        AND tc.table_schema = DATABASE()";

const FOREIGN_KEYS_KEY_USAGE: &str = "
    SELECT
        kcu.constraint_schema AS table_schema,
        kcu.constraint_name AS constraint_name,
        kcu.table_name AS table_name,
        kcu.column_name AS column_name,
        kcu.referenced_table_schema AS foreign_table_schema,
        kcu.referenced_table_name AS foreign_table_name,
        kcu.referenced_column_name AS foreign_column_name
    FROM information_schema.key_column_usage kcu
    WHERE kcu.referenced_table_name IS NOT NULL
        AND kcu.constraint_schema = DATABASE()";

const ENUM_COLUMNS: &str = "
    SELECT
        c.table_name AS table_name,
        c.column_name AS enum_name,
        c.column_type AS enum_definition
    FROM information_schema.columns c
    WHERE c.table_schema = DATABASE()
        AND c.column_type LIKE 'enum(%'
    ORDER BY c.table_name, c.column_name";

/// MySQL information_schema and SHOW queries
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl IntrospectionStrategy for MySqlDialect {
    fn tables_queries(&self) -> CandidateList {
        CandidateList::from(vec![
            QueryCandidate::new(
                "SELECT table_name AS table_name FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
            ),
            QueryCandidate::new("SHOW TABLES"),
        ])
    }

    fn columns_queries(&self, table: &str) -> CandidateList {
        CandidateList::from(vec![
            QueryCandidate::new(
                "
                SELECT
                    column_name AS column_name,
                    data_type AS data_type,
                    is_nullable AS is_nullable,
                    column_default AS column_default
                FROM information_schema.columns
                WHERE table_name = ? AND table_schema = DATABASE()
                ORDER BY ordinal_position",
            )
            .bind("table", table),
            QueryCandidate::new(format!("SHOW COLUMNS FROM {}", quote_identifier(table))),
        ])
    }

    fn relationships_queries(&self, table: &str) -> CandidateList {
        if table.is_empty() {
            return CandidateList::from(vec![
                QueryCandidate::new(FOREIGN_KEYS_CONSTRAINTS),
                QueryCandidate::new(FOREIGN_KEYS_KEY_USAGE),
            ]);
        }
        CandidateList::from(vec![
            QueryCandidate::new(format!(
                "{FOREIGN_KEYS_CONSTRAINTS}\n        AND (tc.table_name = ? OR kcu.referenced_table_name = ?)"
            ))
            .bind("table", table)
            .bind("referenced_table", table),
            QueryCandidate::new(format!(
                "{FOREIGN_KEYS_KEY_USAGE}\n        AND (kcu.table_name = ? OR kcu.referenced_table_name = ?)"
            ))
            .bind("table", table)
            .bind("referenced_table", table),
        ])
    }

    fn primary_keys_queries(&self, table: &str) -> CandidateList {
        let (filter, order) = table_filter(table, "tc.table_name", "?", "tc.table_name, ");
        let candidate = QueryCandidate::new(format!(
            "
            SELECT
                tc.table_name AS table_name,
                kcu.column_name AS column_name,
                tc.constraint_name AS constraint_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
                AND tc.table_name = kcu.table_name
            WHERE tc.constraint_type = 'PRIMARY KEY'
                AND tc.table_schema = DATABASE(){filter}
            ORDER BY {order}kcu.ordinal_position"
        ));
        CandidateList::from(vec![bind_table(candidate, table)])
    }

    fn indexes_queries(&self, table: &str) -> CandidateList {
        let (filter, order) = table_filter(table, "table_name", "?", "table_name, ");
        let candidate = QueryCandidate::new(format!(
            "
            SELECT
                table_name AS table_name,
                index_name AS index_name,
                GROUP_CONCAT(column_name ORDER BY seq_in_index) AS column_names,
                non_unique AS non_unique
            FROM information_schema.statistics
            WHERE table_schema = DATABASE(){filter}
            GROUP BY table_name, index_name, non_unique
            ORDER BY {order}index_name"
        ));
        CandidateList::from(vec![bind_table(candidate, table)])
    }

    fn enum_values_queries(&self) -> CandidateList {
        CandidateList::from(vec![QueryCandidate::new(ENUM_COLUMNS)])
    }

    fn unique_constraints_queries(&self, table: &str) -> CandidateList {
        let (filter, order) = table_filter(table, "tc.table_name", "?", "tc.table_name, ");
        let candidate = QueryCandidate::new(format!(
            "
            SELECT
                tc.table_name AS table_name,
                tc.constraint_name AS constraint_name,
                tc.constraint_type AS constraint_type,
                GROUP_CONCAT(kcu.column_name ORDER BY kcu.ordinal_position) AS column_names
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
                AND tc.table_name = kcu.table_name
            WHERE tc.constraint_type IN ('UNIQUE', 'PRIMARY KEY')
                AND tc.table_schema = DATABASE(){filter}
            GROUP BY tc.table_name, tc.constraint_name, tc.constraint_type
            ORDER BY {order}tc.constraint_name"
        ));
        CandidateList::from(vec![bind_table(candidate, table)])
    }

    fn table_stats_queries(&self, table: &str) -> CandidateList {
        let (filter, _) = table_filter(table, "table_name", "?", "");
        let candidate = QueryCandidate::new(format!(
            "
            SELECT
                table_schema AS table_schema,
                table_name AS table_name,
                table_rows AS row_count_estimate,
                data_length AS data_length,
                index_length AS index_length,
                data_free AS data_free,
                create_time AS create_time,
                update_time AS update_time
            FROM information_schema.tables
            WHERE table_schema = DATABASE(){filter}
            ORDER BY table_name"
        ));
        CandidateList::from(vec![bind_table(candidate, table)])
    }

    fn enum_keys(&self, table: &str, column: &ColumnInfo) -> Vec<String> {
        let declared = column.data_type.trim().to_ascii_lowercase();
        if declared == "enum" || declared.starts_with("enum(") {
            vec![format!("{}.{}", table, column.column_name)]
        } else {
            Vec::new()
        }
    }
}

/// Backtick-quote an identifier for statements that take no parameters
fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
