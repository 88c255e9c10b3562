//! PostgreSQL candidates, restricted to the `public` schema

use super::{CandidateList, IntrospectionStrategy, QueryCandidate, bind_table, table_filter};
use crate::ColumnInfo;

/// Declared type PostgreSQL reports for enum and other user-defined types
pub const USER_DEFINED: &str = "USER-DEFINED";

const FOREIGN_KEYS_INFORMATION_SCHEMA: &str = "
    SELECT
        tc.table_schema,
        tc.constraint_name,
        tc.table_name,
        kcu.column_name,
        ccu.table_schema AS foreign_table_schema,
        ccu.table_name AS foreign_table_name,
        ccu.column_name AS foreign_column_name
    FROM information_schema.table_constraints AS tc
    JOIN information_schema.key_column_usage AS kcu
        ON tc.constraint_name = kcu.constraint_name
        AND tc.table_schema = kcu.table_schema
    JOIN information_schema.constraint_column_usage AS ccu
        ON ccu.constraint_name = tc.constraint_name
        AND ccu.table_schema = tc.table_schema
    WHERE tc.constraint_type = 'FOREIGN KEY'
        AND tc.table_schema = 'public'";

const FOREIGN_KEYS_CATALOG: &str = "
    SELECT
        ns.nspname AS table_schema,
        c.conname AS constraint_name,
        cl.relname AS table_name,
        att.attname AS column_name,
        ns2.nspname AS foreign_table_schema,
        cl2.relname AS foreign_table_name,
        att2.attname AS foreign_column_name
    FROM pg_catalog.pg_constraint c
    JOIN pg_catalog.pg_class cl ON c.conrelid = cl.oid
    JOIN pg_catalog.pg_attribute att ON att.attrelid = cl.oid AND att.attnum = ANY(c.conkey)
    JOIN pg_catalog.pg_namespace ns ON ns.oid = cl.relnamespace
    JOIN pg_catalog.pg_class cl2 ON c.confrelid = cl2.oid
    JOIN pg_catalog.pg_attribute att2 ON att2.attrelid = cl2.oid AND att2.attnum = ANY(c.confkey)
    JOIN pg_catalog.pg_namespace ns2 ON ns2.oid = cl2.relnamespace
    WHERE c.contype = 'f'
        AND ns.nspname = 'public'";

const ENUM_VALUES: &str = "
    SELECT
        t.typname AS enum_name,
        n.nspname AS schema_name,
        e.enumlabel AS enum_value,
        e.enumsortorder AS sort_order
    FROM pg_catalog.pg_type t
    JOIN pg_catalog.pg_enum e ON t.oid = e.enumtypid
    JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
    WHERE n.nspname = 'public'
    ORDER BY t.typname, e.enumsortorder";

const TABLE_STATS: &str = "
    SELECT
        schemaname,
        relname AS table_name,
        n_live_tup AS row_count_estimate,
        n_dead_tup AS dead_tuples,
        last_vacuum,
        last_autovacuum,
        last_analyze,
        last_autoanalyze
    FROM pg_catalog.pg_stat_user_tables
    WHERE schemaname = 'public'";

/// PostgreSQL catalog and information_schema queries
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl IntrospectionStrategy for PostgresDialect {
    fn tables_queries(&self) -> CandidateList {
        CandidateList::from(vec![
            QueryCandidate::new(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
            ),
            QueryCandidate::new(
                "SELECT tablename AS table_name FROM pg_catalog.pg_tables \
                 WHERE schemaname = 'public' ORDER BY tablename",
            ),
            QueryCandidate::new(
                "SELECT relname AS table_name FROM pg_catalog.pg_class \
                 WHERE relkind = 'r' AND relnamespace = \
                 (SELECT oid FROM pg_catalog.pg_namespace WHERE nspname = 'public') \
                 ORDER BY relname",
            ),
        ])
    }

    fn columns_queries(&self, table: &str) -> CandidateList {
        CandidateList::from(vec![
            QueryCandidate::new(
                "
                SELECT
                    column_name,
                    data_type,
                    udt_name,
                    CASE WHEN is_nullable = 'YES' THEN 'YES' ELSE 'NO' END AS is_nullable,
                    column_default
                FROM information_schema.columns
                WHERE table_name = $1 AND table_schema = 'public'
                ORDER BY ordinal_position",
            )
            .bind("table", table),
            QueryCandidate::new(
                "
                SELECT
                    a.attname AS column_name,
                    pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
                    t.typname AS udt_name,
                    CASE WHEN a.attnotnull THEN 'NO' ELSE 'YES' END AS is_nullable,
                    pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS column_default
                FROM pg_catalog.pg_attribute a
                LEFT JOIN pg_catalog.pg_attrdef d ON (a.attrelid = d.adrelid AND a.attnum = d.adnum)
                LEFT JOIN pg_catalog.pg_type t ON a.atttypid = t.oid
                WHERE a.attrelid = (
                    SELECT oid FROM pg_catalog.pg_class
                    WHERE relname = $1
                        AND relnamespace = (SELECT oid FROM pg_catalog.pg_namespace WHERE nspname = 'public')
                )
                AND a.attnum > 0 AND NOT a.attisdropped
                ORDER BY a.attnum",
            )
            .bind("table", table),
        ])
    }

    fn relationships_queries(&self, table: &str) -> CandidateList {
        if table.is_empty() {
            return CandidateList::from(vec![
                QueryCandidate::new(FOREIGN_KEYS_INFORMATION_SCHEMA),
                QueryCandidate::new(FOREIGN_KEYS_CATALOG),
            ]);
        }
        CandidateList::from(vec![
            QueryCandidate::new(format!(
                "{FOREIGN_KEYS_INFORMATION_SCHEMA}\n        AND (tc.table_name = $1 OR ccu.table_name = $1)"
            ))
            .bind("table", table),
            QueryCandidate::new(format!(
                "{FOREIGN_KEYS_CATALOG}\n        AND (cl.relname = $1 OR cl2.relname = $1)"
            ))
            .bind("table", table),
        ])
    }

    fn primary_keys_queries(&self, table: &str) -> CandidateList {
        let (filter, order) = table_filter(table, "tc.table_name", "$1", "tc.table_name, ");
        let candidate = QueryCandidate::new(format!(
            "
            SELECT
                tc.table_name,
                kcu.column_name,
                tc.constraint_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'PRIMARY KEY'
                AND tc.table_schema = 'public'{filter}
            ORDER BY {order}kcu.ordinal_position"
        ));
        CandidateList::from(vec![bind_table(candidate, table)])
    }

    fn indexes_queries(&self, table: &str) -> CandidateList {
        let (filter, order) = table_filter(table, "tablename", "$1", "tablename, ");
        let candidate = QueryCandidate::new(format!(
            "
            SELECT
                tablename,
                indexname,
                indexdef
            FROM pg_catalog.pg_indexes
            WHERE schemaname = 'public'{filter}
            ORDER BY {order}indexname"
        ));
        CandidateList::from(vec![bind_table(candidate, table)])
    }

    fn enum_values_queries(&self) -> CandidateList {
        CandidateList::from(vec![QueryCandidate::new(ENUM_VALUES)])
    }

    fn unique_constraints_queries(&self, table: &str) -> CandidateList {
        let (filter, order) = table_filter(table, "tc.table_name", "$1", "tc.table_name, ");
        let candidate = QueryCandidate::new(format!(
            "
            SELECT
                tc.table_name,
                tc.constraint_name,
                tc.constraint_type,
                STRING_AGG(kcu.column_name, ', ' ORDER BY kcu.ordinal_position) AS column_names
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type IN ('UNIQUE', 'PRIMARY KEY')
                AND tc.table_schema = 'public'{filter}
            GROUP BY tc.table_name, tc.constraint_name, tc.constraint_type
            ORDER BY {order}tc.constraint_name"
        ));
        CandidateList::from(vec![bind_table(candidate, table)])
    }

    fn table_stats_queries(&self, table: &str) -> CandidateList {
        CandidateList::from(vec![table_stats(table)])
    }

    fn enum_keys(&self, _table: &str, column: &ColumnInfo) -> Vec<String> {
        if column.data_type == USER_DEFINED {
            return column.udt_name.iter().cloned().collect();
        }
        // The catalog fallback reports format_type() output, which is the
        // enum type name itself.
        vec![column.data_type.clone()]
    }
}

fn table_stats(table: &str) -> QueryCandidate {
    if table.is_empty() {
        return QueryCandidate::new(format!("{TABLE_STATS}\n    ORDER BY relname"));
    }
    QueryCandidate::new(format!("{TABLE_STATS}\n        AND relname = $1")).bind("table", table)
}
