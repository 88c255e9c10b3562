use super::*;
use dbscope_core::Value;
use pretty_assertions::assert_eq;
use rstest::rstest;

const FACETS: [Facet; 8] = [
    Facet::Tables,
    Facet::Columns,
    Facet::Relationships,
    Facet::PrimaryKeys,
    Facet::Indexes,
    Facet::EnumValues,
    Facet::UniqueConstraints,
    Facet::TableStats,
];

fn column(name: &str, data_type: &str, udt_name: Option<&str>) -> ColumnInfo {
    ColumnInfo {
        column_name: name.to_string(),
        data_type: data_type.to_string(),
        udt_name: udt_name.map(str::to_string),
        is_nullable: "YES".to_string(),
        ..Default::default()
    }
}

#[rstest]
#[case::postgres("postgres", Dialect::Postgres)]
#[case::postgresql("postgresql", Dialect::Postgres)]
#[case::mysql("mysql", Dialect::MySql)]
#[case::sqlite("sqlite", Dialect::Generic)]
#[case::empty("", Dialect::Generic)]
fn dialect_selection(#[case] driver: &str, #[case] expected: Dialect) {
    assert_eq!(Dialect::for_driver(driver), expected);
}

#[test]
fn facet_operation_labels() {
    assert_eq!(Facet::Tables.operation(""), "tables");
    assert_eq!(Facet::Columns.operation("orders"), "columns(orders)");
    assert_eq!(Facet::UniqueConstraints.to_string(), "unique_constraints");
}

#[rstest]
#[case::tables(Facet::Tables, 3)]
#[case::columns(Facet::Columns, 2)]
#[case::relationships(Facet::Relationships, 2)]
#[case::primary_keys(Facet::PrimaryKeys, 1)]
#[case::indexes(Facet::Indexes, 1)]
#[case::enum_values(Facet::EnumValues, 1)]
#[case::unique(Facet::UniqueConstraints, 1)]
#[case::stats(Facet::TableStats, 1)]
fn postgres_candidate_counts(#[case] facet: Facet, #[case] expected: usize) {
    assert_eq!(PostgresDialect.queries(facet, "orders").len(), expected);
}

#[test]
fn postgres_tables_prefer_information_schema() {
    let candidates = PostgresDialect.tables_queries();
    let sql: Vec<&str> = candidates.iter().map(|c| c.sql()).collect();

    assert!(sql[0].contains("information_schema.tables"));
    assert!(sql[1].contains("pg_catalog.pg_tables"));
    assert!(sql[2].contains("pg_catalog.pg_class"));
    assert!(candidates.iter().all(|c| c.args().is_empty()));
}

#[test]
fn postgres_columns_bind_table_name() {
    for candidate in &PostgresDialect.columns_queries("orders") {
        assert!(candidate.sql().contains("$1"));
        assert_eq!(candidate.values(), vec![Value::from("orders")]);
    }
}

#[rstest]
#[case::postgres(Dialect::Postgres)]
#[case::mysql(Dialect::MySql)]
fn empty_table_means_all_tables(#[case] dialect: Dialect) {
    let strategy = dialect.strategy();
    for facet in [
        Facet::Relationships,
        Facet::PrimaryKeys,
        Facet::Indexes,
        Facet::UniqueConstraints,
        Facet::TableStats,
    ] {
        for candidate in &strategy.queries(facet, "") {
            assert!(
                candidate.args().is_empty(),
                "{} {} binds arguments without a table",
                dialect.name(),
                facet
            );
            assert!(!candidate.sql().contains("$1"));
            assert!(!candidate.sql().contains('?'));
        }
    }
}

#[rstest]
#[case::postgres(Dialect::Postgres)]
#[case::mysql(Dialect::MySql)]
fn table_scoped_facets_bind_the_table(#[case] dialect: Dialect) {
    let strategy = dialect.strategy();
    for facet in [
        Facet::PrimaryKeys,
        Facet::Indexes,
        Facet::UniqueConstraints,
        Facet::TableStats,
    ] {
        for candidate in &strategy.queries(facet, "orders") {
            assert_eq!(candidate.values(), vec![Value::from("orders")]);
        }
    }
}

#[test]
fn table_filter_precedes_ordering() {
    let candidates = PostgresDialect.primary_keys_queries("orders");
    let sql = candidates.iter().next().map(|c| c.sql().to_string()).unwrap_or_default();
    let filter = sql.find("tc.table_name = $1").unwrap();
    let order = sql.find("ORDER BY").unwrap();
    assert!(filter < order);

    let candidates = MySqlDialect.indexes_queries("orders");
    let sql = candidates.iter().next().map(|c| c.sql().to_string()).unwrap_or_default();
    let filter = sql.find("table_name = ?").unwrap();
    let group = sql.find("GROUP BY").unwrap();
    assert!(filter < group);
}

#[test]
fn postgres_relationships_match_either_side() {
    let candidates = PostgresDialect.relationships_queries("orders");
    let sql: Vec<&str> = candidates.iter().map(|c| c.sql()).collect();

    assert!(sql[0].contains("'FOREIGN KEY'"));
    assert!(sql[0].contains("tc.table_name = $1 OR ccu.table_name = $1"));
    assert!(sql[1].contains("contype = 'f'"));
}

#[test]
fn mysql_relationships_bind_both_placeholders() {
    for candidate in &MySqlDialect.relationships_queries("orders") {
        assert_eq!(candidate.sql().matches('?').count(), 2);
        assert_eq!(
            candidate.values(),
            vec![Value::from("orders"), Value::from("orders")]
        );
    }
}

#[test]
fn mysql_show_columns_quotes_table() {
    let candidates = MySqlDialect.columns_queries("odd`name");
    let show = candidates.iter().nth(1).map(|c| c.sql().to_string());
    assert_eq!(show.as_deref(), Some("SHOW COLUMNS FROM `odd``name`"));
}

#[test]
fn mysql_tables_fall_back_to_show_tables() {
    let candidates = MySqlDialect.tables_queries();
    let last = candidates.iter().last().map(|c| c.sql().to_string());
    assert_eq!(candidates.len(), 2);
    assert_eq!(last.as_deref(), Some("SHOW TABLES"));
}

#[test]
fn generic_tries_postgres_then_mysql() {
    for facet in FACETS {
        let expected = PostgresDialect
            .queries(facet, "orders")
            .chain(MySqlDialect.queries(facet, "orders"));
        assert_eq!(GenericDialect.queries(facet, "orders"), expected);
    }
}

#[rstest]
#[case::user_defined(column("status", "USER-DEFINED", Some("order_status")), vec!["order_status"])]
#[case::catalog_format_type(column("status", "order_status", Some("order_status")), vec!["order_status"])]
#[case::user_defined_without_udt(column("status", "USER-DEFINED", None), vec![])]
fn postgres_enum_keys(#[case] column: ColumnInfo, #[case] expected: Vec<&str>) {
    assert_eq!(PostgresDialect.enum_keys("orders", &column), expected);
}

#[rstest]
#[case::bare_enum(column("status", "enum", None), vec!["orders.status"])]
#[case::full_type(column("status", "enum('a','b')", None), vec!["orders.status"])]
#[case::upper(column("status", "ENUM", None), vec!["orders.status"])]
#[case::varchar(column("status", "varchar", None), vec![])]
fn mysql_enum_keys(#[case] column: ColumnInfo, #[case] expected: Vec<&str>) {
    assert_eq!(MySqlDialect.enum_keys("orders", &column), expected);
}

#[test]
fn generic_enum_keys_cover_both_dialects() {
    let keys = GenericDialect.enum_keys("orders", &column("status", "enum", None));
    assert_eq!(keys, vec!["enum", "orders.status"]);
}
