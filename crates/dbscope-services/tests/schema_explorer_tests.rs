//! Schema explorer tool tests against scripted connections

mod common;

use common::{MockConnection, result};
use dbscope_connection::DatabaseManager;
use dbscope_drivers::DriverRegistry;
use dbscope_schema::SchemaCache;
use dbscope_services::{
    DatabaseTools, SCHEMA_TOOL, SchemaExplorer, SchemaExplorerArgs, SchemaOutput, ServiceError,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn pg_shop() -> MockConnection {
    MockConnection::postgres()
        .on(
            "table_type = 'BASE TABLE'",
            result(&["table_name"], &[&["users"]]),
        )
        .on_table(
            "information_schema.columns",
            "users",
            result(
                &["column_name", "data_type", "udt_name", "is_nullable", "column_default"],
                &[&["id", "integer", "int4", "NO", ""]],
            ),
        )
}

fn databases(conn: &Arc<MockConnection>) -> Arc<DatabaseManager> {
    let manager = DatabaseManager::with_registry(DriverRegistry::new());
    manager.register_connection("main", conn.clone());
    Arc::new(manager)
}

fn explorer(conn: &Arc<MockConnection>) -> SchemaExplorer {
    SchemaExplorer::new(
        databases(conn),
        Arc::new(SchemaCache::new(Duration::from_secs(300))),
    )
}

#[rstest]
#[case::no_component(SchemaExplorerArgs { database: Some("main".into()), ..Default::default() }, "component parameter is required")]
#[case::no_database(SchemaExplorerArgs { component: Some("tables".into()), ..Default::default() }, "database parameter is required")]
#[case::unknown_database(SchemaExplorerArgs::new("missing", "tables"), "failed to get database: Not found: database connection missing not found")]
#[case::invalid_component(SchemaExplorerArgs::new("main", "views"), "invalid component: views")]
#[case::columns_without_table(SchemaExplorerArgs::new("main", "columns"), "table parameter is required for columns")]
#[tokio::test]
async fn rejected_calls_never_query(#[case] args: SchemaExplorerArgs, #[case] message: &str) {
    let conn = Arc::new(pg_shop());

    let err = explorer(&conn).call(args).await.unwrap_err();

    assert_eq!(err.to_string(), message);
    assert_eq!(conn.query_count(), 0);
}

#[tokio::test]
async fn tables_output_carries_db_type() {
    let conn = Arc::new(pg_shop());

    let output = explorer(&conn)
        .call(SchemaExplorerArgs::new("main", "tables"))
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&output).unwrap(),
        json!({ "tables": [{ "table_name": "users" }], "dbType": "postgres" })
    );
}

#[tokio::test]
async fn columns_output_names_the_table() {
    let conn = Arc::new(pg_shop());

    let output = explorer(&conn)
        .call(SchemaExplorerArgs::new("main", "columns").with_table("users"))
        .await
        .unwrap();

    let value = serde_json::to_value(&output).unwrap();
    assert_eq!(value["table"], json!("users"));
    assert_eq!(value["dbType"], json!("postgres"));
    assert_eq!(value["columns"][0]["column_name"], json!("id"));
    assert_eq!(value["columns"][0]["is_nullable"], json!("NO"));
}

#[tokio::test]
async fn relationships_without_table_cover_every_table() {
    let conn = Arc::new(pg_shop().on(
        "'FOREIGN KEY'",
        result(
            &["constraint_name", "table_name", "column_name", "foreign_table_name", "foreign_column_name"],
            &[&["orders_user_id_fkey", "orders", "user_id", "users", "id"]],
        ),
    ));

    let output = explorer(&conn)
        .call(SchemaExplorerArgs::new("main", "relationships"))
        .await
        .unwrap();

    match output {
        SchemaOutput::Relationships {
            relationships,
            db_type,
            table,
        } => {
            assert_eq!(relationships.len(), 1);
            assert_eq!(db_type, "postgres");
            assert_eq!(table, "");
        }
        other => panic!("unexpected output: {other:?}"),
    }
    assert!(conn.queries()[0].params.is_empty());
}

#[tokio::test]
async fn full_schema_is_served_from_cache_until_invalidated() {
    let conn = Arc::new(pg_shop());
    let explorer = explorer(&conn);

    let first = explorer
        .call(SchemaExplorerArgs::new("main", "full"))
        .await
        .unwrap();
    let queries_after_first = conn.query_count();
    let second = explorer
        .call(SchemaExplorerArgs::new("main", "full"))
        .await
        .unwrap();

    assert_eq!(conn.query_count(), queries_after_first);
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );

    assert!(explorer.invalidate("main"));
    explorer
        .call(SchemaExplorerArgs::new("main", "full"))
        .await
        .unwrap();
    assert_eq!(conn.query_count(), queries_after_first * 2);
}

#[tokio::test]
async fn full_schema_document_shape() {
    let conn = Arc::new(pg_shop());

    let output = explorer(&conn)
        .call(SchemaExplorerArgs::new("main", "full"))
        .await
        .unwrap();

    let value = serde_json::to_value(&output).unwrap();
    assert_eq!(value["tables"], json!([{ "table_name": "users" }]));
    assert_eq!(value["enum_types"], json!({}));
    assert_eq!(value["enum_values"], json!([]));
    assert_eq!(value["foreign_keys"], json!([]));
    let users = &value["detailed_schema"]["users"];
    assert_eq!(users["statistics"], json!({}));
    assert_eq!(users["primary_keys"], json!([]));
    assert_eq!(users["indexes"], json!([]));
    assert_eq!(users["unique_constraints"], json!([]));
    assert_eq!(users["foreign_keys"], json!([]));
}

#[tokio::test(start_paused = true)]
async fn timeout_is_reported_in_milliseconds() {
    let conn = Arc::new(MockConnection::postgres().hang("table_type = 'BASE TABLE'"));

    let err = explorer(&conn)
        .call(SchemaExplorerArgs::new("main", "tables").with_timeout(50))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Timeout { timeout_ms: 50 }));
    assert_eq!(err.to_string(), "operation timed out after 50ms");
    assert_eq!(conn.cancel_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn default_timeout_is_ten_seconds() {
    let conn = Arc::new(MockConnection::postgres().hang("table_type = 'BASE TABLE'"));

    let err = explorer(&conn)
        .call(SchemaExplorerArgs::new("main", "tables"))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Timeout { timeout_ms: 10_000 }));
}

#[tokio::test]
async fn cancelled_call_stops() {
    let conn = Arc::new(MockConnection::postgres().hang("table_type = 'BASE TABLE'"));
    let token = CancellationToken::new();
    let explorer = explorer(&conn);

    let call = explorer.call_with_cancellation(SchemaExplorerArgs::new("main", "full"), token.clone());
    let cancel = async {
        tokio::task::yield_now().await;
        token.cancel();
    };
    let (outcome, ()) = tokio::join!(call, cancel);

    assert!(matches!(outcome.unwrap_err(), ServiceError::Cancelled));
    assert!(explorer.cache().is_empty());
}

#[tokio::test]
async fn json_dispatch_runs_the_schema_tool() {
    let conn = Arc::new(pg_shop());
    let tools = DatabaseTools::new(
        databases(&conn),
        Arc::new(SchemaCache::new(Duration::from_secs(300))),
    );

    let value = tools
        .call(
            SCHEMA_TOOL,
            json!({ "component": "tables", "database": "main" }),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(value["dbType"], json!("postgres"));

    let err = tools
        .call(SCHEMA_TOOL, json!({ "component": 7 }), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArguments(_)));

    let err = tools
        .call("dbDrop", json!({}), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "unknown tool: dbDrop");
}

#[test]
fn tool_definitions_describe_arguments() {
    let definitions = DatabaseTools::definitions();
    let names: Vec<&str> = definitions.iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["dbSchema", "dbQuery"]);

    let schema = &definitions[0].input_schema;
    assert!(schema["properties"]["component"].is_object());
    assert!(schema["properties"]["timeout"].is_object());
}
