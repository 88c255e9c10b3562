use async_trait::async_trait;
use dbscope_connection::DatabaseManager;
use dbscope_core::{
    Connection, ConnectionConfig, DatabaseDriver, DbscopeError, QueryResult, Result, Value,
};
use dbscope_drivers::DriverRegistry;
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

struct FakeConnection {
    kind: &'static str,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for FakeConnection {
    fn driver_name(&self) -> &str {
        self.kind
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Connects every database except those whose host is "unreachable"
struct FakeDriver(&'static str);

#[async_trait]
impl DatabaseDriver for FakeDriver {
    fn name(&self) -> &'static str {
        self.0
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        if config.host == "unreachable" {
            return Err(DbscopeError::Connection("connection refused".into()));
        }
        Ok(Arc::new(FakeConnection {
            kind: self.0,
            closed: AtomicBool::new(false),
        }))
    }
}

fn manager() -> DatabaseManager {
    let mut registry = DriverRegistry::new();
    registry.register(Arc::new(FakeDriver("postgres")));
    registry.register(Arc::new(FakeDriver("mysql")));
    DatabaseManager::with_registry(registry)
}

const CONFIG: &str = indoc! {r#"
    {
      "connections": [
        { "id": "analytics", "type": "postgresql", "host": "pg" },
        { "id": "shop", "type": "mysql", "host": "unreachable" },
        { "id": "billing", "type": "postgres", "host": "pg" }
      ]
    }
"#};

#[tokio::test]
async fn connect_all_tolerates_partial_failure() {
    let manager = manager();
    assert_eq!(manager.load_config(CONFIG).unwrap(), 3);

    let connected = manager.connect_all().await.unwrap();

    assert_eq!(connected, 2);
    assert_eq!(
        manager.list_databases(),
        vec!["analytics", "shop", "billing"]
    );
    assert_eq!(manager.connected_databases(), vec!["analytics", "billing"]);
    assert_eq!(manager.database_type("analytics").unwrap(), "postgres");
}

#[tokio::test]
async fn connect_all_fails_when_nothing_connects() {
    let manager = manager();
    manager
        .load_config(r#"{"connections":[{"id":"shop","type":"mysql","host":"unreachable"}]}"#)
        .unwrap();

    let err = manager.connect_all().await.unwrap_err();
    assert!(
        err.to_string()
            .contains("failed to connect to any databases: all 1 connection attempts failed")
    );
}

#[tokio::test]
async fn unknown_database_is_not_found() {
    let manager = manager();
    let err = manager.get("missing").err().unwrap();
    assert!(err.to_string().contains("database connection missing not found"));
    assert!(manager.close("missing").await.is_err());
}

#[tokio::test]
async fn close_removes_connection() {
    let manager = manager();
    let conn = Arc::new(FakeConnection {
        kind: "mysql",
        closed: AtomicBool::new(false),
    });
    manager.register_connection("shop", conn.clone());
    assert!(manager.get("shop").is_ok());

    manager.close("shop").await.unwrap();

    assert!(conn.is_closed());
    assert!(manager.get("shop").is_err());
}

#[tokio::test]
async fn close_all_closes_every_connection() {
    let manager = manager();
    manager.load_config(CONFIG).unwrap();
    manager.connect_all().await.unwrap();
    let analytics = manager.get("analytics").unwrap();

    manager.close_all().await.unwrap();

    assert!(analytics.is_closed());
    assert!(manager.connected_databases().is_empty());
}

#[tokio::test]
async fn loads_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("databases.json");
    std::fs::write(&path, CONFIG).unwrap();

    let manager = manager();
    assert_eq!(manager.load_config_file(&path).await.unwrap(), 3);
    assert_eq!(
        manager.config("billing").map(|c| c.driver_name()),
        Some("postgres".to_string())
    );
}

#[tokio::test]
async fn connect_reuses_live_connection() {
    let manager = manager();
    manager.load_config(CONFIG).unwrap();

    let first = manager.connect("analytics").await.unwrap();
    let second = manager.connect("analytics").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
}
