//! dbscope drivers - database driver implementations
//!
//! This crate bundles the concrete drivers behind feature flags and provides
//! the registry that maps a database kind to its driver.

#[cfg(feature = "mysql")]
pub use dbscope_driver_mysql as mysql;
#[cfg(feature = "postgres")]
pub use dbscope_driver_postgres as postgres;

mod registry;

pub use registry::DriverRegistry;

/// Re-export commonly used types from dbscope-core
pub use dbscope_core::{
    Connection, ConnectionConfig, DatabaseDriver, DbscopeError, QueryResult, Result, Row, Value,
};
