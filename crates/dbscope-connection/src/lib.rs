//! dbscope connection - database configuration and live handles
//!
//! This crate loads the multi-database JSON configuration and owns the
//! mapping from database identifiers to connected handles.

mod config;
mod manager;

pub use config::{DatabaseConnectionConfig, MultiDbConfig};
pub use manager::DatabaseManager;
