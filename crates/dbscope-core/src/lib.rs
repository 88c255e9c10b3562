//! dbscope core - shared abstractions for read-only database access
//!
//! This crate provides the traits and types that every other dbscope
//! crate depends on:
//!
//! - `DatabaseDriver` - factory for connections to one engine
//! - `Connection` - a query-capable, shareable database handle
//! - `RowCursor` - forward-only access to a result set
//! - `QueryTicket` / `QueryCancelHandle` - cancellation of one submitted statement
//! - `validate_read_only` - the lexical guard for agent-supplied SQL
//! - Common types like `Value`, `Row`, `ColumnMeta` and `QueryResult`

mod connection;
mod cursor;
mod driver;
mod error;
mod read_only;
mod tls;
mod types;

pub use connection::*;
pub use cursor::*;
pub use driver::*;
pub use error::*;
pub use read_only::*;
pub use tls::*;
pub use types::*;
