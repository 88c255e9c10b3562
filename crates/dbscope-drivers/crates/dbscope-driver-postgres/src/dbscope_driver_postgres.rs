//! PostgreSQL driver implementation

mod connection;
mod driver;
mod tls;
mod values;

pub use connection::{PostgresCancelHandle, PostgresConnection, PostgresCursor};
pub use driver::{PostgresConnectOptions, PostgresDriver};
