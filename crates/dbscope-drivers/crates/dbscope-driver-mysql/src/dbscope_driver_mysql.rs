//! MySQL driver implementation

mod connection;
mod driver;
mod literal;

pub use connection::{MySqlConnection, MySqlKillQuery};
pub use driver::{MySqlConnectOptions, MySqlDriver};
pub use literal::{bind_literals, value_to_mysql_literal};
