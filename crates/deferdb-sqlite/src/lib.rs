//! SQLite driver for deferdb.
//!
//! A synchronous [`Connection`](deferdb::Connection) built on `rusqlite`,
//! suitable as the physical connection under the deferdb decorators.
//!
//! # Example
//!
//! ```rust,ignore
//! use deferdb::{Connection, ConnectionParameters, LazyConnection};
//! use deferdb_sqlite::SqliteDriver;
//!
//! let mut conn = LazyConnection::new(SqliteDriver::new(), ConnectionParameters::new("sqlite::memory:"));
//! conn.exec("CREATE TABLE t (v INTEGER)")?;
//! ```

mod connection;
mod convert;
mod driver;
mod statement;

pub use connection::SqliteConnection;
pub use convert::{
    MAX_BUSY_TIMEOUT_SECS, SQLSTATE_CONSTRAINT, SQLSTATE_GENERAL, SQLSTATE_INVALID_PARAMETER,
};
pub use driver::SqliteDriver;
pub use statement::SqliteStatement;

/// DSN scheme handled by [`SqliteDriver`].
pub const DRIVER_NAME: &str = "sqlite";

/// DSN body selecting a private in-memory database.
pub const MEMORY_DSN_BODY: &str = ":memory:";
