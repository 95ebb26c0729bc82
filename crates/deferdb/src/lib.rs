//! Deferred database handles.
//!
//! Decorators around a synchronous database connection:
//!
//! - [`LazyConnection`] connects on first use and replays attributes set
//!   before that point.
//! - [`ReconnectingConnection`] replaces the physical connection once it
//!   outlives a TTL, never while a transaction is open.
//! - [`ProfilingConnection`] times every statement execution and keeps
//!   per-statement and per-fingerprint totals.
//!
//! Each decorator implements [`Connection`], so they stack in any order the
//! types allow. [`ConnectionConfig::open`] builds the usual
//! lazy → reconnecting → profiling stack from configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! use deferdb::{Connection, ConnectionConfig, Params, StatementOptions};
//! use deferdb_sqlite::SqliteDriver;
//!
//! let config = ConnectionConfig::builder()
//!     .dsn("sqlite::memory:")
//!     .profiling(true)
//!     .build()?;
//! let mut conn = config.open(SqliteDriver::new())?;
//!
//! conn.exec("CREATE TABLE t (v INTEGER)")?;
//! conn.execute(
//!     "INSERT INTO t (v) VALUES (:v)",
//!     &Params::named([("v", 1)]),
//!     &StatementOptions::default(),
//! )?;
//! assert_eq!(conn.profile().unwrap().total_count, 2);
//! ```

pub mod attribute;
pub mod config;
pub mod error;
pub mod lazy;
pub mod observability;
pub mod profiling;
pub mod reconnect;
pub mod traits;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use attribute::{Attribute, AttributeCache, AttributeKey, AttributeValue, ErrorMode, TTL_KEY};
pub use config::{ConnectionConfig, ConnectionConfigBuilder, LoggingConfig};
pub use error::{Error, Result};
pub use lazy::{ConnectionState, LazyConnection};
pub use profiling::{
    ExecutionRecord, Fingerprint, LogSnapshot, ProfilingConnection, ProfilingLog,
    ProfilingStatement, ProfilingStatementFactory, RerunAggregate, SharedLog,
};
pub use reconnect::{DEFAULT_TTL, ReconnectingConnection};
pub use traits::{
    Connection, ConnectionParameters, CursorKind, Driver, ErrorInfo, NO_ERROR_SQLSTATE,
    PreparedStatement, StatementFactory, StatementOptions,
};
pub use value::{BoundVariable, FetchMode, ParamKey, ParamType, Params, Row, Value, bound_variable};
