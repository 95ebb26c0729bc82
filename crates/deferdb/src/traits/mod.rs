//! Capability traits shared by the underlying client and every decorator.
//!
//! - [`Connection`]: the operation surface of a database handle
//! - [`Driver`]: how a physical connection is established
//! - [`PreparedStatement`]: binding, execution and fetching
//! - [`StatementFactory`]: hook applied to every statement a connection produces

pub mod connection;
pub mod statement;

pub use connection::{
    Connection, ConnectionParameters, CursorKind, Driver, ErrorInfo, NO_ERROR_SQLSTATE,
    StatementOptions,
};
pub use statement::{PreparedStatement, StatementFactory};
