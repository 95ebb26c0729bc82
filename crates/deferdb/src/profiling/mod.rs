//! Statement execution profiling.
//!
//! [`ProfilingConnection`] times `exec`/`query` itself and installs a
//! [`ProfilingStatementFactory`] on the wrapped connection, so every prepared
//! statement reports its executions back to the same [`ProfilingLog`].

mod connection;
mod fingerprint;
mod log;
mod statement;

pub use connection::ProfilingConnection;
pub use fingerprint::Fingerprint;
pub use log::{ExecutionRecord, LogSnapshot, ProfilingLog, RerunAggregate, SharedLog};
pub use statement::{ProfilingStatement, ProfilingStatementFactory};
