//! Prepared statement and statement factory traits.

use std::fmt;

use crate::error::Result;
use crate::profiling::ProfilingStatementFactory;
use crate::traits::ErrorInfo;
use crate::value::{BoundVariable, FetchMode, ParamKey, ParamType, Params, Row, Value};

/// A statement prepared by a [`Connection`](crate::Connection).
pub trait PreparedStatement: fmt::Debug {
    /// SQL text the statement was prepared from.
    fn query_string(&self) -> &str;

    /// Bind a value to a placeholder.
    fn bind_value(&mut self, param: ParamKey, value: Value, hint: ParamType) -> Result<bool>;

    /// Bind a variable by reference; its value is read at execute time.
    fn bind_param(
        &mut self,
        param: ParamKey,
        variable: BoundVariable,
        hint: ParamType,
        length: Option<usize>,
    ) -> Result<bool>;

    /// Execute with `params`, or with the bound values when `None`.
    fn execute(&mut self, params: Option<&Params>) -> Result<bool>;

    /// Next row of the result set.
    fn fetch(&mut self) -> Option<Row>;

    /// All remaining rows.
    fn fetch_all(&mut self) -> Vec<Row>;

    /// Rows affected by the last execution.
    fn row_count(&self) -> u64;

    fn column_count(&self) -> usize;

    fn set_fetch_mode(&mut self, mode: FetchMode);

    fn fetch_mode(&self) -> FetchMode;

    fn error_code(&self) -> String;

    fn error_info(&self) -> ErrorInfo;
}

/// Hook every statement produced by a connection passes through.
///
/// Installed with the [`Attribute::StatementClass`](crate::Attribute::StatementClass)
/// attribute.
pub trait StatementFactory: Send + Sync {
    /// Name reported in diagnostics.
    fn name(&self) -> &str;

    /// Wrap or replace a freshly produced statement.
    fn create(&self, stmt: Box<dyn PreparedStatement>) -> Box<dyn PreparedStatement>;

    /// The profiling factory this factory is or decorates, if any.
    fn as_profiling(&self) -> Option<&ProfilingStatementFactory> {
        None
    }
}

impl fmt::Debug for dyn StatementFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementFactory")
            .field("name", &self.name())
            .finish()
    }
}
