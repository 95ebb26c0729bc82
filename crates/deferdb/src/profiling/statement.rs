//! Profiling prepared statement.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::log::SharedLog;
use crate::error::Result;
use crate::traits::{ErrorInfo, PreparedStatement, StatementFactory};
use crate::value::{BoundVariable, FetchMode, ParamKey, ParamType, Params, Row, Value};

/// Statement wrapper that reports every execution to its profiling log.
///
/// Only produced by [`ProfilingStatementFactory`], i.e. through the `prepare`
/// of a profiled connection. It keeps its own handle on the log, so it stays
/// valid after the connection is dropped.
pub struct ProfilingStatement {
    inner: Box<dyn PreparedStatement>,
    log: SharedLog,
    bindings: Params,
}

impl ProfilingStatement {
    pub(crate) fn new(inner: Box<dyn PreparedStatement>, log: SharedLog) -> Self {
        Self {
            inner,
            log,
            bindings: Params::new(),
        }
    }

    /// Values bound since the last execution.
    #[must_use]
    pub const fn bindings(&self) -> &Params {
        &self.bindings
    }
}

impl fmt::Debug for ProfilingStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfilingStatement")
            .field("inner", &self.inner)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

impl PreparedStatement for ProfilingStatement {
    fn query_string(&self) -> &str {
        self.inner.query_string()
    }

    fn bind_value(&mut self, param: ParamKey, value: Value, hint: ParamType) -> Result<bool> {
        let bound = self.inner.bind_value(param.clone(), value.clone(), hint)?;
        if bound {
            self.bindings.set(param, value);
        }
        Ok(bound)
    }

    fn bind_param(
        &mut self,
        param: ParamKey,
        variable: BoundVariable,
        hint: ParamType,
        length: Option<usize>,
    ) -> Result<bool> {
        let snapshot = variable.lock().clone();
        let bound = self.inner.bind_param(param.clone(), variable, hint, length)?;
        if bound {
            self.bindings.set(param, snapshot);
        }
        Ok(bound)
    }

    fn execute(&mut self, params: Option<&Params>) -> Result<bool> {
        let start = Instant::now();
        let result = self.inner.execute(params)?;
        let elapsed = start.elapsed();

        let bindings = std::mem::take(&mut self.bindings);
        let logged = params.cloned().unwrap_or(bindings);
        self.log
            .lock()
            .record(self.inner.query_string(), elapsed, Some(logged));

        Ok(result)
    }

    fn fetch(&mut self) -> Option<Row> {
        self.inner.fetch()
    }

    fn fetch_all(&mut self) -> Vec<Row> {
        self.inner.fetch_all()
    }

    fn row_count(&self) -> u64 {
        self.inner.row_count()
    }

    fn column_count(&self) -> usize {
        self.inner.column_count()
    }

    fn set_fetch_mode(&mut self, mode: FetchMode) {
        self.inner.set_fetch_mode(mode);
    }

    fn fetch_mode(&self) -> FetchMode {
        self.inner.fetch_mode()
    }

    fn error_code(&self) -> String {
        self.inner.error_code()
    }

    fn error_info(&self) -> ErrorInfo {
        self.inner.error_info()
    }
}

/// Statement factory producing [`ProfilingStatement`]s bound to one log.
#[derive(Clone)]
pub struct ProfilingStatementFactory {
    log: SharedLog,
}

impl ProfilingStatementFactory {
    pub(crate) const fn new(log: SharedLog) -> Self {
        Self { log }
    }

    /// Whether statements of this factory report to `log`.
    #[must_use]
    pub fn reports_to(&self, log: &SharedLog) -> bool {
        Arc::ptr_eq(&self.log, log)
    }

    /// Wrap `stmt` so its executions are recorded.
    #[must_use]
    pub fn wrap(&self, stmt: Box<dyn PreparedStatement>) -> ProfilingStatement {
        ProfilingStatement::new(stmt, Arc::clone(&self.log))
    }
}

impl fmt::Debug for ProfilingStatementFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfilingStatementFactory")
            .finish_non_exhaustive()
    }
}

impl StatementFactory for ProfilingStatementFactory {
    fn name(&self) -> &str {
        "ProfilingStatement"
    }

    fn create(&self, stmt: Box<dyn PreparedStatement>) -> Box<dyn PreparedStatement> {
        Box::new(self.wrap(stmt))
    }

    fn as_profiling(&self) -> Option<&ProfilingStatementFactory> {
        Some(self)
    }
}
