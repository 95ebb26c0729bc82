//! Profiling connection decorator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::log::{ExecutionRecord, LogSnapshot, ProfilingLog, RerunAggregate, SharedLog};
use super::statement::ProfilingStatementFactory;
use crate::attribute::{Attribute, AttributeValue};
use crate::error::{Error, Result};
use crate::traits::{Connection, ErrorInfo, PreparedStatement, StatementOptions};
use crate::value::{FetchMode, ParamType, Params};

/// Connection wrapper that times and records every statement execution.
///
/// Results of the wrapped connection pass through unchanged. `exec` and
/// `query` are timed here; prepared statements are timed when they execute.
///
/// # Example
///
/// ```rust,ignore
/// use deferdb::{Connection, Params, ProfilingConnection, StatementOptions};
///
/// let mut conn = ProfilingConnection::new(inner)?;
/// conn.execute("SELECT 1", &Params::new(), &StatementOptions::default())?;
/// assert_eq!(conn.log().total_count, 1);
/// ```
#[derive(Debug)]
pub struct ProfilingConnection<C: Connection> {
    inner: C,
    log: SharedLog,
    factory: ProfilingStatementFactory,
}

impl<C: Connection> ProfilingConnection<C> {
    /// Wrap `inner` and install the profiling statement factory on it.
    pub fn new(mut inner: C) -> Result<Self> {
        let log = ProfilingLog::shared();
        let factory = ProfilingStatementFactory::new(Arc::clone(&log));
        inner.set_attribute(
            Attribute::StatementClass,
            AttributeValue::StatementClass(Arc::new(factory.clone())),
        )?;

        Ok(Self {
            inner,
            log,
            factory,
        })
    }

    /// The installed factory, for callers that want to decorate it.
    #[must_use]
    pub const fn statement_factory(&self) -> &ProfilingStatementFactory {
        &self.factory
    }

    /// Record one execution.
    pub fn log_execution(&self, sql: &str, duration: Duration, params: Option<Params>) {
        self.log.lock().record(sql, duration, params);
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn log(&self) -> LogSnapshot {
        self.log.lock().snapshot()
    }

    /// Individual execution records, in call order.
    #[must_use]
    pub fn executed_statements(&self) -> Vec<ExecutionRecord> {
        self.log.lock().records().to_vec()
    }

    /// Per-fingerprint aggregates, in order of first execution.
    #[must_use]
    pub fn reruns(&self) -> Vec<RerunAggregate> {
        self.log.lock().aggregates().to_vec()
    }

    #[must_use]
    pub fn total_exec_time(&self) -> Duration {
        self.log.lock().total_duration()
    }

    /// Number of executions, or of distinct statements when `include_reruns` is false.
    #[must_use]
    pub fn total_count(&self, include_reruns: bool) -> u64 {
        let log = self.log.lock();
        if include_reruns {
            log.total_count()
        } else {
            log.aggregates().len() as u64
        }
    }

    #[must_use]
    pub const fn inner(&self) -> &C {
        &self.inner
    }

    fn timed<T>(&mut self, sql: &str, call: impl FnOnce(&mut C) -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = call(&mut self.inner)?;
        let elapsed = start.elapsed();
        self.log_execution(sql, elapsed, None);
        Ok(result)
    }
}

impl<C: Connection> Connection for ProfilingConnection<C> {
    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn begin_transaction(&mut self) -> Result<bool> {
        self.inner.begin_transaction()
    }

    fn commit(&mut self) -> Result<bool> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<bool> {
        self.inner.rollback()
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    fn exec(&mut self, sql: &str) -> Result<Option<u64>> {
        self.timed(sql, |inner| inner.exec(sql))
    }

    fn query(
        &mut self,
        sql: &str,
        fetch_mode: Option<FetchMode>,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        self.timed(sql, |inner| inner.query(sql, fetch_mode))
    }

    fn prepare(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        self.inner.prepare(sql, options)
    }

    fn quote(&mut self, raw: &str, hint: ParamType) -> Result<String> {
        self.inner.quote(raw, hint)
    }

    fn get_attribute(&self, attr: Attribute) -> Result<AttributeValue> {
        self.inner.get_attribute(attr)
    }

    /// Rejects any statement class that would not report back to this log.
    fn set_attribute(&mut self, attr: Attribute, value: AttributeValue) -> Result<bool> {
        if attr == Attribute::StatementClass {
            let reports_here = value
                .as_statement_factory()
                .and_then(|factory| factory.as_profiling())
                .is_some_and(|profiling| profiling.reports_to(&self.log));
            if !reports_here {
                tracing::warn!(given = %value.type_name(), "rejected statement class override");
                return Err(Error::invalid_statement_class(value.type_name()));
            }
        }
        self.inner.set_attribute(attr, value)
    }

    fn error_code(&self) -> String {
        self.inner.error_code()
    }

    fn error_info(&self) -> ErrorInfo {
        self.inner.error_info()
    }

    fn last_insert_id(&mut self, name: Option<&str>) -> Result<String> {
        self.inner.last_insert_id(name)
    }

    fn profile(&self) -> Option<LogSnapshot> {
        Some(self.log())
    }
}
