//! Execution records and per-fingerprint aggregates.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::fingerprint::Fingerprint;
use crate::value::Params;

/// Log shared between a profiling connection and its statements.
pub type SharedLog = Arc<Mutex<ProfilingLog>>;

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// One executed statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub sql: String,
    /// Run number of this SQL text, starting at 1.
    pub iteration: u64,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    /// Bindings used by the execution; `None` for `exec`/`query`.
    pub params: Option<Params>,
}

/// Totals of all executions sharing one fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerunAggregate {
    #[serde(skip)]
    pub fingerprint: Fingerprint,
    pub sql: String,
    /// Number of executions so far.
    pub iteration: u64,
    #[serde(rename = "cumulative_duration", serialize_with = "serialize_secs")]
    pub cumulative: Duration,
}

/// Growing execution log owned by one profiling connection.
#[derive(Debug, Default)]
pub struct ProfilingLog {
    records: Vec<ExecutionRecord>,
    aggregates: Vec<RerunAggregate>,
    index: HashMap<Fingerprint, usize>,
    total_count: u64,
    total_duration: Duration,
}

impl ProfilingLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> SharedLog {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Record one execution of `sql` that took `duration`.
    pub fn record(&mut self, sql: &str, duration: Duration, params: Option<Params>) {
        let fingerprint = Fingerprint::of(sql);
        let slot = *self.index.entry(fingerprint).or_insert_with(|| {
            self.aggregates.push(RerunAggregate {
                fingerprint,
                sql: sql.to_string(),
                iteration: 0,
                cumulative: Duration::ZERO,
            });
            self.aggregates.len() - 1
        });

        let aggregate = &mut self.aggregates[slot];
        aggregate.iteration += 1;
        aggregate.cumulative += duration;
        let iteration = aggregate.iteration;

        self.total_count += 1;
        self.total_duration += duration;

        tracing::trace!(
            %fingerprint,
            iteration,
            duration_us = duration.as_micros(),
            "statement profiled"
        );

        self.records.push(ExecutionRecord {
            sql: sql.to_string(),
            iteration,
            duration,
            params,
        });
    }

    #[must_use]
    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    /// Aggregates in order of first execution.
    #[must_use]
    pub fn aggregates(&self) -> &[RerunAggregate] {
        &self.aggregates
    }

    #[must_use]
    pub fn aggregate(&self, sql: &str) -> Option<&RerunAggregate> {
        self.index
            .get(&Fingerprint::of(sql))
            .map(|slot| &self.aggregates[*slot])
    }

    #[must_use]
    pub const fn total_count(&self) -> u64 {
        self.total_count
    }

    #[must_use]
    pub const fn total_duration(&self) -> Duration {
        self.total_duration
    }

    #[must_use]
    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            records: self.records.clone(),
            aggregates: self.aggregates.clone(),
            total_count: self.total_count,
            total_duration: self.total_duration,
        }
    }
}

fn serialize_aggregates<S: Serializer>(
    aggregates: &[RerunAggregate],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(aggregates.len()))?;
    for aggregate in aggregates {
        map.serialize_entry(&aggregate.fingerprint, aggregate)?;
    }
    map.end()
}

/// Immutable copy of a [`ProfilingLog`].
///
/// Serializes as
/// `{records: [{sql, iteration, duration, params}], aggregates: {fingerprint: {sql, iteration, cumulative_duration}}, total_count, total_duration}`
/// with durations in fractional seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSnapshot {
    pub records: Vec<ExecutionRecord>,
    #[serde(serialize_with = "serialize_aggregates")]
    pub aggregates: Vec<RerunAggregate>,
    pub total_count: u64,
    #[serde(serialize_with = "serialize_secs")]
    pub total_duration: Duration,
}

impl LogSnapshot {
    #[must_use]
    pub fn aggregate(&self, sql: &str) -> Option<&RerunAggregate> {
        let fingerprint = Fingerprint::of(sql);
        self.aggregates.iter().find(|a| a.fingerprint == fingerprint)
    }

    /// Iteration numbers of the records for `sql`, in call order.
    #[must_use]
    pub fn iterations_of(&self, sql: &str) -> Vec<u64> {
        self.records
            .iter()
            .filter(|r| r.sql == sql)
            .map(|r| r.iteration)
            .collect()
    }
}
