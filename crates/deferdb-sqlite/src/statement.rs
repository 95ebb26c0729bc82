//! SQLite prepared statement.

use std::collections::VecDeque;
use std::sync::Arc;

use deferdb::{
    BoundVariable, ErrorInfo, FetchMode, ParamKey, ParamType, Params, PreparedStatement, Result,
    Row, Value,
};
use rusqlite::Connection as RusqliteConnection;

use crate::connection::SharedSqlite;
use crate::convert::{SQLSTATE_INVALID_PARAMETER, coerce, error_info, from_sql, report, to_sql};

#[derive(Debug)]
enum Binding {
    Value(Value),
    /// Read when the statement executes.
    Variable(BoundVariable, ParamType),
}

impl Binding {
    fn current(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Variable(variable, hint) => coerce(variable.lock().clone(), *hint),
        }
    }
}

/// Statement prepared on a [`SqliteConnection`](crate::SqliteConnection).
///
/// The SQL is compiled once at prepare time to validate it and learn its
/// placeholders and columns, then recompiled on each execution. Result rows
/// are buffered on execute.
///
/// A statement shares the physical connection it was prepared on and keeps
/// it open while it lives.
#[derive(Debug)]
pub struct SqliteStatement {
    shared: SharedSqlite,
    sql: String,
    /// Placeholder names by 1-based index minus one; `None` for `?`.
    parameters: Vec<Option<String>>,
    columns: Arc<[String]>,
    bindings: Vec<(usize, Binding)>,
    rows: VecDeque<Row>,
    row_count: u64,
    fetch_mode: FetchMode,
    last_error: ErrorInfo,
}

impl SqliteStatement {
    pub(crate) fn prepare(shared: SharedSqlite, sql: &str) -> rusqlite::Result<Self> {
        let inner = shared.lock();
        let stmt = inner.conn.prepare(sql)?;

        let parameters = (1..=stmt.parameter_count())
            .map(|index| stmt.parameter_name(index).map(str::to_string))
            .collect();
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let fetch_mode = inner.default_fetch_mode;

        drop(stmt);
        drop(inner);

        Ok(Self {
            shared,
            sql: sql.to_string(),
            parameters,
            columns,
            bindings: Vec::new(),
            rows: VecDeque::new(),
            row_count: 0,
            fetch_mode,
            last_error: ErrorInfo::none(),
        })
    }

    fn index_of(&self, key: &ParamKey) -> Option<usize> {
        match key {
            ParamKey::Position(index) => {
                (1..=self.parameters.len()).contains(index).then_some(*index)
            }
            ParamKey::Named(_) => {
                let marker = key.marker()?;
                self.parameters
                    .iter()
                    .position(|name| name.as_deref() == Some(marker.as_str()))
                    .map(|slot| slot + 1)
            }
        }
    }

    fn bind(&mut self, key: &ParamKey, binding: Binding) -> Result<bool> {
        let Some(index) = self.index_of(key) else {
            return self.invalid_parameter(key);
        };
        if let Some(slot) = self.bindings.iter_mut().find(|(i, _)| *i == index) {
            slot.1 = binding;
        } else {
            self.bindings.push((index, binding));
        }
        Ok(true)
    }

    fn invalid_parameter(&mut self, key: &ParamKey) -> Result<bool> {
        let info = ErrorInfo {
            sqlstate: SQLSTATE_INVALID_PARAMETER.to_string(),
            driver_code: None,
            driver_message: Some(format!(
                "Invalid parameter number: parameter `{key}` is not defined"
            )),
        };
        self.last_error = info.clone();
        let mode = self.shared.lock().error_mode;
        report(mode, &info, false)
    }

    /// Values to bind, or the first key with no matching placeholder.
    fn values_for(
        &self,
        params: Option<&Params>,
    ) -> std::result::Result<Vec<(usize, Value)>, ParamKey> {
        match params {
            Some(params) => params
                .iter()
                .map(|(key, value)| {
                    self.index_of(key)
                        .map(|index| (index, value.clone()))
                        .ok_or_else(|| key.clone())
                })
                .collect(),
            None => Ok(self
                .bindings
                .iter()
                .map(|(index, binding)| (*index, binding.current()))
                .collect()),
        }
    }
}

fn run(
    conn: &RusqliteConnection,
    sql: &str,
    values: &[(usize, Value)],
    columns: &Arc<[String]>,
) -> rusqlite::Result<(Vec<Row>, u64)> {
    let mut stmt = conn.prepare(sql)?;
    for (index, value) in values {
        stmt.raw_bind_parameter(*index, to_sql(value))?;
    }

    let column_count = stmt.column_count();
    let mut rows = Vec::new();
    let mut result = stmt.raw_query();
    while let Some(row) = result.next()? {
        let values = (0..column_count)
            .map(|i| row.get_ref(i).map(from_sql))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.push(Row::new(Arc::clone(columns), values));
    }
    drop(result);

    let row_count = if column_count == 0 {
        conn.changes()
    } else {
        rows.len() as u64
    };
    Ok((rows, row_count))
}

impl PreparedStatement for SqliteStatement {
    fn query_string(&self) -> &str {
        &self.sql
    }

    fn bind_value(&mut self, param: ParamKey, value: Value, hint: ParamType) -> Result<bool> {
        self.bind(&param, Binding::Value(coerce(value, hint)))
    }

    fn bind_param(
        &mut self,
        param: ParamKey,
        variable: BoundVariable,
        hint: ParamType,
        _length: Option<usize>,
    ) -> Result<bool> {
        self.bind(&param, Binding::Variable(variable, hint))
    }

    fn execute(&mut self, params: Option<&Params>) -> Result<bool> {
        let values = match self.values_for(params) {
            Ok(values) => values,
            Err(key) => return self.invalid_parameter(&key),
        };

        let shared = Arc::clone(&self.shared);
        let mut inner = shared.lock();
        self.rows.clear();

        match run(&inner.conn, &self.sql, &values, &self.columns) {
            Ok((rows, row_count)) => {
                tracing::trace!(rows = rows.len(), row_count, "statement executed");
                self.rows = rows.into();
                self.row_count = row_count;
                self.last_error = ErrorInfo::none();
                Ok(true)
            }
            Err(e) => {
                let info = error_info(&e);
                self.row_count = 0;
                self.last_error = info.clone();
                inner.last_error = info.clone();
                let mode = inner.error_mode;
                drop(inner);
                report(mode, &info, false)
            }
        }
    }

    fn fetch(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    fn fetch_all(&mut self) -> Vec<Row> {
        self.rows.drain(..).collect()
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn set_fetch_mode(&mut self, mode: FetchMode) {
        self.fetch_mode = mode;
    }

    fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    fn error_code(&self) -> String {
        self.last_error.sqlstate.clone()
    }

    fn error_info(&self) -> ErrorInfo {
        self.last_error.clone()
    }
}
