//! Scripted in-memory driver for unit tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::attribute::{Attribute, AttributeCache, AttributeValue};
use crate::error::{Error, Result};
use crate::traits::{
    Connection, ConnectionParameters, Driver, ErrorInfo, PreparedStatement, StatementFactory,
    StatementOptions,
};
use crate::value::{BoundVariable, FetchMode, ParamKey, ParamType, Params, Row, Value};

#[derive(Debug, Default)]
struct ScriptState {
    connects: u32,
    disconnects: u32,
    fail_connect: bool,
    fail_executions: bool,
    reject_bindings: bool,
    fail_attributes: bool,
    applied: Vec<(Attribute, AttributeValue)>,
    executed: Vec<String>,
}

/// Shared knobs and observations of the mock driver.
#[derive(Debug, Clone, Default)]
pub struct Script {
    state: Arc<Mutex<ScriptState>>,
}

impl Script {
    pub fn fail_connect(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    pub fn fail_executions(&self, fail: bool) {
        self.state.lock().fail_executions = fail;
    }

    pub fn reject_bindings(&self, reject: bool) {
        self.state.lock().reject_bindings = reject;
    }

    pub fn fail_attributes(&self, fail: bool) {
        self.state.lock().fail_attributes = fail;
    }

    /// Physical connections opened so far.
    pub fn connects(&self) -> u32 {
        self.state.lock().connects
    }

    /// Physical connections dropped so far.
    pub fn disconnects(&self) -> u32 {
        self.state.lock().disconnects
    }

    /// Attributes applied to live connections, in application order.
    pub fn applied(&self) -> Vec<(Attribute, AttributeValue)> {
        self.state.lock().applied.clone()
    }

    /// SQL texts executed so far.
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    pub script: Script,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Driver for MockDriver {
    type Connection = MockConnection;

    fn connect(&self, params: &ConnectionParameters) -> Result<MockConnection> {
        let mut state = self.script.state.lock();
        if state.fail_connect {
            return Err(Error::connection(format!(
                "could not connect to {}",
                params.dsn()
            )));
        }
        state.connects += 1;
        drop(state);

        let mut conn = MockConnection {
            script: self.script.clone(),
            attributes: AttributeCache::new(),
            factory: None,
            in_transaction: false,
            last_id: 0,
        };
        for (attr, value) in params.options().iter() {
            conn.set_attribute(attr, value.clone())?;
        }
        Ok(conn)
    }

    fn check_attribute(&self, attr: Attribute, value: &AttributeValue) -> Result<()> {
        if attr == Attribute::Timeout && value.as_int().is_some_and(|secs| secs < 0) {
            return Err(Error::invalid_argument("timeout must not be negative"));
        }
        Ok(())
    }
}

pub struct MockConnection {
    script: Script,
    attributes: AttributeCache,
    factory: Option<Arc<dyn StatementFactory>>,
    in_transaction: bool,
    last_id: i64,
}

impl std::fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnection")
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.script.state.lock().disconnects += 1;
    }
}

impl MockConnection {
    fn produce(&self, stmt: MockStatement) -> Box<dyn PreparedStatement> {
        let stmt: Box<dyn PreparedStatement> = Box::new(stmt);
        match &self.factory {
            Some(factory) => factory.create(stmt),
            None => stmt,
        }
    }
}

impl Connection for MockConnection {
    fn begin_transaction(&mut self) -> Result<bool> {
        if self.in_transaction {
            return Err(Error::transaction("There is already an active transaction"));
        }
        self.in_transaction = true;
        Ok(true)
    }

    fn commit(&mut self) -> Result<bool> {
        if !self.in_transaction {
            return Err(Error::transaction("There is no active transaction"));
        }
        self.in_transaction = false;
        Ok(true)
    }

    fn rollback(&mut self) -> Result<bool> {
        self.commit()
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn exec(&mut self, sql: &str) -> Result<Option<u64>> {
        let mut state = self.script.state.lock();
        if state.fail_executions {
            return Ok(None);
        }
        state.executed.push(sql.to_string());
        self.last_id += 1;
        Ok(Some(1))
    }

    fn query(
        &mut self,
        sql: &str,
        fetch_mode: Option<FetchMode>,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        let mut stmt = MockStatement::new(sql, self.script.clone());
        if let Some(mode) = fetch_mode {
            stmt.set_fetch_mode(mode);
        }
        if !stmt.execute(None)? {
            return Ok(None);
        }
        Ok(Some(self.produce(stmt)))
    }

    fn prepare(
        &mut self,
        sql: &str,
        _options: &StatementOptions,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        Ok(Some(self.produce(MockStatement::new(sql, self.script.clone()))))
    }

    fn quote(&mut self, raw: &str, _hint: ParamType) -> Result<String> {
        Ok(format!("'{}'", raw.replace('\'', "''")))
    }

    fn get_attribute(&self, attr: Attribute) -> Result<AttributeValue> {
        Ok(match attr {
            Attribute::DriverName => AttributeValue::from("mock"),
            Attribute::ServerVersion | Attribute::ClientVersion => AttributeValue::from("1.0"),
            Attribute::ServerInfo | Attribute::ConnectionStatus => AttributeValue::from("up"),
            _ => self.attributes.get(attr).cloned().unwrap_or_default(),
        })
    }

    fn set_attribute(&mut self, attr: Attribute, value: AttributeValue) -> Result<bool> {
        attr.check_value(&value)?;
        if attr.is_read_only() || attr == Attribute::Ttl {
            return Ok(false);
        }
        if self.script.state.lock().fail_attributes {
            return Err(Error::invalid_argument(format!("attribute {attr} refused")));
        }
        if attr == Attribute::StatementClass {
            self.factory = value.as_statement_factory().cloned();
        }
        self.script.state.lock().applied.push((attr, value.clone()));
        self.attributes.set(attr, value);
        Ok(true)
    }

    fn error_code(&self) -> String {
        ErrorInfo::none().sqlstate
    }

    fn error_info(&self) -> ErrorInfo {
        ErrorInfo::none()
    }

    fn last_insert_id(&mut self, _name: Option<&str>) -> Result<String> {
        Ok(self.last_id.to_string())
    }
}

#[derive(Debug)]
pub struct MockStatement {
    sql: String,
    script: Script,
    fetch_mode: FetchMode,
    rows: Vec<Row>,
}

impl MockStatement {
    pub fn new(sql: &str, script: Script) -> Self {
        Self {
            sql: sql.to_string(),
            script,
            fetch_mode: FetchMode::default(),
            rows: Vec::new(),
        }
    }
}

impl PreparedStatement for MockStatement {
    fn query_string(&self) -> &str {
        &self.sql
    }

    fn bind_value(&mut self, _param: ParamKey, _value: Value, _hint: ParamType) -> Result<bool> {
        Ok(!self.script.state.lock().reject_bindings)
    }

    fn bind_param(
        &mut self,
        _param: ParamKey,
        _variable: BoundVariable,
        _hint: ParamType,
        _length: Option<usize>,
    ) -> Result<bool> {
        Ok(!self.script.state.lock().reject_bindings)
    }

    fn execute(&mut self, _params: Option<&Params>) -> Result<bool> {
        let mut state = self.script.state.lock();
        if state.fail_executions {
            return Ok(false);
        }
        state.executed.push(self.sql.clone());
        let columns: Arc<[String]> = vec!["one".to_string()].into();
        self.rows = vec![Row::new(columns, vec![Value::Int(1)])];
        Ok(true)
    }

    fn fetch(&mut self) -> Option<Row> {
        if self.rows.is_empty() {
            None
        } else {
            Some(self.rows.remove(0))
        }
    }

    fn fetch_all(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.rows)
    }

    fn row_count(&self) -> u64 {
        0
    }

    fn column_count(&self) -> usize {
        1
    }

    fn set_fetch_mode(&mut self, mode: FetchMode) {
        self.fetch_mode = mode;
    }

    fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    fn error_code(&self) -> String {
        ErrorInfo::none().sqlstate
    }

    fn error_info(&self) -> ErrorInfo {
        ErrorInfo::none()
    }
}
