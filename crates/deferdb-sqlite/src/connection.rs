//! SQLite connection.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use deferdb::{
    Attribute, AttributeValue, Connection, Error, ErrorInfo, ErrorMode, FetchMode, ParamType,
    PreparedStatement, Result, StatementFactory, StatementOptions,
};
use parking_lot::Mutex;
use rusqlite::Connection as RusqliteConnection;

use crate::convert::{busy_timeout, error_info, report};
use crate::statement::SqliteStatement;

/// Busy timeout rusqlite installs on open.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared connection type for statements prepared on it.
pub(crate) type SharedSqlite = Arc<Mutex<SqliteInner>>;

/// Connection state shared with statements.
#[derive(Debug)]
pub(crate) struct SqliteInner {
    pub(crate) conn: RusqliteConnection,
    pub(crate) error_mode: ErrorMode,
    pub(crate) last_error: ErrorInfo,
    pub(crate) default_fetch_mode: FetchMode,
    pub(crate) factory: Option<Arc<dyn StatementFactory>>,
    pub(crate) timeout: Duration,
}

impl SqliteInner {
    pub(crate) fn new(conn: RusqliteConnection) -> Self {
        Self {
            conn,
            error_mode: ErrorMode::default(),
            last_error: ErrorInfo::none(),
            default_fetch_mode: FetchMode::default(),
            factory: None,
            timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    fn fail<T>(&mut self, err: &rusqlite::Error, sentinel: T) -> Result<T> {
        let info = error_info(err);
        self.last_error = info.clone();
        report(self.error_mode, &info, sentinel)
    }
}

/// Physical SQLite connection.
///
/// Statement failures follow the connection's [`ErrorMode`]; transaction
/// misuse always fails with a transaction error.
#[derive(Debug)]
pub struct SqliteConnection {
    shared: SharedSqlite,
}

impl SqliteConnection {
    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = RusqliteConnection::open_in_memory().map_err(|e| {
            Error::connection(format!("Failed to open in-memory database: {e}"))
        })?;
        tracing::debug!("SQLite in-memory database opened");
        Ok(Self::from_rusqlite(conn))
    }

    /// Open or create the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if path.as_os_str().is_empty() {
            return Err(Error::connection("Missing SQLite database path"));
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            return Err(Error::connection(format!(
                "Parent directory does not exist: {}",
                parent.display()
            )));
        }

        let conn = RusqliteConnection::open(path).map_err(|e| {
            Error::connection(format!(
                "Failed to open SQLite database at '{}': {e}",
                path.display()
            ))
        })?;
        tracing::debug!(path = %path.display(), "SQLite database opened");
        Ok(Self::from_rusqlite(conn))
    }

    fn from_rusqlite(conn: RusqliteConnection) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SqliteInner::new(conn))),
        }
    }

    fn prepare_raw(&self, sql: &str) -> Result<Option<SqliteStatement>> {
        match SqliteStatement::prepare(Arc::clone(&self.shared), sql) {
            Ok(stmt) => Ok(Some(stmt)),
            Err(e) => self.shared.lock().fail(&e, None),
        }
    }

    fn produce(&self, stmt: SqliteStatement) -> Box<dyn PreparedStatement> {
        let factory = self.shared.lock().factory.clone();
        let stmt: Box<dyn PreparedStatement> = Box::new(stmt);
        match factory {
            Some(factory) => factory.create(stmt),
            None => stmt,
        }
    }

    fn control(&self, sql: &str) -> Result<bool> {
        let mut inner = self.shared.lock();
        match inner.conn.execute_batch(sql) {
            Ok(()) => {
                inner.last_error = ErrorInfo::none();
                Ok(true)
            }
            Err(e) => inner.fail(&e, false),
        }
    }
}

impl Connection for SqliteConnection {
    fn begin_transaction(&mut self) -> Result<bool> {
        if self.in_transaction() {
            return Err(Error::transaction("There is already an active transaction"));
        }
        self.control("BEGIN")
    }

    fn commit(&mut self) -> Result<bool> {
        if !self.in_transaction() {
            return Err(Error::transaction("There is no active transaction"));
        }
        self.control("COMMIT")
    }

    fn rollback(&mut self) -> Result<bool> {
        if !self.in_transaction() {
            return Err(Error::transaction("There is no active transaction"));
        }
        self.control("ROLLBACK")
    }

    fn in_transaction(&self) -> bool {
        !self.shared.lock().conn.is_autocommit()
    }

    /// Rows changed by the most recent data-modifying statement.
    fn exec(&mut self, sql: &str) -> Result<Option<u64>> {
        let mut inner = self.shared.lock();
        match inner.conn.execute_batch(sql) {
            Ok(()) => {
                inner.last_error = ErrorInfo::none();
                Ok(Some(inner.conn.changes()))
            }
            Err(e) => inner.fail(&e, None),
        }
    }

    fn query(
        &mut self,
        sql: &str,
        fetch_mode: Option<FetchMode>,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        let Some(mut stmt) = self.prepare_raw(sql)? else {
            return Ok(None);
        };
        if let Some(mode) = fetch_mode {
            stmt.set_fetch_mode(mode);
        }
        if !stmt.execute(None)? {
            return Ok(None);
        }
        Ok(Some(self.produce(stmt)))
    }

    /// Rows are always buffered, so the cursor kind has no effect.
    fn prepare(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        let Some(mut stmt) = self.prepare_raw(sql)? else {
            return Ok(None);
        };
        if let Some(mode) = options.fetch_mode {
            stmt.set_fetch_mode(mode);
        }
        Ok(Some(self.produce(stmt)))
    }

    fn quote(&mut self, raw: &str, _hint: ParamType) -> Result<String> {
        Ok(format!("'{}'", raw.replace('\'', "''")))
    }

    fn get_attribute(&self, attr: Attribute) -> Result<AttributeValue> {
        let inner = self.shared.lock();
        Ok(match attr {
            Attribute::DriverName => AttributeValue::from(crate::DRIVER_NAME),
            Attribute::ServerVersion | Attribute::ClientVersion => {
                AttributeValue::from(rusqlite::version())
            }
            Attribute::ServerInfo => AttributeValue::Str(format!("SQLite {}", rusqlite::version())),
            Attribute::ConnectionStatus => AttributeValue::from("open"),
            Attribute::Timeout => AttributeValue::seconds(inner.timeout),
            Attribute::ErrorMode => AttributeValue::ErrorMode(inner.error_mode),
            Attribute::DefaultFetchMode => AttributeValue::FetchMode(inner.default_fetch_mode),
            Attribute::StatementClass => inner
                .factory
                .clone()
                .map_or(AttributeValue::NotSet, AttributeValue::StatementClass),
            Attribute::Ttl => AttributeValue::NotSet,
        })
    }

    fn set_attribute(&mut self, attr: Attribute, value: AttributeValue) -> Result<bool> {
        attr.check_value(&value)?;
        let mut inner = self.shared.lock();
        let applied = match (attr, &value) {
            (Attribute::Timeout, AttributeValue::Int(secs)) => {
                let timeout = busy_timeout(*secs)?;
                if let Err(e) = inner.conn.busy_timeout(timeout) {
                    return inner.fail(&e, false);
                }
                inner.timeout = timeout;
                true
            }
            (Attribute::ErrorMode, AttributeValue::ErrorMode(mode)) => {
                inner.error_mode = *mode;
                true
            }
            (Attribute::DefaultFetchMode, AttributeValue::FetchMode(mode)) => {
                inner.default_fetch_mode = *mode;
                true
            }
            (Attribute::StatementClass, _) => {
                inner.factory = value.as_statement_factory().cloned();
                true
            }
            _ => false,
        };

        tracing::debug!(%attr, ?value, applied, "attribute set");
        Ok(applied)
    }

    fn error_code(&self) -> String {
        self.shared.lock().last_error.sqlstate.clone()
    }

    fn error_info(&self) -> ErrorInfo {
        self.shared.lock().last_error.clone()
    }

    /// Rowid of the last insert; sequence names are not supported by SQLite.
    fn last_insert_id(&mut self, _name: Option<&str>) -> Result<String> {
        Ok(self.shared.lock().conn.last_insert_rowid().to_string())
    }
}
