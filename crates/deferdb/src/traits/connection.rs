//! Connection and driver traits.

use std::fmt;

use crate::attribute::{Attribute, AttributeCache, AttributeKey, AttributeValue};
use crate::error::Result;
use crate::profiling::LogSnapshot;
use crate::traits::PreparedStatement;
use crate::value::{FetchMode, ParamType, Params};

/// SQLSTATE meaning "no error".
pub const NO_ERROR_SQLSTATE: &str = "00000";

/// Everything needed to open a physical connection.
///
/// Immutable once built.
#[derive(Clone)]
pub struct ConnectionParameters {
    dsn: String,
    credentials: Option<(String, String)>,
    options: AttributeCache,
}

impl ConnectionParameters {
    #[must_use]
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            credentials: None,
            options: AttributeCache::new(),
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Driver option applied while connecting.
    #[must_use]
    pub fn with_option(mut self, attr: Attribute, value: impl Into<AttributeValue>) -> Self {
        self.options.set(attr, value.into());
        self
    }

    #[must_use]
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.credentials.as_ref().map(|(user, _)| user.as_str())
    }

    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.credentials.as_ref().map(|(_, password)| password.as_str())
    }

    #[must_use]
    pub const fn options(&self) -> &AttributeCache {
        &self.options
    }

    /// Driver name taken from the DSN scheme (`sqlite::memory:` → `sqlite`).
    #[must_use]
    pub fn driver_name(&self) -> &str {
        self.dsn.split_once(':').map_or("", |(scheme, _)| scheme)
    }

    /// DSN body after the scheme.
    #[must_use]
    pub fn dsn_body(&self) -> &str {
        self.dsn.split_once(':').map_or("", |(_, body)| body)
    }
}

impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("dsn", &self.dsn)
            .field("username", &self.username())
            .field("password", &self.credentials.as_ref().map(|_| "***"))
            .field("options", &self.options)
            .finish()
    }
}

/// Diagnostics of the last operation: `(sqlstate, driver code, driver message)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub sqlstate: String,
    pub driver_code: Option<i64>,
    pub driver_message: Option<String>,
}

impl ErrorInfo {
    /// The neutral "no error" value.
    #[must_use]
    pub fn none() -> Self {
        Self {
            sqlstate: NO_ERROR_SQLSTATE.to_string(),
            driver_code: None,
            driver_message: None,
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.sqlstate != NO_ERROR_SQLSTATE
    }
}

impl Default for ErrorInfo {
    fn default() -> Self {
        Self::none()
    }
}

/// Cursor requested for a prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorKind {
    #[default]
    ForwardOnly,
    Scrollable,
}

/// Driver options passed to `prepare`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementOptions {
    pub cursor: CursorKind,
    pub fetch_mode: Option<FetchMode>,
}

/// Establishes physical connections.
pub trait Driver: fmt::Debug {
    /// Physical connection type produced by this driver.
    type Connection: Connection;

    /// Open a connection. Rejected parameters fail with a connection error.
    fn connect(&self, params: &ConnectionParameters) -> Result<Self::Connection>;

    /// Reject a well-typed attribute value that connections of this driver
    /// would refuse, so it is not cached for replay.
    fn check_attribute(&self, attr: Attribute, value: &AttributeValue) -> Result<()> {
        let _ = (attr, value);
        Ok(())
    }
}

/// Operation surface of a database handle.
///
/// Implemented by the underlying client and by every decorator, so decorators
/// compose by holding an inner `Connection`. A handle is meant for one caller
/// at a time; concurrent use must be serialized by the caller.
///
/// Statement failures follow the configured [`ErrorMode`](crate::ErrorMode):
/// `None`/`false` in silent and warning mode, `Err` in exception mode.
pub trait Connection: fmt::Debug {
    /// Whether a physical connection currently exists.
    fn is_connected(&self) -> bool {
        true
    }

    fn begin_transaction(&mut self) -> Result<bool>;

    fn commit(&mut self) -> Result<bool>;

    fn rollback(&mut self) -> Result<bool>;

    fn in_transaction(&self) -> bool;

    /// Run a statement and return the number of affected rows.
    fn exec(&mut self, sql: &str) -> Result<Option<u64>>;

    /// Run a statement and return it, ready for fetching.
    fn query(
        &mut self,
        sql: &str,
        fetch_mode: Option<FetchMode>,
    ) -> Result<Option<Box<dyn PreparedStatement>>>;

    fn prepare(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> Result<Option<Box<dyn PreparedStatement>>>;

    /// Quote a string literal for inclusion in SQL text.
    fn quote(&mut self, raw: &str, hint: ParamType) -> Result<String>;

    fn get_attribute(&self, attr: Attribute) -> Result<AttributeValue>;

    fn set_attribute(&mut self, attr: Attribute, value: AttributeValue) -> Result<bool>;

    fn error_code(&self) -> String;

    fn error_info(&self) -> ErrorInfo;

    fn last_insert_id(&mut self, name: Option<&str>) -> Result<String>;

    /// Prepare `sql` and execute it with `params`.
    ///
    /// Returns the executed statement, or `None` when either step reported a
    /// failure.
    fn execute(
        &mut self,
        sql: &str,
        params: &Params,
        options: &StatementOptions,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        let Some(mut stmt) = self.prepare(sql, options)? else {
            return Ok(None);
        };
        if stmt.execute(Some(params))? {
            Ok(Some(stmt))
        } else {
            Ok(None)
        }
    }

    /// `get_attribute` for a raw integer or string key.
    fn get_attribute_by_key(&self, key: &AttributeKey) -> Result<AttributeValue> {
        self.get_attribute(Attribute::try_from(key)?)
    }

    /// `set_attribute` for a raw integer or string key.
    fn set_attribute_by_key(&mut self, key: &AttributeKey, value: AttributeValue) -> Result<bool> {
        let attr = Attribute::try_from(key)?;
        self.set_attribute(attr, value)
    }

    /// Profiling log snapshot, for handles that record one.
    fn profile(&self) -> Option<LogSnapshot> {
        None
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn begin_transaction(&mut self) -> Result<bool> {
        (**self).begin_transaction()
    }

    fn commit(&mut self) -> Result<bool> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<bool> {
        (**self).rollback()
    }

    fn in_transaction(&self) -> bool {
        (**self).in_transaction()
    }

    fn exec(&mut self, sql: &str) -> Result<Option<u64>> {
        (**self).exec(sql)
    }

    fn query(
        &mut self,
        sql: &str,
        fetch_mode: Option<FetchMode>,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        (**self).query(sql, fetch_mode)
    }

    fn prepare(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        (**self).prepare(sql, options)
    }

    fn quote(&mut self, raw: &str, hint: ParamType) -> Result<String> {
        (**self).quote(raw, hint)
    }

    fn get_attribute(&self, attr: Attribute) -> Result<AttributeValue> {
        (**self).get_attribute(attr)
    }

    fn set_attribute(&mut self, attr: Attribute, value: AttributeValue) -> Result<bool> {
        (**self).set_attribute(attr, value)
    }

    fn error_code(&self) -> String {
        (**self).error_code()
    }

    fn error_info(&self) -> ErrorInfo {
        (**self).error_info()
    }

    fn last_insert_id(&mut self, name: Option<&str>) -> Result<String> {
        (**self).last_insert_id(name)
    }

    fn execute(
        &mut self,
        sql: &str,
        params: &Params,
        options: &StatementOptions,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        (**self).execute(sql, params, options)
    }

    fn get_attribute_by_key(&self, key: &AttributeKey) -> Result<AttributeValue> {
        (**self).get_attribute_by_key(key)
    }

    fn set_attribute_by_key(&mut self, key: &AttributeKey, value: AttributeValue) -> Result<bool> {
        (**self).set_attribute_by_key(key, value)
    }

    fn profile(&self) -> Option<LogSnapshot> {
        (**self).profile()
    }
}
