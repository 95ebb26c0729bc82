//! Connection established on first use.

use std::time::Instant;

use crate::attribute::{Attribute, AttributeCache, AttributeValue};
use crate::error::{Error, Result};
use crate::traits::{
    Connection, ConnectionParameters, Driver, ErrorInfo, PreparedStatement, StatementOptions,
};
use crate::value::{FetchMode, ParamType};

/// Physical connection state.
#[derive(Debug)]
pub enum ConnectionState<C> {
    /// No physical connection.
    Disconnected,
    /// Active physical connection.
    Connected {
        handle: C,
        connected_at: Instant,
    },
}

impl<C> ConnectionState<C> {
    const fn handle(&self) -> Option<&C> {
        match self {
            Self::Connected { handle, .. } => Some(handle),
            Self::Disconnected => None,
        }
    }

    const fn handle_mut(&mut self) -> Option<&mut C> {
        match self {
            Self::Connected { handle, .. } => Some(handle),
            Self::Disconnected => None,
        }
    }
}

/// Connection handle that defers the physical connection until an operation
/// needs one.
///
/// Attributes set before that point are cached and replayed onto the new
/// connection in the order they were first set. Attributes set afterwards
/// are forwarded immediately and stay cached for later reconnects.
///
/// # Example
///
/// ```rust,ignore
/// use deferdb::{Connection, ConnectionParameters, LazyConnection};
///
/// let mut conn = LazyConnection::new(driver, ConnectionParameters::new("sqlite::memory:"));
/// assert!(!conn.is_connected());
/// conn.exec("CREATE TABLE t (v INTEGER)")?;
/// assert!(conn.is_connected());
/// ```
#[derive(Debug)]
pub struct LazyConnection<D: Driver> {
    driver: D,
    params: ConnectionParameters,
    attributes: AttributeCache,
    state: ConnectionState<D::Connection>,
}

impl<D: Driver> LazyConnection<D> {
    pub const fn new(driver: D, params: ConnectionParameters) -> Self {
        Self {
            driver,
            params,
            attributes: AttributeCache::new(),
            state: ConnectionState::Disconnected,
        }
    }

    /// Cache an attribute before first use.
    pub fn with_attribute(mut self, attr: Attribute, value: impl Into<AttributeValue>) -> Result<Self> {
        self.set_attribute(attr, value.into())?;
        Ok(self)
    }

    /// Establish the physical connection if there is none and return it.
    ///
    /// # Errors
    ///
    /// Returns the driver's connection error unchanged, or the error of the
    /// first cached attribute the new connection refuses. In both cases no
    /// connection is kept.
    pub fn connect(&mut self) -> Result<&mut D::Connection> {
        if self.state.handle().is_none() {
            let handle = self.open()?;
            self.state = ConnectionState::Connected {
                handle,
                connected_at: Instant::now(),
            };
        }
        self.state
            .handle_mut()
            .ok_or_else(|| Error::connection("connection was not established"))
    }

    fn open(&self) -> Result<D::Connection> {
        let driver = self.params.driver_name();
        let mut handle = self.driver.connect(&self.params).inspect_err(|e| {
            tracing::warn!(driver, error = %e, "connection failed");
        })?;

        for (attr, value) in self.attributes.iter() {
            if !handle.set_attribute(attr, value.clone())? {
                tracing::debug!(%attr, "cached attribute not applied");
            }
        }

        tracing::info!(driver, replayed = self.attributes.len(), "connected");
        Ok(handle)
    }

    /// Drop the physical connection. Returns whether one existed.
    pub fn disconnect(&mut self) -> bool {
        let was_connected = self.state.handle().is_some();
        self.state = ConnectionState::Disconnected;
        if was_connected {
            tracing::debug!(driver = self.params.driver_name(), "disconnected");
        }
        was_connected
    }

    /// When the current physical connection was established.
    #[must_use]
    pub const fn connected_at(&self) -> Option<Instant> {
        match &self.state {
            ConnectionState::Connected { connected_at, .. } => Some(*connected_at),
            ConnectionState::Disconnected => None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ConnectionState<D::Connection> {
        &self.state
    }

    #[must_use]
    pub const fn parameters(&self) -> &ConnectionParameters {
        &self.params
    }

    #[must_use]
    pub const fn attributes(&self) -> &AttributeCache {
        &self.attributes
    }
}

/// The TTL key belongs to [`ReconnectingConnection`](crate::ReconnectingConnection).
fn reject_ttl(attr: Attribute) -> Result<()> {
    if attr == Attribute::Ttl {
        return Err(Error::invalid_argument(format!(
            "attribute {attr} requires a reconnecting connection"
        )));
    }
    Ok(())
}

impl<D: Driver> Connection for LazyConnection<D> {
    fn is_connected(&self) -> bool {
        self.state.handle().is_some()
    }

    fn begin_transaction(&mut self) -> Result<bool> {
        self.connect()?.begin_transaction()
    }

    fn commit(&mut self) -> Result<bool> {
        self.connect()?.commit()
    }

    fn rollback(&mut self) -> Result<bool> {
        self.connect()?.rollback()
    }

    fn in_transaction(&self) -> bool {
        self.state.handle().is_some_and(Connection::in_transaction)
    }

    fn exec(&mut self, sql: &str) -> Result<Option<u64>> {
        self.connect()?.exec(sql)
    }

    fn query(
        &mut self,
        sql: &str,
        fetch_mode: Option<FetchMode>,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        self.connect()?.query(sql, fetch_mode)
    }

    fn prepare(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        self.connect()?.prepare(sql, options)
    }

    fn quote(&mut self, raw: &str, hint: ParamType) -> Result<String> {
        self.connect()?.quote(raw, hint)
    }

    fn get_attribute(&self, attr: Attribute) -> Result<AttributeValue> {
        reject_ttl(attr)?;
        if let Some(handle) = self.state.handle() {
            return handle.get_attribute(attr);
        }
        Ok(match attr {
            Attribute::DriverName => AttributeValue::from(self.params.driver_name()),
            Attribute::ServerInfo | Attribute::ServerVersion | Attribute::ConnectionStatus => {
                AttributeValue::from("")
            }
            _ => self.attributes.get(attr).cloned().unwrap_or_default(),
        })
    }

    /// Only values the connection would accept are cached for replay: a
    /// live connection must apply the value, otherwise the driver checks it.
    fn set_attribute(&mut self, attr: Attribute, value: AttributeValue) -> Result<bool> {
        reject_ttl(attr)?;
        attr.check_value(&value)?;

        if let Some(handle) = self.state.handle_mut() {
            let applied = handle.set_attribute(attr, value.clone())?;
            if applied && !attr.is_read_only() {
                self.attributes.set(attr, value);
            }
            return Ok(applied);
        }

        if attr.is_read_only() {
            return Ok(false);
        }
        self.driver.check_attribute(attr, &value)?;
        self.attributes.set(attr, value);
        Ok(true)
    }

    fn error_code(&self) -> String {
        self.state
            .handle()
            .map_or_else(|| ErrorInfo::none().sqlstate, Connection::error_code)
    }

    fn error_info(&self) -> ErrorInfo {
        self.state
            .handle()
            .map_or_else(ErrorInfo::none, Connection::error_info)
    }

    fn last_insert_id(&mut self, name: Option<&str>) -> Result<String> {
        match self.state.handle_mut() {
            Some(handle) => handle.last_insert_id(name),
            None => Ok(String::new()),
        }
    }
}
