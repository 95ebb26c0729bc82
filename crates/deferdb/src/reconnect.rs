//! Time-boxed reconnection.

use std::time::{Duration, Instant};

use crate::attribute::{Attribute, AttributeValue};
use crate::error::{Error, Result};
use crate::lazy::LazyConnection;
use crate::traits::{Connection, Driver, ErrorInfo, PreparedStatement, StatementOptions};
use crate::value::{FetchMode, ParamType};

/// TTL used when none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Connection that is dropped and re-established once it is older than its
/// TTL, unless a transaction is open on it.
///
/// Expiry is checked when the next operation needs the connection; there is
/// no background timer. The TTL can be changed at any time through
/// [`set_ttl`](Self::set_ttl) or the `"ttl"` attribute and applies from the
/// next operation on.
#[derive(Debug)]
pub struct ReconnectingConnection<D: Driver> {
    lazy: LazyConnection<D>,
    ttl: Duration,
    last_connected_at: Option<Instant>,
    connection_count: u64,
}

impl<D: Driver> ReconnectingConnection<D> {
    /// Wrap `lazy` with the default TTL.
    pub fn new(lazy: LazyConnection<D>) -> Self {
        let last_connected_at = lazy.connected_at();
        Self {
            connection_count: u64::from(last_connected_at.is_some()),
            lazy,
            ttl: DEFAULT_TTL,
            last_connected_at,
        }
    }

    /// Wrap `lazy` with the given TTL.
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument error for a zero TTL.
    pub fn with_ttl(lazy: LazyConnection<D>, ttl: Duration) -> Result<Self> {
        let mut conn = Self::new(lazy);
        conn.set_ttl(ttl)?;
        Ok(conn)
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Change the TTL. Takes effect at the next operation.
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument error for a zero TTL.
    pub fn set_ttl(&mut self, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(Error::invalid_argument("ttl must be positive"));
        }
        self.ttl = ttl;
        Ok(())
    }

    /// Physical connections established so far. Never reset.
    #[must_use]
    pub const fn connection_count(&self) -> u64 {
        self.connection_count
    }

    #[must_use]
    pub const fn last_connected_at(&self) -> Option<Instant> {
        self.last_connected_at
    }

    #[must_use]
    pub const fn lazy(&self) -> &LazyConnection<D> {
        &self.lazy
    }

    fn is_expired(&self) -> bool {
        self.last_connected_at
            .is_none_or(|connected_at| connected_at.elapsed() > self.ttl)
    }

    /// Return a live connection, replacing an expired one first.
    ///
    /// An open transaction keeps the current connection regardless of age.
    ///
    /// # Errors
    ///
    /// Propagates connection errors of the wrapped [`LazyConnection`].
    pub fn resolve(&mut self) -> Result<&mut D::Connection> {
        if self.lazy.is_connected() {
            if self.lazy.in_transaction() || !self.is_expired() {
                return self.lazy.connect();
            }
            tracing::info!(
                ttl_ms = self.ttl.as_millis(),
                connection_count = self.connection_count,
                "connection expired, reconnecting"
            );
            self.lazy.disconnect();
        }

        self.lazy.connect()?;
        self.last_connected_at = Some(Instant::now());
        self.connection_count += 1;
        self.lazy.connect()
    }
}

/// Whole seconds reported through the `"ttl"` attribute, rounded up so a
/// sub-second TTL still reads back as a valid positive value.
fn ttl_attribute_secs(ttl: Duration) -> i64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    i64::try_from(secs).unwrap_or(i64::MAX)
}

impl<D: Driver> Connection for ReconnectingConnection<D> {
    fn is_connected(&self) -> bool {
        self.lazy.is_connected()
    }

    fn begin_transaction(&mut self) -> Result<bool> {
        self.resolve()?.begin_transaction()
    }

    fn commit(&mut self) -> Result<bool> {
        self.resolve()?.commit()
    }

    fn rollback(&mut self) -> Result<bool> {
        self.resolve()?.rollback()
    }

    fn in_transaction(&self) -> bool {
        self.lazy.in_transaction()
    }

    fn exec(&mut self, sql: &str) -> Result<Option<u64>> {
        self.resolve()?.exec(sql)
    }

    fn query(
        &mut self,
        sql: &str,
        fetch_mode: Option<FetchMode>,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        self.resolve()?.query(sql, fetch_mode)
    }

    fn prepare(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> Result<Option<Box<dyn PreparedStatement>>> {
        self.resolve()?.prepare(sql, options)
    }

    fn quote(&mut self, raw: &str, hint: ParamType) -> Result<String> {
        self.resolve()?.quote(raw, hint)
    }

    fn get_attribute(&self, attr: Attribute) -> Result<AttributeValue> {
        if attr == Attribute::Ttl {
            return Ok(AttributeValue::Int(ttl_attribute_secs(self.ttl)));
        }
        self.lazy.get_attribute(attr)
    }

    fn set_attribute(&mut self, attr: Attribute, value: AttributeValue) -> Result<bool> {
        if attr == Attribute::Ttl {
            let secs = value
                .as_int()
                .and_then(|secs| u64::try_from(secs).ok())
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "ttl must be a positive integer, got {value:?}"
                    ))
                })?;
            self.set_ttl(Duration::from_secs(secs))?;
            return Ok(true);
        }
        self.lazy.set_attribute(attr, value)
    }

    fn error_code(&self) -> String {
        self.lazy.error_code()
    }

    fn error_info(&self) -> ErrorInfo {
        self.lazy.error_info()
    }

    fn last_insert_id(&mut self, name: Option<&str>) -> Result<String> {
        self.lazy.last_insert_id(name)
    }
}

#[cfg(test)]
mod tests {
    use std::thread::sleep;

    use super::*;
    use crate::attribute::{AttributeKey, ErrorMode};
    use crate::testing::MockDriver;
    use crate::traits::ConnectionParameters;

    const SHORT: Duration = Duration::from_millis(40);
    const PAST_SHORT: Duration = Duration::from_millis(80);

    fn reconnecting(ttl: Duration) -> (ReconnectingConnection<MockDriver>, MockDriver) {
        let driver = MockDriver::new();
        let lazy = LazyConnection::new(driver.clone(), ConnectionParameters::new("mock:db"));
        (ReconnectingConnection::with_ttl(lazy, ttl).unwrap(), driver)
    }

    #[test]
    fn test_defaults() {
        let (conn, driver) = reconnecting(DEFAULT_TTL);
        assert_eq!(conn.ttl(), Duration::from_secs(60));
        assert_eq!(conn.connection_count(), 0);
        assert!(!conn.is_connected());
        assert!(conn.last_connected_at().is_none());
        assert_eq!(driver.script.connects(), 0);
    }

    #[test]
    fn test_reuses_connection_within_ttl() {
        let (mut conn, driver) = reconnecting(DEFAULT_TTL);
        conn.exec("SELECT 1").unwrap();
        conn.exec("SELECT 2").unwrap();

        assert_eq!(conn.connection_count(), 1);
        assert_eq!(driver.script.connects(), 1);
        assert!(conn.last_connected_at().is_some());
    }

    #[test]
    fn test_reconnects_after_ttl() {
        let (mut conn, driver) = reconnecting(SHORT);
        conn.set_attribute(Attribute::ErrorMode, ErrorMode::Silent.into())
            .unwrap();
        conn.exec("SELECT 1").unwrap();
        sleep(PAST_SHORT);
        conn.exec("SELECT 1").unwrap();

        assert_eq!(conn.connection_count(), 2);
        assert_eq!(driver.script.connects(), 2);
        assert_eq!(driver.script.disconnects(), 1);
        assert_eq!(driver.script.applied().len(), 2);
    }

    #[test]
    fn test_open_transaction_survives_ttl() {
        let (mut conn, driver) = reconnecting(SHORT);
        conn.begin_transaction().unwrap();
        sleep(PAST_SHORT);

        conn.exec("UPDATE t SET v = 1").unwrap();
        assert_eq!(conn.connection_count(), 1);
        assert!(conn.commit().unwrap());
        assert_eq!(driver.script.connects(), 1);

        conn.exec("SELECT 1").unwrap();
        assert_eq!(conn.connection_count(), 2);
    }

    #[test]
    fn test_ttl_attribute() {
        let (mut conn, _) = reconnecting(DEFAULT_TTL);
        let key = AttributeKey::from("ttl");

        assert!(conn.set_attribute_by_key(&key, AttributeValue::Int(30)).unwrap());
        assert_eq!(conn.ttl(), Duration::from_secs(30));
        assert_eq!(
            conn.get_attribute_by_key(&key).unwrap(),
            AttributeValue::Int(30)
        );
    }

    #[test]
    fn test_sub_second_ttl_attribute_roundtrip() {
        let (mut conn, _) = reconnecting(Duration::from_millis(500));
        let reported = conn.get_attribute(Attribute::Ttl).unwrap();
        assert_eq!(reported, AttributeValue::Int(1));

        assert!(conn.set_attribute(Attribute::Ttl, reported.clone()).unwrap());
        assert_eq!(conn.ttl(), Duration::from_secs(1));
        assert_eq!(conn.get_attribute(Attribute::Ttl).unwrap(), reported);

        conn.set_ttl(Duration::from_millis(1500)).unwrap();
        assert_eq!(
            conn.get_attribute(Attribute::Ttl).unwrap(),
            AttributeValue::Int(2)
        );
    }

    #[test]
    fn test_refused_attribute_does_not_block_reconnect() {
        let (mut conn, driver) = reconnecting(SHORT);
        conn.exec("SELECT 1").unwrap();

        driver.script.fail_attributes(true);
        assert!(
            conn.set_attribute(Attribute::Timeout, AttributeValue::Int(3))
                .is_err()
        );
        driver.script.fail_attributes(false);

        sleep(PAST_SHORT);
        conn.exec("SELECT 1").unwrap();
        assert_eq!(conn.connection_count(), 2);
        assert!(conn.is_connected());
    }

    #[test]
    fn test_invalid_ttl_values() {
        let (mut conn, _) = reconnecting(DEFAULT_TTL);
        for value in [
            AttributeValue::Int(0),
            AttributeValue::Int(-5),
            AttributeValue::from("30"),
            AttributeValue::NotSet,
        ] {
            let err = conn.set_attribute(Attribute::Ttl, value).unwrap_err();
            assert!(err.is_invalid_argument());
        }
        assert_eq!(conn.ttl(), DEFAULT_TTL);
        assert!(conn.set_ttl(Duration::ZERO).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_zero_ttl_rejected_at_construction() {
        let lazy = LazyConnection::new(MockDriver::new(), ConnectionParameters::new("mock:db"));
        let err = ReconnectingConnection::with_ttl(lazy, Duration::ZERO).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_ttl_change_after_connect_applies_next_time() {
        let (mut conn, _) = reconnecting(DEFAULT_TTL);
        conn.exec("SELECT 1").unwrap();
        conn.set_ttl(SHORT).unwrap();
        sleep(PAST_SHORT);

        conn.exec("SELECT 1").unwrap();
        assert_eq!(conn.connection_count(), 2);
    }

    #[test]
    fn test_failed_connect_is_not_counted() {
        let (mut conn, driver) = reconnecting(DEFAULT_TTL);
        driver.script.fail_connect(true);
        assert!(conn.exec("SELECT 1").unwrap_err().is_connection());
        assert_eq!(conn.connection_count(), 0);

        driver.script.fail_connect(false);
        conn.exec("SELECT 1").unwrap();
        assert_eq!(conn.connection_count(), 1);
    }

    #[test]
    fn test_inspection_does_not_connect() {
        let (mut conn, driver) = reconnecting(DEFAULT_TTL);
        assert_eq!(conn.error_code(), "00000");
        assert_eq!(conn.last_insert_id(None).unwrap(), "");
        assert_eq!(
            conn.get_attribute(Attribute::DriverName).unwrap(),
            AttributeValue::from("mock")
        );
        assert_eq!(driver.script.connects(), 0);
    }

    #[test]
    fn test_wrapping_connected_lazy_keeps_connection() {
        let driver = MockDriver::new();
        let mut lazy = LazyConnection::new(driver.clone(), ConnectionParameters::new("mock:db"));
        lazy.connect().unwrap();

        let mut conn = ReconnectingConnection::new(lazy);
        conn.exec("SELECT 1").unwrap();
        assert_eq!(conn.connection_count(), 1);
        assert_eq!(driver.script.connects(), 1);
    }
}
