//! Connection configuration builder

use std::fmt;
use std::time::Duration;

use crate::attribute::{Attribute, AttributeValue, ErrorMode};
use crate::error::{Error, Result};
use crate::lazy::LazyConnection;
use crate::profiling::ProfilingConnection;
use crate::reconnect::ReconnectingConnection;
use crate::traits::{Connection, ConnectionParameters, Driver};

/// Resolved connection configuration
#[derive(Clone)]
pub struct ConnectionConfig {
    pub dsn: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub error_mode: Option<ErrorMode>,
    pub timeout: Option<Duration>,
    /// Reconnect TTL; `None` disables the reconnecting layer.
    pub ttl: Option<Duration>,
    pub profiling: bool,
    pub logging: LoggingConfig,
}

impl ConnectionConfig {
    #[must_use]
    pub const fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new()
    }

    /// Connection parameters for the driver, with connect options applied.
    #[must_use]
    pub fn parameters(&self) -> ConnectionParameters {
        let mut params = ConnectionParameters::new(self.dsn.clone());
        if let Some(username) = &self.username {
            params = params.with_credentials(
                username.clone(),
                self.password.clone().unwrap_or_default(),
            );
        }
        if let Some(mode) = self.error_mode {
            params = params.with_option(Attribute::ErrorMode, mode);
        }
        if let Some(timeout) = self.timeout {
            params = params.with_option(Attribute::Timeout, AttributeValue::seconds(timeout));
        }
        params
    }

    /// Build the decorated handle: lazy, then reconnecting when a TTL is
    /// set, then profiling when enabled. Nothing connects here.
    pub fn open<D>(&self, driver: D) -> Result<Box<dyn Connection>>
    where
        D: Driver + 'static,
        D::Connection: 'static,
    {
        let lazy = LazyConnection::new(driver, self.parameters());
        let conn: Box<dyn Connection> = match self.ttl {
            Some(ttl) => Box::new(ReconnectingConnection::with_ttl(lazy, ttl)?),
            None => Box::new(lazy),
        };

        tracing::debug!(
            driver = self.parameters().driver_name(),
            reconnect = self.ttl.is_some(),
            profiling = self.profiling,
            "connection handle opened"
        );

        if self.profiling {
            Ok(Box::new(ProfilingConnection::new(conn)?))
        } else {
            Ok(conn)
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("dsn", &self.dsn)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("error_mode", &self.error_mode)
            .field("timeout", &self.timeout)
            .field("ttl", &self.ttl)
            .field("profiling", &self.profiling)
            .field("logging", &self.logging)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    pub log_level: String,
    pub json_logs: bool,
}

/// Configuration builder with fluent API
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    dsn: Option<String>,
    username: Option<String>,
    password: Option<String>,
    error_mode: Option<ErrorMode>,
    timeout: Option<Duration>,
    ttl: Option<Duration>,
    profiling: bool,
    logging: LoggingConfig,
}

impl ConnectionConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dsn: None,
            username: None,
            password: None,
            error_mode: None,
            timeout: None,
            ttl: None,
            profiling: false,
            logging: LoggingConfig {
                log_level: String::new(),
                json_logs: false,
            },
        }
    }

    #[must_use]
    pub fn dsn(mut self, dsn: impl Into<String>) -> Self {
        self.dsn = Some(dsn.into());
        self
    }

    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub const fn error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = Some(mode);
        self
    }

    /// Busy timeout passed to the driver on connect
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable reconnection with the given TTL
    #[must_use]
    pub const fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub const fn profiling(mut self, enabled: bool) -> Self {
        self.profiling = enabled;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.log_level = level.into();
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.logging.json_logs = enabled;
        self
    }

    pub fn build(self) -> Result<ConnectionConfig> {
        let dsn = self
            .dsn
            .filter(|dsn| !dsn.is_empty())
            .ok_or_else(|| Error::config("DSN is required"))?;

        if !dsn.contains(':') {
            return Err(Error::config(format!(
                "Invalid DSN `{dsn}`: expected `<driver>:<body>`"
            )));
        }

        if self.ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(Error::config("Reconnect TTL must be positive"));
        }

        Ok(ConnectionConfig {
            dsn,
            username: self.username,
            password: self.password,
            error_mode: self.error_mode,
            timeout: self.timeout,
            ttl: self.ttl,
            profiling: self.profiling,
            logging: self.logging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDriver;
    use crate::traits::StatementOptions;
    use crate::value::Params;

    #[test]
    fn test_builder_minimal() {
        let config = ConnectionConfigBuilder::new()
            .dsn("sqlite::memory:")
            .build()
            .unwrap();

        assert_eq!(config.dsn, "sqlite::memory:");
        assert!(config.ttl.is_none());
        assert!(!config.profiling);
        assert!(config.parameters().options().is_empty());
    }

    #[test]
    fn test_builder_requires_dsn() {
        let err = ConnectionConfigBuilder::new().build().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("DSN is required"));
    }

    #[test]
    fn test_builder_rejects_dsn_without_scheme() {
        let err = ConnectionConfig::builder().dsn("memory").build().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_builder_rejects_zero_ttl() {
        let err = ConnectionConfig::builder()
            .dsn("mock:db")
            .ttl(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_parameters_carry_options() {
        let config = ConnectionConfig::builder()
            .dsn("mock:db")
            .username("app")
            .password("hunter2")
            .error_mode(ErrorMode::Warning)
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap();

        assert!(!format!("{config:?}").contains("hunter2"));

        let params = config.parameters();
        assert_eq!(params.username(), Some("app"));
        assert_eq!(params.password(), Some("hunter2"));
        assert_eq!(
            params.options().get(Attribute::ErrorMode),
            Some(&AttributeValue::ErrorMode(ErrorMode::Warning))
        );
        assert_eq!(
            params.options().get(Attribute::Timeout),
            Some(&AttributeValue::Int(3))
        );
    }

    #[test]
    fn test_open_plain_is_lazy() {
        let driver = MockDriver::new();
        let config = ConnectionConfig::builder().dsn("mock:db").build().unwrap();
        let mut conn = config.open(driver.clone()).unwrap();

        assert!(!conn.is_connected());
        assert!(conn.profile().is_none());
        conn.exec("SELECT 1").unwrap();
        assert_eq!(driver.script.connects(), 1);
    }

    #[test]
    fn test_open_full_stack() {
        let driver = MockDriver::new();
        let config = ConnectionConfig::builder()
            .dsn("mock:db")
            .ttl(Duration::from_secs(5))
            .profiling(true)
            .build()
            .unwrap();
        let mut conn = config.open(driver.clone()).unwrap();

        assert_eq!(
            conn.get_attribute(Attribute::Ttl).unwrap(),
            AttributeValue::Int(5)
        );
        assert_eq!(driver.script.connects(), 0);

        conn.execute("SELECT 1", &Params::new(), &StatementOptions::default())
            .unwrap()
            .unwrap();
        conn.exec("SELECT 2").unwrap();

        let profile = conn.profile().unwrap();
        assert_eq!(profile.total_count, 2);
        assert_eq!(driver.script.connects(), 1);
    }
}
