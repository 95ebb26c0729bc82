//! Connection attributes.
//!
//! The attribute bag of the underlying client is modelled as a closed set of
//! keys, each with an expected value type. Raw keys arriving as integers or
//! strings go through [`AttributeKey`] and are rejected when unrecognized.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::traits::StatementFactory;
use crate::value::FetchMode;

/// String key of the reconnect TTL pseudo-attribute.
pub const TTL_KEY: &str = "ttl";

/// Recognized connection attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Busy/lock timeout in whole seconds.
    Timeout,
    /// How statement failures are reported.
    ErrorMode,
    /// Server version (read-only).
    ServerVersion,
    /// Client library version (read-only).
    ClientVersion,
    /// Server information (read-only).
    ServerInfo,
    /// Connection status (read-only).
    ConnectionStatus,
    /// Factory every produced statement passes through.
    StatementClass,
    /// Driver name (read-only).
    DriverName,
    /// Fetch mode applied to new statements.
    DefaultFetchMode,
    /// Reconnect time-to-live in whole seconds.
    Ttl,
}

impl Attribute {
    /// Integer code of the attribute, `None` for string-keyed ones.
    #[must_use]
    pub const fn code(self) -> Option<i64> {
        match self {
            Self::Timeout => Some(2),
            Self::ErrorMode => Some(3),
            Self::ServerVersion => Some(4),
            Self::ClientVersion => Some(5),
            Self::ServerInfo => Some(6),
            Self::ConnectionStatus => Some(7),
            Self::StatementClass => Some(13),
            Self::DriverName => Some(16),
            Self::DefaultFetchMode => Some(19),
            Self::Ttl => None,
        }
    }

    /// Attribute for an integer code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            2 => Some(Self::Timeout),
            3 => Some(Self::ErrorMode),
            4 => Some(Self::ServerVersion),
            5 => Some(Self::ClientVersion),
            6 => Some(Self::ServerInfo),
            7 => Some(Self::ConnectionStatus),
            13 => Some(Self::StatementClass),
            16 => Some(Self::DriverName),
            19 => Some(Self::DefaultFetchMode),
            _ => None,
        }
    }

    /// Status attributes that only the live connection can answer.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::ServerVersion
                | Self::ClientVersion
                | Self::ServerInfo
                | Self::ConnectionStatus
                | Self::DriverName
        )
    }

    /// Check that `value` has the type this attribute expects.
    pub fn check_value(self, value: &AttributeValue) -> Result<()> {
        let ok = match self {
            Self::Timeout | Self::Ttl => matches!(value, AttributeValue::Int(_)),
            Self::ErrorMode => matches!(value, AttributeValue::ErrorMode(_)),
            Self::DefaultFetchMode => matches!(value, AttributeValue::FetchMode(_)),
            Self::StatementClass => {
                matches!(value, AttributeValue::StatementClass(_) | AttributeValue::NotSet)
            }
            Self::ServerVersion
            | Self::ClientVersion
            | Self::ServerInfo
            | Self::ConnectionStatus
            | Self::DriverName => matches!(value, AttributeValue::Str(_)),
        };

        if ok {
            Ok(())
        } else {
            Err(Error::invalid_argument(format!(
                "attribute {self} does not accept a {} value",
                value.type_name()
            )))
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "ATTR_TIMEOUT",
            Self::ErrorMode => "ATTR_ERRMODE",
            Self::ServerVersion => "ATTR_SERVER_VERSION",
            Self::ClientVersion => "ATTR_CLIENT_VERSION",
            Self::ServerInfo => "ATTR_SERVER_INFO",
            Self::ConnectionStatus => "ATTR_CONNECTION_STATUS",
            Self::StatementClass => "ATTR_STATEMENT_CLASS",
            Self::DriverName => "ATTR_DRIVER_NAME",
            Self::DefaultFetchMode => "ATTR_DEFAULT_FETCH_MODE",
            Self::Ttl => TTL_KEY,
        };
        f.write_str(name)
    }
}

/// Raw attribute key as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKey {
    Code(i64),
    Name(String),
}

impl From<i64> for AttributeKey {
    fn from(code: i64) -> Self {
        Self::Code(code)
    }
}

impl From<&str> for AttributeKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<Attribute> for AttributeKey {
    fn from(attr: Attribute) -> Self {
        attr.code()
            .map_or_else(|| Self::Name(TTL_KEY.to_string()), Self::Code)
    }
}

impl TryFrom<&AttributeKey> for Attribute {
    type Error = Error;

    fn try_from(key: &AttributeKey) -> Result<Self> {
        match key {
            AttributeKey::Code(code) => Self::from_code(*code).ok_or_else(|| {
                Error::invalid_argument(format!("unrecognized attribute code {code}"))
            }),
            AttributeKey::Name(name) if name == TTL_KEY => Ok(Self::Ttl),
            AttributeKey::Name(name) => Err(Error::invalid_argument(format!(
                "unrecognized attribute key `{name}`"
            ))),
        }
    }
}

/// How the underlying client reports statement failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Return the failure sentinel and record error info.
    Silent,
    /// Like silent, and emit a warning event.
    Warning,
    /// Return an error.
    #[default]
    Exception,
}

impl FromStr for ErrorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "warning" => Ok(Self::Warning),
            "exception" => Ok(Self::Exception),
            other => Err(Error::invalid_argument(format!("unknown error mode `{other}`"))),
        }
    }
}

/// Value of an attribute.
#[derive(Clone, Default)]
pub enum AttributeValue {
    /// The attribute has no value.
    #[default]
    NotSet,
    Bool(bool),
    Int(i64),
    Str(String),
    ErrorMode(ErrorMode),
    FetchMode(FetchMode),
    StatementClass(Arc<dyn StatementFactory>),
}

impl AttributeValue {
    /// Timeout-style value from a duration, truncated to whole seconds.
    #[must_use]
    pub fn seconds(duration: Duration) -> Self {
        Self::Int(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
    }

    #[must_use]
    pub const fn is_set(&self) -> bool {
        !matches!(self, Self::NotSet)
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_statement_factory(&self) -> Option<&Arc<dyn StatementFactory>> {
        match self {
            Self::StatementClass(factory) => Some(factory),
            _ => None,
        }
    }

    /// Short type description used in error messages.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::NotSet => "null".to_string(),
            Self::Bool(_) => "bool".to_string(),
            Self::Int(_) => "int".to_string(),
            Self::Str(_) => "string".to_string(),
            Self::ErrorMode(_) => "error mode".to_string(),
            Self::FetchMode(_) => "fetch mode".to_string(),
            Self::StatementClass(factory) => factory.name().to_string(),
        }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotSet, Self::NotSet) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::ErrorMode(a), Self::ErrorMode(b)) => a == b,
            (Self::FetchMode(a), Self::FetchMode(b)) => a == b,
            (Self::StatementClass(a), Self::StatementClass(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSet => f.write_str("NotSet"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::ErrorMode(m) => f.debug_tuple("ErrorMode").field(m).finish(),
            Self::FetchMode(m) => f.debug_tuple("FetchMode").field(m).finish(),
            Self::StatementClass(factory) => f
                .debug_tuple("StatementClass")
                .field(&factory.name())
                .finish(),
        }
    }
}

impl From<ErrorMode> for AttributeValue {
    fn from(mode: ErrorMode) -> Self {
        Self::ErrorMode(mode)
    }
}

impl From<FetchMode> for AttributeValue {
    fn from(mode: FetchMode) -> Self {
        Self::FetchMode(mode)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<Arc<dyn StatementFactory>> for AttributeValue {
    fn from(factory: Arc<dyn StatementFactory>) -> Self {
        Self::StatementClass(factory)
    }
}

/// Attribute values in first-set order; a later set of the same key
/// replaces the value without moving it.
#[derive(Debug, Clone, Default)]
pub struct AttributeCache {
    entries: Vec<(Attribute, AttributeValue)>,
}

impl AttributeCache {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn set(&mut self, attr: Attribute, value: AttributeValue) {
        if let Some(slot) = self.entries.iter_mut().find(|(a, _)| *a == attr) {
            slot.1 = value;
        } else {
            self.entries.push((attr, value));
        }
    }

    #[must_use]
    pub fn get(&self, attr: Attribute) -> Option<&AttributeValue> {
        self.entries.iter().find(|(a, _)| *a == attr).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Attribute, &AttributeValue)> {
        self.entries.iter().map(|(a, v)| (*a, v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Attribute, AttributeValue)> for AttributeCache {
    fn from_iter<I: IntoIterator<Item = (Attribute, AttributeValue)>>(iter: I) -> Self {
        let mut cache = Self::new();
        for (attr, value) in iter {
            cache.set(attr, value);
        }
        cache
    }
}
