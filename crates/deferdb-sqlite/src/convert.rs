//! Value conversion and error mapping between deferdb and rusqlite.

use std::time::Duration;

use deferdb::{Error, ErrorInfo, ErrorMode, ParamType, Result, Value};
use rusqlite::ErrorCode;
use rusqlite::types::{Value as SqlValue, ValueRef};

/// SQLSTATE for integrity constraint violations.
pub const SQLSTATE_CONSTRAINT: &str = "23000";
/// SQLSTATE for general errors.
pub const SQLSTATE_GENERAL: &str = "HY000";
/// SQLSTATE for an unknown or out-of-range parameter.
pub const SQLSTATE_INVALID_PARAMETER: &str = "HY093";

pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

pub(crate) fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Apply a binding type hint to `value`.
pub(crate) fn coerce(value: Value, hint: ParamType) -> Value {
    match (hint, value) {
        (_, Value::Null) | (ParamType::Null, _) => Value::Null,
        (ParamType::Int, Value::Bool(b)) | (ParamType::Bool, Value::Bool(b)) => {
            Value::Int(i64::from(b))
        }
        (ParamType::Int, Value::Real(f)) => Value::Int(f as i64),
        (ParamType::Int, Value::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map_or(Value::Text(s), Value::Int),
        (ParamType::Bool, Value::Int(i)) => Value::Int(i64::from(i != 0)),
        (ParamType::Bool, Value::Text(s)) => {
            Value::Int(i64::from(!(s.is_empty() || s == "0")))
        }
        (ParamType::Str, Value::Int(i)) => Value::Text(i.to_string()),
        (ParamType::Str, Value::Real(f)) => Value::Text(f.to_string()),
        (ParamType::Str, Value::Bool(b)) => Value::Text(if b { "1" } else { "" }.to_string()),
        (ParamType::Lob, Value::Text(s)) => Value::Blob(s.into_bytes()),
        (_, value) => value,
    }
}

/// Largest busy timeout SQLite accepts, in whole seconds.
pub const MAX_BUSY_TIMEOUT_SECS: i64 = i32::MAX as i64 / 1000;

/// Busy timeout for a `Timeout` attribute value in seconds.
///
/// SQLite takes the timeout as an `i32` millisecond count.
pub(crate) fn busy_timeout(secs: i64) -> Result<Duration> {
    if secs < 0 {
        return Err(Error::invalid_argument("timeout must not be negative"));
    }
    secs.checked_mul(1000)
        .and_then(|ms| i32::try_from(ms).ok())
        .and_then(|ms| u64::try_from(ms).ok())
        .map(Duration::from_millis)
        .ok_or_else(|| {
            Error::invalid_argument(format!(
                "timeout of {secs}s exceeds the maximum of {MAX_BUSY_TIMEOUT_SECS}s"
            ))
        })
}

/// Diagnostics of a rusqlite failure.
pub(crate) fn error_info(err: &rusqlite::Error) -> ErrorInfo {
    let (sqlstate, driver_code) = match err {
        rusqlite::Error::SqliteFailure(failure, _)
        | rusqlite::Error::SqlInputError { error: failure, .. } => {
            let sqlstate = if failure.code == ErrorCode::ConstraintViolation {
                SQLSTATE_CONSTRAINT
            } else {
                SQLSTATE_GENERAL
            };
            (sqlstate, Some(i64::from(failure.extended_code)))
        }
        _ => (SQLSTATE_GENERAL, None),
    };

    ErrorInfo {
        sqlstate: sqlstate.to_string(),
        driver_code,
        driver_message: Some(err.to_string()),
    }
}

/// Report a failure according to `mode`: `Ok(sentinel)` in silent and
/// warning mode, `Err` in exception mode.
pub(crate) fn report<T>(mode: ErrorMode, info: &ErrorInfo, sentinel: T) -> Result<T> {
    let message = info.driver_message.as_deref().unwrap_or_default();
    match mode {
        ErrorMode::Silent => Ok(sentinel),
        ErrorMode::Warning => {
            tracing::warn!(
                sqlstate = %info.sqlstate,
                driver_code = ?info.driver_code,
                message,
                "statement failed"
            );
            Ok(sentinel)
        }
        ErrorMode::Exception => Err(Error::statement(
            info.sqlstate.clone(),
            info.driver_code,
            message,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_sqlite_value() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let values = [
            Value::Null,
            Value::Int(-7),
            Value::Real(1.5),
            Value::Text("héllo".to_string()),
            Value::Blob(vec![0, 159, 146, 150]),
        ];
        for value in values {
            let back: Value = conn
                .query_row("SELECT ?1", [to_sql(&value)], |row| {
                    Ok(from_sql(row.get_ref(0)?))
                })
                .unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_bool_stored_as_integer() {
        assert_eq!(to_sql(&Value::Bool(true)), SqlValue::Integer(1));
    }

    #[test]
    fn test_coerce_hints() {
        assert_eq!(coerce(Value::from("42"), ParamType::Int), Value::Int(42));
        assert_eq!(coerce(Value::from("x"), ParamType::Int), Value::from("x"));
        assert_eq!(coerce(Value::Int(42), ParamType::Str), Value::from("42"));
        assert_eq!(coerce(Value::Int(5), ParamType::Bool), Value::Int(1));
        assert_eq!(coerce(Value::Int(5), ParamType::Null), Value::Null);
        assert_eq!(
            coerce(Value::from("ab"), ParamType::Lob),
            Value::Blob(b"ab".to_vec())
        );
        assert_eq!(coerce(Value::Null, ParamType::Int), Value::Null);
    }

    #[test]
    fn test_constraint_violation_maps_to_23000() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();
        let err = conn
            .execute("INSERT INTO t (id) VALUES (1)", [])
            .unwrap_err();

        let info = error_info(&err);
        assert_eq!(info.sqlstate, SQLSTATE_CONSTRAINT);
        // SQLITE_CONSTRAINT_PRIMARYKEY
        assert_eq!(info.driver_code, Some(1555));
        assert!(info.driver_message.is_some());
    }

    #[test]
    fn test_syntax_error_maps_to_hy000() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn.execute("SELEKT 1", []).unwrap_err();
        assert_eq!(error_info(&err).sqlstate, SQLSTATE_GENERAL);
    }

    #[test]
    fn test_syntax_error_at_prepare_has_driver_code() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn.prepare("SELEKT 1").unwrap_err();
        let info = error_info(&err);
        assert_eq!(info.sqlstate, SQLSTATE_GENERAL);
        // SQLITE_ERROR
        assert_eq!(info.driver_code, Some(1));
        assert!(info.driver_message.unwrap().contains("SELEKT"));
    }

    #[test]
    fn test_busy_timeout_bounds() {
        assert_eq!(busy_timeout(0).unwrap(), Duration::ZERO);
        assert_eq!(busy_timeout(5).unwrap(), Duration::from_secs(5));
        assert_eq!(
            busy_timeout(MAX_BUSY_TIMEOUT_SECS).unwrap(),
            Duration::from_secs(MAX_BUSY_TIMEOUT_SECS as u64)
        );
        for secs in [-1, MAX_BUSY_TIMEOUT_SECS + 1, 3_000_000, i64::MAX] {
            assert!(busy_timeout(secs).unwrap_err().is_invalid_argument());
        }
    }

    #[test]
    fn test_report_modes() {
        let info = ErrorInfo {
            sqlstate: SQLSTATE_GENERAL.to_string(),
            driver_code: Some(1),
            driver_message: Some("boom".to_string()),
        };
        assert!(!report(ErrorMode::Silent, &info, false).unwrap());
        assert_eq!(report(ErrorMode::Warning, &info, 0).unwrap(), 0);

        let err = report(ErrorMode::Exception, &info, false).unwrap_err();
        assert!(err.is_statement());
        assert_eq!(err.sqlstate(), Some(SQLSTATE_GENERAL));
        assert_eq!(err.driver_code(), Some(1));
    }
}
