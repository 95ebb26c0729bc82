//! SQLite driver.

use std::path::Path;

use deferdb::{
    Attribute, AttributeValue, Connection, ConnectionParameters, Driver, Error, Result,
};

use crate::connection::SqliteConnection;
use crate::convert::busy_timeout;
use crate::{DRIVER_NAME, MEMORY_DSN_BODY};

/// Opens [`SqliteConnection`]s from `sqlite:` DSNs.
///
/// Accepted forms are `sqlite::memory:` and `sqlite:<path>`. Credentials are
/// ignored. Connect options are applied before the connection is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;

    fn connect(&self, params: &ConnectionParameters) -> Result<SqliteConnection> {
        if params.driver_name() != DRIVER_NAME {
            return Err(Error::connection("could not find driver"));
        }
        if params.username().is_some() {
            tracing::debug!("SQLite ignores connection credentials");
        }

        let body = params.dsn_body();
        let mut conn = if body == MEMORY_DSN_BODY {
            SqliteConnection::open_in_memory()?
        } else {
            SqliteConnection::open(Path::new(body))?
        };

        for (attr, value) in params.options().iter() {
            conn.set_attribute(attr, value.clone())?;
        }

        tracing::info!(dsn = params.dsn(), "SQLite connection established");
        Ok(conn)
    }

    fn check_attribute(&self, attr: Attribute, value: &AttributeValue) -> Result<()> {
        if let (Attribute::Timeout, AttributeValue::Int(secs)) = (attr, value) {
            busy_timeout(*secs)?;
        }
        Ok(())
    }
}
