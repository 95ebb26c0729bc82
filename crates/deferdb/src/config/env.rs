//! Environment variable loading for configuration

use std::env;
use std::time::Duration;

use super::builder::ConnectionConfigBuilder;
use crate::attribute::ErrorMode;
use crate::error::{Error, Result};

/// Environment variable names
mod vars {
    pub const DEFERDB_DSN: &str = "DEFERDB_DSN";
    pub const DEFERDB_USERNAME: &str = "DEFERDB_USERNAME";
    pub const DEFERDB_PASSWORD: &str = "DEFERDB_PASSWORD";
    pub const DEFERDB_TTL_SECS: &str = "DEFERDB_TTL_SECS";
    pub const DEFERDB_PROFILING: &str = "DEFERDB_PROFILING";
    pub const DEFERDB_ERROR_MODE: &str = "DEFERDB_ERROR_MODE";
    pub const DEFERDB_JSON_LOGS: &str = "DEFERDB_JSON_LOGS";
    pub const RUST_LOG: &str = "RUST_LOG";
}

#[cfg(test)]
pub(super) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Load configuration from environment variables
pub fn load_from_env(mut builder: ConnectionConfigBuilder) -> Result<ConnectionConfigBuilder> {
    if let Ok(dsn) = env::var(vars::DEFERDB_DSN) {
        builder = builder.dsn(dsn);
    }

    if let Ok(username) = env::var(vars::DEFERDB_USERNAME) {
        builder = builder.username(username);
    }

    if let Ok(password) = env::var(vars::DEFERDB_PASSWORD) {
        builder = builder.password(password);
    }

    if let Ok(ttl_str) = env::var(vars::DEFERDB_TTL_SECS) {
        let secs = ttl_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                Error::config(format!(
                    "Invalid {}: must be a positive integer, got '{ttl_str}'",
                    vars::DEFERDB_TTL_SECS
                ))
            })?;
        builder = builder.ttl(Duration::from_secs(secs));
    }

    if let Ok(val) = env::var(vars::DEFERDB_PROFILING) {
        builder = builder.profiling(parse_bool(&val));
    }

    if let Ok(mode) = env::var(vars::DEFERDB_ERROR_MODE) {
        let mode: ErrorMode = mode.parse().map_err(|e| {
            Error::config(format!("Invalid {}: {e}", vars::DEFERDB_ERROR_MODE))
        })?;
        builder = builder.error_mode(mode);
    }

    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::DEFERDB_JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
