//! TOML configuration file loading

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::builder::ConnectionConfigBuilder;
use crate::attribute::ErrorMode;
use crate::error::{Error, Result};

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &["./deferdb.toml", "~/.config/deferdb/config.toml"];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(
    path: &Path,
    builder: ConnectionConfigBuilder,
) -> Result<ConnectionConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        Error::config(format!(
            "Failed to parse config file {}: {e}",
            path.display()
        ))
    })?;

    apply_file_config(builder, file_config)
}

fn apply_file_config(
    mut builder: ConnectionConfigBuilder,
    config: FileConfig,
) -> Result<ConnectionConfigBuilder> {
    if let Some(conn) = config.connection {
        if let Some(dsn) = conn.dsn {
            builder = builder.dsn(dsn);
        }

        if let Some(username) = conn.username {
            builder = builder.username(username);
        }

        if let Some(password) = conn.password {
            builder = builder.password(password);
        }

        if let Some(mode) = conn.error_mode {
            let mode: ErrorMode = mode
                .parse()
                .map_err(|e| Error::config(format!("Invalid error_mode: {e}")))?;
            builder = builder.error_mode(mode);
        }

        if let Some(secs) = conn.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
    }

    if let Some(reconnect) = config.reconnect
        && let Some(secs) = reconnect.ttl_secs
    {
        if secs == 0 {
            return Err(Error::config("Invalid ttl_secs: must be positive"));
        }
        builder = builder.ttl(Duration::from_secs(secs));
    }

    if let Some(profiling) = config.profiling
        && let Some(enabled) = profiling.enabled
    {
        builder = builder.profiling(enabled);
    }

    if let Some(obs) = config.observability {
        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }

        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    Ok(builder)
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    connection: Option<ConnectionSection>,
    reconnect: Option<ReconnectSection>,
    profiling: Option<ProfilingSection>,
    observability: Option<ObservabilitySection>,
}

#[derive(Debug, Deserialize)]
struct ConnectionSection {
    dsn: Option<String>,
    username: Option<String>,
    password: Option<String>,
    error_mode: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ReconnectSection {
    ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ProfilingSection {
    enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ObservabilitySection {
    log_level: Option<String>,
    json_logs: Option<bool>,
}
