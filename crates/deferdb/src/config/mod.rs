//! Configuration management
//!
//! Supports configuration loading with precedence: env > file > defaults

mod builder;
mod env;
mod file;

pub use builder::{ConnectionConfig, ConnectionConfigBuilder, LoggingConfig};

use crate::Result;

/// Load configuration with precedence: env > file > defaults
pub fn load_config() -> Result<ConnectionConfigBuilder> {
    let mut builder = ConnectionConfigBuilder::new();

    if let Some(path) = file::find_config_file() {
        tracing::info!("Loading configuration from {}", path.display());
        builder = file::load_from_file(&path, builder)?;
    }

    builder = env::load_from_env(builder)?;

    Ok(builder)
}

/// Load configuration from a specific file path
pub fn load_config_from_path(path: &std::path::Path) -> Result<ConnectionConfigBuilder> {
    let builder = file::load_from_file(path, ConnectionConfigBuilder::new())?;
    env::load_from_env(builder)
}
