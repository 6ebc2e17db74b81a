//! Configuration loading from disk.
//!
//! # Responsibilities
//! - Read a TOML file, creating it with defaults when missing
//! - Migrate files written by older schema versions and rewrite them
//!
//! # Design Decisions
//! - The untyped `toml::Table` exists only between reading and migrating;
//!   everything past this module works on typed structs

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use toml::{Table, Value};

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config version {found} is newer than supported version {current}")]
    UnsupportedVersion { found: u32, current: u32 },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A configuration file with a schema version.
pub trait VersionedConfig: Serialize + DeserializeOwned + Default {
    /// Version written by this build. Bump it when the schema changes.
    const CURRENT_VERSION: u32;

    fn set_version(&mut self, version: u32);

    /// Build the current schema from the raw fields of a file written by
    /// `old_version`.
    fn migrate(old_version: u32, raw: Table) -> Result<Self, ConfigError> {
        let _ = old_version;
        Ok(Value::Table(raw).try_into()?)
    }
}

/// Load `path`, migrating and rewriting it if it was written by an older version.
///
/// A missing file is created with default values.
pub fn load_config<T: VersionedConfig>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "Creating new configuration file");
        let config = T::default();
        save_config(path, &config)?;
        return Ok(config);
    }

    let content = fs::read_to_string(path)?;
    let raw: Table = toml::from_str(&content)?;

    let version = raw
        .get("version")
        .and_then(Value::as_integer)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);

    if version > T::CURRENT_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            found: version,
            current: T::CURRENT_VERSION,
        });
    }

    if version == T::CURRENT_VERSION {
        return Ok(Value::Table(raw).try_into()?);
    }

    tracing::info!(
        path = %path.display(),
        from = version,
        to = T::CURRENT_VERSION,
        "Migrating configuration"
    );
    let mut config = T::migrate(version, raw)?;
    config.set_version(T::CURRENT_VERSION);
    save_config(path, &config)?;

    Ok(config)
}

/// Load and validate the server configuration.
pub fn load_server_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = load_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

pub fn save_config<T: Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

impl VersionedConfig for ServerConfig {
    const CURRENT_VERSION: u32 = 2;

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    fn migrate(old_version: u32, mut raw: Table) -> Result<Self, ConfigError> {
        // v1 kept the listen endpoint and forwarded-IP flag at the top level.
        if old_version < 2 {
            let host = raw.remove("listen_host");
            let port = raw.remove("listen_port");
            let use_forwarded_ip = raw.remove("use_forwarded_ip");

            let listener = raw
                .entry("listener")
                .or_insert_with(|| Value::Table(Table::new()));

            if let Value::Table(listener) = listener {
                let host = host.as_ref().and_then(Value::as_str);
                let port = port.as_ref().and_then(Value::as_integer);
                if let (Some(host), Some(port)) = (host, port) {
                    listener.insert("bind_address".into(), Value::String(format!("{host}:{port}")));
                }
                if let Some(flag) = use_forwarded_ip {
                    listener.insert("use_forwarded_ip".into(), flag);
                }
            }
        }

        Ok(Value::Table(raw).try_into()?)
    }
}
