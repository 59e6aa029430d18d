use crate::application::account::DEFAULT_MIN_PASSWORD_LENGTH;
use crate::error::{PharmacyError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Runtime settings, read from a TOML file. Every field has a default.
///
/// ```toml
/// [storage]
/// db_path = "data/pharmacy"
///
/// [logging]
/// filter = "pharmacy_backoffice=debug"
///
/// [security]
/// min_password_length = 8
/// ```
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// RocksDB directory. In-memory storage when absent.
    pub db_path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    pub min_password_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = fs::read_to_string(path_ref).map_err(|e| {
        PharmacyError::Config(format!("Failed to read config file {:?}: {}", path_ref, e))
    })?;
    parse_config(&contents).map_err(|e| match e {
        PharmacyError::Config(msg) => {
            PharmacyError::Config(format!("{} (in {:?})", msg, path_ref))
        }
        other => other,
    })
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents)
        .map_err(|e| PharmacyError::Config(format!("Failed to parse TOML: {}", e)))
}
