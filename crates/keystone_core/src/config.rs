//! TOML configuration for keystone processes.
//!
//! # Responsibility
//! - Describe database location, logging and storage options.
//! - Parse configuration once at startup; every section has defaults.
//!
//! # Invariants
//! - A missing `[database] path` selects an in-memory database.
//! - Storage defaults: hash content verification on, cascade remove off.

use crate::store::StoreOptions;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeystoneConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite file; absent means a private in-memory database.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `trace|debug|info|warn|error`; build-mode default when absent.
    pub level: Option<String>,
    /// Absolute directory for rolling log files; logging stays off when absent.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub verify_hash_content: bool,
    pub cascade_remove: bool,
    /// Table overrides; models not listed use their default table.
    pub models: Vec<ModelBinding>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let options = StoreOptions::default();
        Self {
            verify_hash_content: options.verify_hash_content,
            cascade_remove: options.cascade_remove,
            models: Vec::new(),
        }
    }
}

impl StorageConfig {
    pub fn options(&self) -> StoreOptions {
        StoreOptions {
            verify_hash_content: self.verify_hash_content,
            cascade_remove: self.cascade_remove,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelBinding {
    pub model: String,
    pub table: String,
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl KeystoneConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, KeystoneConfig, ModelBinding};
    use std::path::PathBuf;

    #[test]
    fn empty_document_uses_defaults() {
        let config = KeystoneConfig::from_toml_str("").unwrap();
        assert_eq!(config, KeystoneConfig::default());
        assert!(config.database.path.is_none());
        assert!(config.storage.verify_hash_content);
        assert!(!config.storage.cascade_remove);
    }

    #[test]
    fn parses_every_section() {
        let config = KeystoneConfig::from_toml_str(
            r#"
            [database]
            path = "/var/lib/keystone/contacts.db"

            [logging]
            level = "debug"
            dir = "/var/log/keystone"

            [storage]
            verify_hash_content = false
            cascade_remove = true

            [[storage.models]]
            model = "person"
            table = "persons"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.database.path,
            Some(PathBuf::from("/var/lib/keystone/contacts.db"))
        );
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        let options = config.storage.options();
        assert!(!options.verify_hash_content);
        assert!(options.cascade_remove);
        assert_eq!(
            config.storage.models,
            vec![ModelBinding {
                model: "person".to_string(),
                table: "persons".to_string(),
            }]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = KeystoneConfig::from_toml_str("[storage]\ncascade = true\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
