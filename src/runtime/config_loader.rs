//! Loader configuration.
//!
//! Values are resolved with precedence CLI flag > environment > config file >
//! defaults. The binary applies CLI overrides on top of [`LoaderConfig::resolve`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diesel_runtime::DatabaseConfig;
use crate::loader::LoadStrategy;
use crate::runtime::record_parser::InputEncoding;

pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Environment variables consulted by [`LoaderConfig::apply_env`].
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_CHUNK_SIZE: &str = "AMZLOAD_CHUNK_SIZE";
pub const ENV_STRATEGY: &str = "AMZLOAD_STRATEGY";
pub const ENV_ENCODING: &str = "AMZLOAD_ENCODING";

/// Error type for configuration loading
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Yaml(serde_yaml::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read config file {}: {}", path.display(), source)
            }
            ConfigError::Yaml(e) => write!(f, "Failed to parse YAML: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

/// Settings for one parse + load run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub database_url: Option<String>,
    /// Rows per statement / COPY stream; purely a throughput knob
    pub chunk_size: usize,
    pub strategy: LoadStrategy,
    pub encoding: InputEncoding,
    pub pool: DatabaseConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            strategy: LoadStrategy::default(),
            encoding: InputEncoding::default(),
            pool: DatabaseConfig::default(),
        }
    }
}

impl LoaderConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Example
    /// ```ignore
    /// use amzload::runtime::LoaderConfig;
    ///
    /// let config = LoaderConfig::load_from_file("config/amzload.yaml")?;
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve file (if any) then process environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        base.apply_env()
    }

    /// Overlay values from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database_url = Some(url);
        }
        if let Some(raw) = lookup(ENV_CHUNK_SIZE) {
            self.chunk_size = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a positive integer, got '{}'", ENV_CHUNK_SIZE, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_STRATEGY) {
            self.strategy = raw.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(raw) = lookup(ENV_ENCODING) {
            self.encoding = raw.parse().map_err(ConfigError::Invalid)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be greater than 0".to_string()));
        }
        if self.pool.max_connections == 0 {
            return Err(ConfigError::Invalid("pool.max_connections must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Database URL, required for anything that touches Postgres.
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database_url.as_deref().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "no database URL: set {}, pass --database-url or add database_url to the config file",
                ENV_DATABASE_URL
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.strategy, LoadStrategy::Bulk);
        assert_eq!(config.encoding, InputEncoding::Utf8);
        assert!(config.database_url().is_err());
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let config = LoaderConfig::from_yaml_str("chunk_size: 500\nstrategy: per-product\n").unwrap();

        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.strategy, LoadStrategy::PerProduct);
        assert_eq!(config.encoding, InputEncoding::Utf8);
        assert_eq!(config.pool, DatabaseConfig::default());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let vars = env(&[
            (ENV_DATABASE_URL, "postgres://env/db"),
            (ENV_CHUNK_SIZE, "250"),
            (ENV_ENCODING, "latin1"),
        ]);
        let config = LoaderConfig::from_yaml_str("database_url: postgres://file/db\nchunk_size: 500\n")
            .unwrap()
            .apply_env_from(|k| vars.get(k).cloned())
            .unwrap();

        assert_eq!(config.database_url().unwrap(), "postgres://env/db");
        assert_eq!(config.chunk_size, 250);
        assert_eq!(config.encoding, InputEncoding::Latin1);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            LoaderConfig::from_yaml_str("chunk_size: 0\n"),
            Err(ConfigError::Invalid(_))
        ));

        let vars = env(&[(ENV_STRATEGY, "sideways")]);
        assert!(LoaderConfig::default()
            .apply_env_from(|k| vars.get(k).cloned())
            .is_err());

        assert!(matches!(
            LoaderConfig::from_yaml_str("chunk_size: [1, 2]\n"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
