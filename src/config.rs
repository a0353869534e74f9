//! Runtime configuration.
//!
//! Values come from an optional TOML file, then `RECALL_*` environment
//! variables, then command-line flags (applied by the binary).

use log::warn;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "recall.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    /// Most due cards fetched for one study session.
    pub due_card_limit: usize,
    /// How long a storage call may wait on a locked database.
    pub store_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("db.sqlite3"),
            due_card_limit: 100,
            store_timeout: Duration::from_millis(5000),
        }
    }
}

/// On-disk layout; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    due_card_limit: Option<usize>,
    store_timeout_ms: Option<u64>,
}

impl Config {
    /// Loads `RECALL_CONFIG` (or `recall.toml` if it exists) and applies
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = env::var_os("RECALL_CONFIG").map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(raw)?;
        let defaults = Self::default();
        Ok(Self {
            database_path: file.database_path.unwrap_or(defaults.database_path),
            due_card_limit: file.due_card_limit.unwrap_or(defaults.due_card_limit),
            store_timeout: file
                .store_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
        })
    }

    /// Applies `RECALL_DB`, `RECALL_DUE_LIMIT` and `RECALL_STORE_TIMEOUT_MS`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("RECALL_DB") {
            self.database_path = PathBuf::from(path);
        }
        self.due_card_limit = parse_or(&lookup, "RECALL_DUE_LIMIT", self.due_card_limit);
        let timeout_ms = parse_or(
            &lookup,
            "RECALL_STORE_TIMEOUT_MS",
            self.store_timeout.as_millis() as u64,
        );
        self.store_timeout = Duration::from_millis(timeout_ms);
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Failed to parse {}={:?}, keeping previous value", key, raw);
                default
            }
        },
        None => default,
    }
}
