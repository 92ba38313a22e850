use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::db::keys::KeySpace;
use crate::services::tag_parser::TagSyntax;

pub const ENV_PREFIX: &str = "LINKBUCKET_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the HTTP API listens on.
    pub bind_address: String,
    /// `host:port` (or full base URL) of the key-value store.
    pub store_address: String,
    /// Database name on the store, the first path segment of every key URL.
    pub store_name: String,
    /// Prefix of every key this application writes.
    pub key_namespace: String,
    pub log_dir: String,
    pub store_timeout_secs: u64,
    pub title_timeout_secs: u64,
    /// Allow punctuation inside tag names (`c++`, `node.js`).
    pub allow_tag_punctuation: bool,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
pub struct PartialServerConfig {
    bind_address: Option<String>,
    store_address: Option<String>,
    store_name: Option<String>,
    key_namespace: Option<String>,
    log_dir: Option<String>,
    store_timeout_secs: Option<u64>,
    title_timeout_secs: Option<u64>,
    allow_tag_punctuation: Option<bool>,
}

/// Values given on the command line. These win over everything else.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub store_address: Option<String>,
    pub store_name: Option<String>,
    pub key_namespace: Option<String>,
}

fn default_bind_address() -> String {
    "localhost:8080".to_string()
}

fn default_store_address() -> String {
    "localhost:38080".to_string()
}

fn default_store_name() -> String {
    "linkbucket".to_string()
}

fn default_key_namespace() -> String {
    "sb".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

const DEFAULT_TIMEOUT_SECS: u64 = 10;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            store_address: default_store_address(),
            store_name: default_store_name(),
            key_namespace: default_key_namespace(),
            log_dir: default_log_dir(),
            store_timeout_secs: DEFAULT_TIMEOUT_SECS,
            title_timeout_secs: DEFAULT_TIMEOUT_SECS,
            allow_tag_punctuation: false,
        }
    }
}

impl PartialServerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::prefixed(ENV_PREFIX).from_env::<Self>()?)
    }
}

impl ServerConfig {
    /// File, then `LINKBUCKET_*` environment variables, then command-line
    /// overrides; later layers win.
    pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path) => PartialServerConfig::from_file(path)?,
            None => PartialServerConfig::default(),
        };
        let env_config = PartialServerConfig::from_env()?;

        Self::from_layers(file_config, env_config, overrides)
    }

    pub fn from_layers(
        file: PartialServerConfig,
        env: PartialServerConfig,
        cli: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let config = ServerConfig {
            bind_address: cli
                .bind_address
                .or(env.bind_address)
                .or(file.bind_address)
                .unwrap_or_else(default_bind_address),
            store_address: cli
                .store_address
                .or(env.store_address)
                .or(file.store_address)
                .unwrap_or_else(default_store_address),
            store_name: cli
                .store_name
                .or(env.store_name)
                .or(file.store_name)
                .unwrap_or_else(default_store_name),
            key_namespace: cli
                .key_namespace
                .or(env.key_namespace)
                .or(file.key_namespace)
                .unwrap_or_else(default_key_namespace),
            log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
            store_timeout_secs: env
                .store_timeout_secs
                .or(file.store_timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            title_timeout_secs: env
                .title_timeout_secs
                .or(file.title_timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            allow_tag_punctuation: env
                .allow_tag_punctuation
                .or(file.allow_tag_punctuation)
                .unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_namespace.is_empty() {
            return Err(ConfigError::Invalid("key_namespace must not be empty".to_string()));
        }
        if self.key_namespace.contains(':') {
            return Err(ConfigError::Invalid(format!(
                "key_namespace {:?} must not contain ':'",
                self.key_namespace
            )));
        }
        if self.store_name.is_empty() || self.store_name.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "store_name {:?} must be a single non-empty path segment",
                self.store_name
            )));
        }
        if self.store_address.is_empty() {
            return Err(ConfigError::Invalid("store_address must not be empty".to_string()));
        }
        if self.store_timeout_secs == 0 || self.title_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least one second".to_string()));
        }
        Ok(())
    }

    pub fn key_space(&self) -> KeySpace {
        KeySpace::new(self.key_namespace.clone())
    }

    pub fn tag_syntax(&self) -> TagSyntax {
        if self.allow_tag_punctuation {
            TagSyntax::Punctuated
        } else {
            TagSyntax::Alphanumeric
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn title_timeout(&self) -> Duration {
        Duration::from_secs(self.title_timeout_secs)
    }
}
