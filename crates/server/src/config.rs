use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use reckon_import::IngestOptions;
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV: &str = "RECKON_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "reckon.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ingest: IngestOptions,
    pub logging: LoggingConfig,
    pub owners: Vec<OwnerToken>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("reckon.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// A bearer token, stored as the hex SHA-256 of the token, and the owner it
/// authenticates.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerToken {
    pub id: String,
    pub token_sha256: String,
}

impl Config {
    /// Loads from `$RECKON_CONFIG`, falling back to `reckon.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("bind address '{}'", self.server.bind)))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("max_upload_bytes must be positive".into()));
        }
        if self.ingest.date_formats.is_empty() {
            return Err(ConfigError::Invalid("ingest.date_formats is empty".into()));
        }
        for owner in &self.owners {
            if owner.id.trim().is_empty() {
                return Err(ConfigError::Invalid("owner id is blank".into()));
            }
            let digest = owner.token_sha256.trim();
            if digest.len() != 64 || hex::decode(digest).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "token_sha256 for owner '{}' is not a hex SHA-256 digest",
                    owner.id
                )));
            }
        }
        Ok(())
    }
}
