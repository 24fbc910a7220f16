//! Store configuration: where the backing file lives and which secret
//! encrypts it. The secret always comes from outside the binary, either from
//! the environment or from a JSON file whose `$ENV{NAME}` placeholders are
//! expanded after parsing so the secret itself need not live on disk.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

/// File name of the backing file inside the data directory.
pub const DEFAULT_FILENAME: &str = "secure";

pub const CONFIG_ENV: &str = "SECURE_STORE_CONFIG";
pub const SECRET_ENV: &str = "SECURE_STORE_SECRET";
pub const PATH_ENV: &str = "SECURE_STORE_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file unreadable at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config parse failed: {0}")]
    Parse(String),
    #[error("environment variable {0} is required but missing")]
    MissingEnvVar(String),
    #[error("secret must not be empty")]
    EmptySecret,
    #[error("no platform data directory available")]
    NoDataDir,
}

#[derive(Debug, Deserialize)]
struct RawStoreConfig {
    path: Option<String>,
    secret: String,
}

#[derive(Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub secret: String,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("path", &self.path)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>, secret: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            secret: secret.into(),
        }
    }

    /// `<platform local data dir>/secure`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("", "", "secure-store").ok_or(ConfigError::NoDataDir)?;
        Ok(dirs.data_local_dir().join(DEFAULT_FILENAME))
    }

    /// Loads a JSON config file of the form `{"path": ..., "secret": ...}`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(path.as_ref(), |name| env::var(name).ok())
    }

    /// Reads `SECURE_STORE_CONFIG` if set, otherwise `SECURE_STORE_SECRET`
    /// and the optional `SECURE_STORE_PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(config_path) = lookup(CONFIG_ENV) {
            return Self::load_with(Path::new(&config_path), &lookup);
        }

        let secret =
            lookup(SECRET_ENV).ok_or_else(|| ConfigError::MissingEnvVar(SECRET_ENV.into()))?;
        let path = match lookup(PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => Self::default_path()?,
        };
        Self::validated(path, secret)
    }

    fn load_with(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw_json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawStoreConfig =
            serde_json::from_str(&raw_json).map_err(|e| ConfigError::Parse(format!("{e}")))?;

        let secret = resolve_placeholder(raw.secret, &lookup)?;
        let store_path = match raw.path {
            Some(text) => PathBuf::from(resolve_placeholder(text, &lookup)?),
            None => Self::default_path()?,
        };
        Self::validated(store_path, secret)
    }

    fn validated(path: PathBuf, secret: String) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        Ok(Self { path, secret })
    }
}

fn resolve_placeholder(
    text: String,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    if let Some(var) = extract_env_placeholder(&text) {
        return lookup(var).ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()));
    }
    Ok(text)
}

fn extract_env_placeholder(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("$ENV{")?.strip_suffix('}')?;
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}
