//! The in-memory key/value store and its load/save lifecycle.
//!
//! The whole map is the unit of persistence: `save` rewrites the backing
//! file from scratch and `load` replaces the map wholesale. A backing file
//! that cannot be decrypted is reported and logged but never clobbers the
//! contents already in memory.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::StoreConfig;
use crate::crypto::cipher::{CipherError, StoreCipher};
use crate::crypto::integrity::{sha256_file, IntegrityError};
use crate::framing::{self, FrameError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("backing file is not a framed string: {0}")]
    Frame(#[from] FrameError),
    #[error("value serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

/// Why a decrypted payload could not become a store.
#[derive(Debug, Error)]
enum PayloadError {
    #[error("{0}")]
    Cipher(#[from] CipherError),
    #[error("payload is not a json object: {0}")]
    Json(#[from] serde_json::Error),
}

/// Whether a mutation is written to disk straight away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persist {
    #[default]
    Deferred,
    Immediately,
}

impl From<bool> for Persist {
    fn from(save: bool) -> Self {
        if save {
            Persist::Immediately
        } else {
            Persist::Deferred
        }
    }
}

/// Result of [`SecureStore::load`]. Only `Loaded` touches the in-memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(usize),
    Empty,
    Undecryptable,
}

pub struct SecureStore {
    path: PathBuf,
    cipher: StoreCipher,
    data: Map<String, Value>,
}

impl SecureStore {
    /// Opens the store described by `config`. The backing file is loaded when
    /// it exists; otherwise the store starts empty and nothing is written
    /// until the first save.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let cipher = StoreCipher::new(&config.secret)?;
        let mut store = Self {
            path: config.path.clone(),
            cipher,
            data: Map::new(),
        };
        store.ensure_parent_dir()?;

        if store.path.exists() {
            store.load()?;
        } else {
            info!("no store at {}, starting empty", store.path.display());
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Value stored under `key`, or `default` when there is none.
    pub fn get(&self, key: &str, default: impl Into<Value>) -> Value {
        match self.data.get(key) {
            Some(value) => value.clone(),
            None => default.into(),
        }
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Typed view of a value; `None` when absent or of a different shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| T::deserialize(value).ok())
    }

    pub fn set<V: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: V,
        persist: Persist,
    ) -> Result<(), StoreError> {
        let key = key.into();
        let value = serde_json::to_value(value)?;
        debug!("set {key}");
        self.data.insert(key, value);
        self.persist(persist)
    }

    /// Removes `key` if present. A requested save happens either way.
    pub fn remove(&mut self, key: &str, persist: Persist) -> Result<Option<Value>, StoreError> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            debug!("removed {key}");
        }
        self.persist(persist)?;
        Ok(removed)
    }

    /// Clears every entry and saves the empty store.
    pub fn reset_all(&mut self) -> Result<(), StoreError> {
        self.data.clear();
        info!("store reset");
        self.save()
    }

    /// Replaces the in-memory map with the backing file's contents.
    pub fn load(&mut self) -> Result<LoadOutcome, StoreError> {
        let raw = fs::read(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        if raw.is_empty() {
            warn!("store file {} is empty", self.path.display());
            return Ok(LoadOutcome::Empty);
        }

        let encrypted = framing::decode(&raw)?;
        if encrypted.is_empty() {
            warn!("store data at {} loaded empty string", self.path.display());
            return Ok(LoadOutcome::Empty);
        }

        match self.decode_payload(&encrypted) {
            Ok(data) => {
                let count = data.len();
                self.data = data;
                info!("loaded {count} entries from {}", self.path.display());
                Ok(LoadOutcome::Loaded(count))
            }
            Err(err) => {
                error!("could not decrypt store data at {}: {err}", self.path.display());
                Ok(LoadOutcome::Undecryptable)
            }
        }
    }

    /// Rewrites the backing file with the whole store.
    pub fn save(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.data)?;
        let encrypted = self.cipher.encrypt(&json)?;
        let framed = framing::encode(&encrypted);

        self.ensure_parent_dir()?;
        fs::write(&self.path, framed).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!("saved {} entries to {}", self.data.len(), self.path.display());
        Ok(())
    }

    /// Compact JSON of the whole store.
    pub fn print(&self) -> String {
        Value::Object(self.data.clone()).to_string()
    }

    /// Indented JSON of the whole store.
    pub fn print_pretty(&self) -> String {
        format!("{:#}", Value::Object(self.data.clone()))
    }

    /// One `key: value` line per entry. Strings are written without quotes.
    pub fn print_formatted(&self) -> String {
        let mut text = String::new();
        for (key, value) in &self.data {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            text.push_str(&format!("{key}: {rendered}\n"));
        }
        text
    }

    /// SHA-256 hex of the backing file as it is on disk.
    pub fn fingerprint(&self) -> Result<String, StoreError> {
        Ok(sha256_file(&self.path)?)
    }

    fn persist(&self, persist: Persist) -> Result<(), StoreError> {
        match persist {
            Persist::Immediately => self.save(),
            Persist::Deferred => Ok(()),
        }
    }

    fn decode_payload(&self, encrypted: &str) -> Result<Map<String, Value>, PayloadError> {
        let json = self.cipher.decrypt(encrypted)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn ensure_parent_dir(&self) -> Result<(), StoreError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                    path: parent.to_path_buf(),
                    source,
                })
            }
            _ => Ok(()),
        }
    }
}
