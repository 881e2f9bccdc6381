// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config service and storage port for Spyglass tools.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::settings::SpyglassSettings;

/// Store key under which [`SpyglassSettings`] are persisted.
pub const SETTINGS_KEY: &str = "spyglass";

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Stored settings parsed but are not usable.
    #[error("invalid settings: {0}")]
    Invalid(String),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Serializes config values as JSON and delegates storage to a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Load and deserialize the value stored under `key`.
    ///
    /// Missing keys and empty blobs both yield `Ok(None)`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        let bytes = match self.store.load_raw(key) {
            Ok(bytes) => bytes,
            Err(ConfigError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Serialize `value` as pretty JSON and persist it under `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Load validated settings, falling back to defaults when none are stored.
    pub fn load_settings(&self) -> Result<SpyglassSettings, ConfigError> {
        let settings = match self.load::<SpyglassSettings>(SETTINGS_KEY)? {
            Some(settings) => settings,
            None => {
                debug!(key = SETTINGS_KEY, "no stored settings; using defaults");
                SpyglassSettings::default()
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate and persist `settings`.
    pub fn save_settings(&self, settings: &SpyglassSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        self.save(SETTINGS_KEY, settings)
    }
}
