// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory config store fake for testing without filesystem I/O.

use spyglass_app_core::config::{ConfigError, ConfigStore};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory [`ConfigStore`] that counts calls and can simulate failures.
///
/// Clones share state, so a test can hand one clone to a
/// [`ConfigService`](spyglass_app_core::config::ConfigService) and inspect
/// the other.
///
/// # Example
///
/// ```
/// use spyglass_app_core::config::ConfigService;
/// use spyglass_app_core::settings::SpyglassSettings;
/// use spyglass_dry_tests::InMemoryConfigStore;
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
///
/// service.save_settings(&SpyglassSettings::default()).unwrap();
/// assert_eq!(store.save_count(), 1);
/// assert!(store.contains_key("spyglass"));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    blobs: BTreeMap<String, Vec<u8>>,
    loads: usize,
    saves: usize,
    fail_load: bool,
    fail_save: bool,
}

impl InMemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `blob` under `key`.
    pub fn with_blob(key: &str, blob: impl Into<Vec<u8>>) -> Self {
        let store = Self::new();
        store.state().blobs.insert(key.to_owned(), blob.into());
        store
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every later `load_raw` fail with [`ConfigError::Other`].
    pub fn set_fail_on_load(&self, fail: bool) {
        self.state().fail_load = fail;
    }

    /// Make every later `save_raw` fail with [`ConfigError::Other`].
    pub fn set_fail_on_save(&self, fail: bool) {
        self.state().fail_save = fail;
    }

    /// `load_raw` attempts, failed ones included.
    pub fn load_count(&self) -> usize {
        self.state().loads
    }

    /// `save_raw` attempts, failed ones included.
    pub fn save_count(&self) -> usize {
        self.state().saves
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.state().blobs.keys().cloned().collect()
    }

    /// Whether `key` holds a blob.
    pub fn contains_key(&self, key: &str) -> bool {
        self.state().blobs.contains_key(key)
    }

    /// Stored blob under `key`, without counting a load.
    pub fn blob(&self, key: &str) -> Option<Vec<u8>> {
        self.state().blobs.get(key).cloned()
    }

    /// Drop all blobs, counters and failure flags.
    pub fn reset(&self) {
        *self.state() = State::default();
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut state = self.state();
        state.loads += 1;
        if state.fail_load {
            return Err(ConfigError::Other("simulated load failure".into()));
        }
        state.blobs.get(key).cloned().ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut state = self.state();
        state.saves += 1;
        if state.fail_save {
            return Err(ConfigError::Other("simulated save failure".into()));
        }
        state.blobs.insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}
