//! Process-wide handle for sharing one store across threads.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tiercfg_core::{Result, SourceTag};
use tracing::debug;

use crate::export::{ConfigSnapshot, ExportOptions};
use crate::store::ConfigStore;
use crate::view::ConfigView;

/// Cloneable handle around a [`ConfigStore`].
///
/// Getters take the read lock for the duration of one lookup; `reload_*`
/// takes the write lock and replaces the file-backed values wholesale.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<ConfigStore>>,
}

impl SharedConfig {
    pub fn new(store: ConfigStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Run `f` against a read-only view.
    pub fn read<T>(&self, f: impl FnOnce(ConfigView<'_>) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(guard.view())
    }

    /// Run `f` with exclusive access to the store.
    pub fn update<T>(&self, f: impl FnOnce(&mut ConfigStore) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn get(&self, section: &str, key: &str) -> Result<String> {
        self.read(|view| view.get(section, key))
    }

    pub fn get_with_source(&self, section: &str, key: &str) -> Result<(String, SourceTag)> {
        self.read(|view| view.get_with_source(section, key))
    }

    pub fn get_or(&self, section: &str, key: &str, fallback: &str) -> Result<String> {
        self.read(|view| view.get_or(section, key, fallback))
    }

    pub fn get_opt(&self, section: &str, key: &str) -> Result<Option<String>> {
        self.read(|view| view.get_opt(section, key))
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Result<bool> {
        self.read(|view| view.get_bool(section, key))
    }

    pub fn get_int(&self, section: &str, key: &str) -> Result<i64> {
        self.read(|view| view.get_int(section, key))
    }

    pub fn get_float(&self, section: &str, key: &str) -> Result<f64> {
        self.read(|view| view.get_float(section, key))
    }

    pub fn has_option(&self, section: &str, key: &str) -> Result<bool> {
        self.read(|view| view.has_option(section, key))
    }

    pub fn as_dict(&self, opts: ExportOptions) -> Result<ConfigSnapshot> {
        self.read(|view| view.as_dict(opts))
    }

    pub fn set(&self, section: &str, key: &str, value: impl Into<String>) {
        self.update(|store| store.set(section, key, value));
    }

    /// Replace the file-backed values with the contents of `path`.
    ///
    /// On failure the previous file-backed values are kept.
    pub fn reload_file(&self, path: &Path) -> Result<bool> {
        debug!(path = %path.display(), "Reloading config file");
        self.update(|store| {
            let previous = store.take_file_values();
            store.read_file(path).inspect_err(|_| store.restore_file_values(previous))
        })
    }

    /// Replace the file-backed values with `text`.
    ///
    /// On failure the previous file-backed values are kept.
    pub fn reload_str(&self, text: &str, source_name: &str) -> Result<()> {
        debug!(source = source_name, "Reloading config");
        self.update(|store| {
            let previous = store.take_file_values();
            store
                .read_str(text, source_name)
                .inspect_err(|_| store.restore_file_values(previous))
        })
    }
}

impl From<ConfigStore> for SharedConfig {
    fn from(store: ConfigStore) -> Self {
        Self::new(store)
    }
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
