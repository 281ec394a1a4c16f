//! Read-only access for code that consumes configuration but must not load
//! or mutate it.

use tiercfg_core::{Result, SourceTag};

use crate::export::{ConfigSnapshot, ExportOptions, SectionValue};
use crate::store::ConfigStore;

#[derive(Debug, Clone, Copy)]
pub struct ConfigView<'a> {
    store: &'a ConfigStore,
}

impl ConfigStore {
    pub fn view(&self) -> ConfigView<'_> {
        ConfigView { store: self }
    }
}

impl<'a> ConfigView<'a> {
    pub fn get(&self, section: &str, key: &str) -> Result<String> {
        self.store.get(section, key)
    }

    pub fn get_with_source(&self, section: &str, key: &str) -> Result<(String, SourceTag)> {
        self.store.get_with_source(section, key)
    }

    pub fn get_or(&self, section: &str, key: &str, fallback: &str) -> Result<String> {
        self.store.get_or(section, key, fallback)
    }

    pub fn get_opt(&self, section: &str, key: &str) -> Result<Option<String>> {
        self.store.get_opt(section, key)
    }

    pub fn has_option(&self, section: &str, key: &str) -> Result<bool> {
        self.store.has_option(section, key)
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Result<bool> {
        self.store.get_bool(section, key)
    }

    pub fn get_int(&self, section: &str, key: &str) -> Result<i64> {
        self.store.get_int(section, key)
    }

    pub fn get_float(&self, section: &str, key: &str) -> Result<f64> {
        self.store.get_float(section, key)
    }

    pub fn get_section(&self, section: &str) -> Result<Option<Vec<(String, SectionValue)>>> {
        self.store.get_section(section)
    }

    pub fn sections(&self) -> Vec<String> {
        self.store.sections()
    }

    pub fn as_dict(&self, opts: ExportOptions) -> Result<ConfigSnapshot> {
        self.store.as_dict(opts)
    }

    pub fn is_validated(&self) -> bool {
        self.store.is_validated()
    }

    /// The underlying store, still borrowed immutably.
    pub fn store(&self) -> &'a ConfigStore {
        self.store
    }
}
