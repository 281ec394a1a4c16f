//! Precedence chain and typed accessors.
//!
//! Tiers are tried in order: environment (plain, `_CMD`, `_SECRET`), file,
//! file `_cmd`, file `_secret`, defaults. Each tier is fully exhausted,
//! including a retry under the deprecated name, before the next one is
//! consulted.

use tiercfg_core::{ConfigError, Result, SourceTag};
use tracing::{error, warn};

use crate::deprecation::warn_renamed;
use crate::sources::SymbolLoader;
use crate::store::ConfigStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Environment,
    File,
    Command,
    Secret,
    Default,
}

const TIERS: [Tier; 5] = [
    Tier::Environment,
    Tier::File,
    Tier::Command,
    Tier::Secret,
    Tier::Default,
];

impl ConfigStore {
    fn lookup_tier(&self, tier: Tier, section: &str, key: &str) -> Result<Option<(String, SourceTag)>> {
        let found = match tier {
            Tier::Environment => return self.env_var_option(section, key),
            Tier::File => self
                .file
                .get(section, key)?
                .map(|v| (self.expand(&v), SourceTag::File)),
            // Empty command/secret output counts as "nothing here".
            Tier::Command => self
                .cmd_option(section, key)?
                .filter(|v| !v.is_empty())
                .map(|v| (v, SourceTag::Command)),
            Tier::Secret => self
                .secret_option(section, key)?
                .filter(|v| !v.is_empty())
                .map(|v| (v, SourceTag::Secret)),
            Tier::Default => self
                .defaults
                .get(section, key)?
                .map(|v| (self.expand(&v), SourceTag::Default)),
        };
        Ok(found)
    }

    /// Walk the precedence chain. `Ok(None)` when no tier has a value.
    pub(crate) fn lookup(&self, section: &str, key: &str) -> Result<Option<(String, SourceTag)>> {
        let section = section.to_lowercase();
        let key = key.to_lowercase();
        let old_name = self.deprecations.old_name_for(&section, &key);

        for tier in TIERS {
            if let Some(found) = self.lookup_tier(tier, &section, &key)? {
                return Ok(Some(found));
            }
            if let Some(old) = old_name
                && let Some(found) = self.lookup_tier(tier, &section, old)?
            {
                warn_renamed(&section, &key, old);
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn not_found(section: &str, key: &str) -> ConfigError {
        let section = section.to_lowercase();
        let key = key.to_lowercase();
        warn!("section/key [{section}/{key}] not found in config");
        ConfigError::NotFound { section, key }
    }

    /// Resolve `section.key`, failing with [`ConfigError::NotFound`] when no
    /// tier has it.
    pub fn get(&self, section: &str, key: &str) -> Result<String> {
        self.get_with_source(section, key).map(|(value, _)| value)
    }

    /// Like [`get`](Self::get) but also reports which tier produced the value.
    pub fn get_with_source(&self, section: &str, key: &str) -> Result<(String, SourceTag)> {
        self.lookup(section, key)?
            .ok_or_else(|| Self::not_found(section, key))
    }

    /// Resolve `section.key`, returning `fallback` when no tier has it.
    pub fn get_or(&self, section: &str, key: &str, fallback: &str) -> Result<String> {
        Ok(self
            .lookup(section, key)?
            .map_or_else(|| fallback.to_string(), |(value, _)| value))
    }

    /// Resolve `section.key`, `None` when no tier has it. Never warns.
    pub fn get_opt(&self, section: &str, key: &str) -> Result<Option<String>> {
        Ok(self.lookup(section, key)?.map(|(value, _)| value))
    }

    pub fn get_opt_with_source(&self, section: &str, key: &str) -> Result<Option<(String, SourceTag)>> {
        self.lookup(section, key)
    }

    /// True when any tier resolves `section.key`.
    pub fn has_option(&self, section: &str, key: &str) -> Result<bool> {
        Ok(self.lookup(section, key)?.is_some())
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Result<bool> {
        let value = self.get(section, key)?;
        parse_bool(section, key, &value)
    }

    pub fn get_bool_or(&self, section: &str, key: &str, fallback: bool) -> Result<bool> {
        match self.get_opt(section, key)? {
            Some(value) => parse_bool(section, key, &value),
            None => Ok(fallback),
        }
    }

    pub fn get_int(&self, section: &str, key: &str) -> Result<i64> {
        let value = self.get(section, key)?;
        value
            .trim()
            .parse()
            .map_err(|source| ConfigError::IntParse {
                section: section.to_lowercase(),
                key: key.to_lowercase(),
                value,
                source,
            })
    }

    pub fn get_float(&self, section: &str, key: &str) -> Result<f64> {
        let value = self.get(section, key)?;
        value
            .trim()
            .parse()
            .map_err(|source| ConfigError::FloatParse {
                section: section.to_lowercase(),
                key: key.to_lowercase(),
                value,
                source,
            })
    }

    /// Treat the value as a fully qualified symbol name and load it.
    ///
    /// An empty value yields `Ok(None)`.
    pub fn get_import<L>(&self, section: &str, key: &str, loader: &L) -> Result<Option<L::Symbol>>
    where
        L: SymbolLoader + ?Sized,
    {
        let path = self.get(section, key)?;
        if path.is_empty() {
            return Ok(None);
        }
        loader.load(&path).map(Some).map_err(|source| {
            error!(section, key, path = %path, "Failed to load configured symbol: {source}");
            ConfigError::SymbolLoad {
                section: section.to_lowercase(),
                key: key.to_lowercase(),
                path,
                source,
            }
        })
    }
}

/// `t`/`true`/`1` and `f`/`false`/`0`, case-insensitive; a trailing
/// `# comment` is ignored.
pub fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool> {
    let lowered = value.trim().to_lowercase();
    let cleaned = match lowered.split_once('#') {
        Some((before, _)) => before.trim(),
        None => lowered.as_str(),
    };
    match cleaned {
        "t" | "true" | "1" => Ok(true),
        "f" | "false" | "0" => Ok(false),
        _ => Err(ConfigError::ValueFormat {
            section: section.to_lowercase(),
            key: key.to_lowercase(),
            value: cleaned.to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
