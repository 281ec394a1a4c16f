//! Lookup strategies beyond plain table reads: environment variables,
//! `_cmd` / `_secret` indirection, and the external collaborators behind them.

use tiercfg_core::{BoxError, ConfigError, Result, SourceTag};

use crate::store::ConfigStore;

/// External secret store consulted for `_secret` settings.
pub trait SecretBackend: Send + Sync {
    /// Look up a config value by path or identifier. `Ok(None)` means the
    /// backend has nothing under that name.
    fn get_config(&self, identifier: &str) -> std::result::Result<Option<String>, BoxError>;
}

/// Resolves a fully qualified symbol name (e.g. `pkg.module.Class`) to a value.
pub trait SymbolLoader {
    type Symbol;

    fn load(&self, name: &str) -> std::result::Result<Self::Symbol, BoxError>;
}

impl ConfigStore {
    /// `PREFIX__SECTION__KEY`, then `..._CMD`, then `..._SECRET`.
    ///
    /// The `_CMD` and `_SECRET` forms are only honoured for sensitive settings.
    pub(crate) fn env_var_option(
        &self,
        section: &str,
        key: &str,
    ) -> Result<Option<(String, SourceTag)>> {
        let name = self.env_var_name(section, key);
        if let Some(value) = self.env.var(&name) {
            return Ok(Some((self.expand(&value), SourceTag::Environment)));
        }

        let sensitive = self.sensitive.contains(section, key);
        if let Some(command) = self.env.var(&format!("{name}_CMD"))
            && sensitive
        {
            let output = self.runner.run(&command)?;
            return Ok(Some((output, SourceTag::Command)));
        }
        if let Some(identifier) = self.env.var(&format!("{name}_SECRET"))
            && sensitive
            && let Some(value) = self.fetch_secret(&identifier)?
        {
            return Ok(Some((value, SourceTag::Secret)));
        }
        Ok(None)
    }

    /// Run the command stored under `{key}_cmd` in the file-backed table.
    pub(crate) fn cmd_option(&self, section: &str, key: &str) -> Result<Option<String>> {
        if !self.sensitive.contains(section, key) {
            return Ok(None);
        }
        match self.file.get(section, &format!("{key}_cmd"))? {
            Some(command) => self.runner.run(&command).map(Some),
            None => Ok(None),
        }
    }

    /// Fetch the secret named by `{key}_secret` in the file-backed table.
    pub(crate) fn secret_option(&self, section: &str, key: &str) -> Result<Option<String>> {
        if !self.sensitive.contains(section, key) {
            return Ok(None);
        }
        match self.file.get(section, &format!("{key}_secret"))? {
            Some(identifier) => self.fetch_secret(&identifier),
            None => Ok(None),
        }
    }

    fn fetch_secret(&self, identifier: &str) -> Result<Option<String>> {
        let Some(backend) = self.secrets.as_deref() else {
            return Ok(None);
        };
        backend
            .get_config(identifier)
            .map_err(|source| ConfigError::SecretBackend {
                identifier: identifier.to_string(),
                source,
            })
    }
}
