use std::path::Path;

use tiercfg_core::{ConfigError, Result};
use tiercfg_process::{CommandRunner, ShellCommandRunner};
use tracing::debug;

use crate::deprecation::DeprecationTables;
use crate::env::{Environment, ProcessEnvironment, env_var_name, expand_env_var};
use crate::ini::IniTable;
use crate::sensitive::SensitiveRegistry;
use crate::sources::SecretBackend;

pub const DEFAULT_ENV_PREFIX: &str = "AIRFLOW";
pub const DEFAULT_MASK: &str = "< hidden >";

/// Knobs for naming, masking and export behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// `PREFIX` in `PREFIX__SECTION__KEY`.
    pub env_prefix: String,
    /// Sections whose environment-sourced keys are exported without
    /// lower-casing; their keys are passed through to another environment.
    pub verbatim_key_sections: Vec<String>,
    /// Environment variables shown in exports even when sensitive values are masked.
    pub unmasked_env_vars: Vec<String>,
    pub mask: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            verbatim_key_sections: vec!["kubernetes_environment_variables".to_string()],
            unmasked_env_vars: vec![format!("{DEFAULT_ENV_PREFIX}__CORE__UNIT_TEST_MODE")],
            mask: DEFAULT_MASK.to_string(),
        }
    }
}

/// The configuration store: built-in defaults, file-backed values and the
/// collaborators used to resolve sensitive settings.
///
/// Defaults are fixed at construction (apart from explicit removal). Every
/// load re-runs validation.
pub struct ConfigStore {
    pub(crate) defaults: IniTable,
    pub(crate) file: IniTable,
    pub(crate) env: Box<dyn Environment>,
    pub(crate) runner: Box<dyn CommandRunner>,
    pub(crate) secrets: Option<Box<dyn SecretBackend>>,
    pub(crate) sensitive: SensitiveRegistry,
    pub(crate) deprecations: DeprecationTables,
    pub(crate) options: StoreOptions,
    pub(crate) validated: bool,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("defaults", &self.defaults)
            .field("file", &self.file)
            .field("has_secret_backend", &self.secrets.is_some())
            .field("options", &self.options)
            .field("validated", &self.validated)
            .finish_non_exhaustive()
    }
}

impl ConfigStore {
    /// Build a store over the process environment with `sh -c` command
    /// execution and no secret backend.
    pub fn new(default_template: &str) -> Result<Self> {
        Ok(Self {
            defaults: IniTable::parse(default_template, "<defaults>")?,
            file: IniTable::new(),
            env: Box::new(ProcessEnvironment::new()),
            runner: Box::new(ShellCommandRunner::new()),
            secrets: None,
            sensitive: SensitiveRegistry::builtin(),
            deprecations: DeprecationTables::builtin(),
            options: StoreOptions::default(),
            validated: false,
        })
    }

    pub fn with_environment(mut self, env: impl Environment + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    pub fn with_command_runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    pub fn with_secret_backend(mut self, backend: impl SecretBackend + 'static) -> Self {
        self.secrets = Some(Box::new(backend));
        self
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_sensitive_registry(mut self, registry: SensitiveRegistry) -> Self {
        self.sensitive = registry;
        self
    }

    pub fn with_deprecations(mut self, tables: DeprecationTables) -> Self {
        self.deprecations = tables;
        self
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn sensitive_registry(&self) -> &SensitiveRegistry {
        &self.sensitive
    }

    pub fn deprecations(&self) -> &DeprecationTables {
        &self.deprecations
    }

    pub fn environment(&self) -> &dyn Environment {
        self.env.as_ref()
    }

    /// Whether the last load passed validation.
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub(crate) fn env_var_name(&self, section: &str, key: &str) -> String {
        env_var_name(&self.options.env_prefix, section, key)
    }

    pub(crate) fn expand(&self, value: &str) -> String {
        expand_env_var(value, self.env.as_ref())
    }

    /// Parse `text` into the file-backed table, then validate.
    pub fn read_str(&mut self, text: &str, source_name: &str) -> Result<()> {
        debug!(source = source_name, "Reading config");
        self.file.merge_str(text, source_name)?;
        self.validate()
    }

    /// Read a config file. A missing file is skipped (returns `false`), but
    /// validation still runs.
    pub fn read_file(&mut self, path: &Path) -> Result<bool> {
        let found = match std::fs::read_to_string(path) {
            Ok(text) => {
                debug!(path = %path.display(), "Reading config file");
                self.file.merge_str(&text, &path.display().to_string())?;
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, skipping");
                false
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        self.validate()?;
        Ok(found)
    }

    /// Merge `section -> key -> value` pairs into the file-backed table, then validate.
    pub fn read_dict<I, S, E, K, V>(&mut self, dict: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, E)>,
        S: AsRef<str>,
        E: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (section, entries) in dict {
            for (key, value) in entries {
                self.file.set(section.as_ref(), key.as_ref(), value);
            }
        }
        self.validate()
    }

    /// Set a file-backed value. Does not re-validate.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.file.set(section, key, value);
    }

    /// Remove `key` from the file-backed table and, when `remove_default`,
    /// from the defaults as well.
    pub fn remove_option(&mut self, section: &str, key: &str, remove_default: bool) {
        self.file.remove_option(section, key);
        if remove_default {
            self.defaults.remove_option(section, key);
        }
    }

    /// Section names from the defaults followed by file-only sections.
    pub fn sections(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .defaults
            .sections()
            .map(|s| s.name().to_string())
            .collect();
        for section in self.file.sections() {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(section.name())) {
                names.push(section.name().to_string());
            }
        }
        names
    }

    /// Detach the file-backed values, leaving an empty table behind.
    pub(crate) fn take_file_values(&mut self) -> (IniTable, bool) {
        (std::mem::take(&mut self.file), self.validated)
    }

    pub(crate) fn restore_file_values(&mut self, (file, validated): (IniTable, bool)) {
        self.file = file;
        self.validated = validated;
    }

    pub fn defaults(&self) -> &IniTable {
        &self.defaults
    }

    pub fn file_values(&self) -> &IniTable {
        &self.file
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
