use tiercfg_core::{ConfigError, Result};

use crate::deprecation::warn_value_migrated;
use crate::store::ConfigStore;

/// Executors that run tasks in-process and so tolerate sqlite.
const SQLITE_SAFE_EXECUTORS: &[&str] = &["DebugExecutor", "SequentialExecutor"];
const OWNER_MODES: &[&str] = &["user", "ldapgroup"];
pub const LDAP_AUTH_BACKEND: &str = "airflow.contrib.auth.backends.ldap_auth";

/// Process start methods available on this platform.
pub fn supported_start_methods() -> &'static [&'static str] {
    if cfg!(windows) {
        &["spawn"]
    } else {
        &["fork", "spawn", "forkserver"]
    }
}

impl ConfigStore {
    /// Check cross-setting rules, then rewrite retired values.
    ///
    /// Runs automatically after every load. Leaves the store marked
    /// unvalidated when a rule fails.
    pub fn validate(&mut self) -> Result<()> {
        self.validated = false;
        self.validate_config_dependencies()?;
        self.migrate_deprecated_values()?;
        self.validated = true;
        Ok(())
    }

    fn validate_config_dependencies(&self) -> Result<()> {
        let executor = self.get_opt("core", "executor")?;
        let conn = self.get_opt("core", "sql_alchemy_conn")?;
        if let (Some(executor), Some(conn)) = (executor.as_deref(), conn.as_deref())
            && !SQLITE_SAFE_EXECUTORS.contains(&executor)
            && conn.contains("sqlite")
        {
            return Err(ConfigError::Dependency(format!(
                "error: cannot use sqlite with the {executor}"
            )));
        }

        if self.get_bool_or("webserver", "authenticate", false)? {
            let owner_mode = self.get_opt("webserver", "owner_mode")?.unwrap_or_default();
            if !OWNER_MODES.contains(&owner_mode.as_str()) {
                return Err(ConfigError::Dependency(
                    "error: owner_mode option should be either 'user' or 'ldapgroup' when \
                     filtering by owner is set"
                        .to_string(),
                ));
            }
            let auth_backend = self.get_opt("webserver", "auth_backend")?;
            if owner_mode.eq_ignore_ascii_case("ldapgroup")
                && auth_backend.as_deref() != Some(LDAP_AUTH_BACKEND)
            {
                return Err(ConfigError::Dependency(
                    "error: attempt at using ldapgroup filtering without using the Ldap backend"
                        .to_string(),
                ));
            }
        }

        if let Some(method) = self.get_opt("core", "mp_start_method")? {
            let supported = supported_start_methods();
            if !supported.contains(&method.as_str()) {
                return Err(ConfigError::Dependency(format!(
                    "mp_start_method should not be {method}. Possible values are {}",
                    supported.join(", ")
                )));
            }
        }
        Ok(())
    }

    fn migrate_deprecated_values(&mut self) -> Result<()> {
        for entry in self.deprecations.values() {
            if self.get_opt(entry.section, entry.key)?.as_deref() != Some(entry.old_value) {
                continue;
            }
            // Drop the override, otherwise it would win over the value set below.
            let env_var = self.env_var_name(entry.section, entry.key);
            self.env.remove_var(&env_var);
            self.file.set(entry.section, entry.key, entry.new_value);
            warn_value_migrated(entry);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
