//! Settings that may be fetched through a command or a secret backend.
//!
//! These can be supplied as the stdout of a command (`{key}_cmd` in the file,
//! `PREFIX__{SECTION}__{KEY}_CMD` in the environment) or from a secret
//! backend (`{key}_secret` / `..._SECRET`), so passwords never need to sit in
//! a text file. Anything not listed here silently ignores those hints.

use tiercfg_core::SettingId;

pub const SENSITIVE_CONFIG_VALUES: &[SettingId] = &[
    SettingId::new("core", "sql_alchemy_conn"),
    SettingId::new("core", "fernet_key"),
    SettingId::new("celery", "broker_url"),
    SettingId::new("celery", "flower_basic_auth"),
    SettingId::new("celery", "result_backend"),
    // Old spelling of result_backend; drop together with the rename entry.
    SettingId::new("celery", "celery_result_backend"),
    SettingId::new("atlas", "password"),
    SettingId::new("smtp", "smtp_password"),
    SettingId::new("ldap", "bind_password"),
    SettingId::new("kubernetes", "git_password"),
];

#[derive(Debug, Clone, Copy)]
pub struct SensitiveRegistry {
    entries: &'static [SettingId],
}

impl SensitiveRegistry {
    pub const fn new(entries: &'static [SettingId]) -> Self {
        Self { entries }
    }

    pub const fn builtin() -> Self {
        Self::new(SENSITIVE_CONFIG_VALUES)
    }

    pub fn contains(&self, section: &str, key: &str) -> bool {
        self.entries.iter().any(|id| id.matches(section, key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static SettingId> {
        self.entries.iter()
    }
}

impl Default for SensitiveRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
