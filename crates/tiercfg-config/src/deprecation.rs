//! Renamed options and retired values.
//!
//! A renamed option is still honoured under its old name: when the new name
//! yields nothing in a tier, the same tier is retried with the old name and a
//! warning is emitted. A retired value is rewritten once per load, during
//! validation, when the resolved value matches the old literal exactly.

use tracing::warn;

/// Tracing target for rename and value-migration warnings.
pub const DEPRECATION_TARGET: &str = "tiercfg::deprecation";

/// `section.old_key` has been renamed to `section.new_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeprecatedOption {
    pub section: &'static str,
    pub new_key: &'static str,
    pub old_key: &'static str,
}

/// `section.key = old_value` is replaced by `new_value`; the old value stops
/// being accepted in `removed_in`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeprecatedValue {
    pub section: &'static str,
    pub key: &'static str,
    pub old_value: &'static str,
    pub new_value: &'static str,
    pub removed_in: &'static str,
}

const fn renamed(
    section: &'static str,
    new_key: &'static str,
    old_key: &'static str,
) -> DeprecatedOption {
    DeprecatedOption {
        section,
        new_key,
        old_key,
    }
}

// Remove the celery entries in 1.11.
pub const DEPRECATED_OPTIONS: &[DeprecatedOption] = &[
    renamed("celery", "worker_concurrency", "celeryd_concurrency"),
    renamed("celery", "result_backend", "celery_result_backend"),
    renamed("celery", "broker_url", "celery_broker_url"),
    renamed("celery", "ssl_active", "celery_ssl_active"),
    renamed("celery", "ssl_cert", "celery_ssl_cert"),
    renamed("celery", "ssl_key", "celery_ssl_key"),
    renamed("elasticsearch", "host", "elasticsearch_host"),
    renamed("elasticsearch", "log_id_template", "elasticsearch_log_id_template"),
    renamed("elasticsearch", "end_of_log_mark", "elasticsearch_end_of_log_mark"),
    renamed("elasticsearch", "frontend", "elasticsearch_frontend"),
    renamed("elasticsearch", "write_stdout", "elasticsearch_write_stdout"),
    renamed("elasticsearch", "json_format", "elasticsearch_json_format"),
    renamed("elasticsearch", "json_fields", "elasticsearch_json_fields"),
];

pub const DEPRECATED_VALUES: &[DeprecatedValue] = &[DeprecatedValue {
    section: "core",
    key: "task_runner",
    old_value: "BashTaskRunner",
    new_value: "StandardTaskRunner",
    removed_in: "2.0",
}];

#[derive(Debug, Clone, Copy)]
pub struct DeprecationTables {
    options: &'static [DeprecatedOption],
    values: &'static [DeprecatedValue],
}

impl DeprecationTables {
    pub const fn new(
        options: &'static [DeprecatedOption],
        values: &'static [DeprecatedValue],
    ) -> Self {
        Self { options, values }
    }

    pub const fn builtin() -> Self {
        Self::new(DEPRECATED_OPTIONS, DEPRECATED_VALUES)
    }

    /// Old name to fall back to when `section.key` (the new name) is unset.
    pub fn old_name_for(&self, section: &str, key: &str) -> Option<&'static str> {
        self.options
            .iter()
            .find(|o| o.section.eq_ignore_ascii_case(section) && o.new_key.eq_ignore_ascii_case(key))
            .map(|o| o.old_key)
    }

    pub fn options(&self) -> &'static [DeprecatedOption] {
        self.options
    }

    pub fn values(&self) -> &'static [DeprecatedValue] {
        self.values
    }
}

impl Default for DeprecationTables {
    fn default() -> Self {
        Self::builtin()
    }
}

pub(crate) fn warn_renamed(section: &str, new_key: &str, old_key: &str) {
    warn!(
        target: DEPRECATION_TARGET,
        "The {old_key} option in [{section}] has been renamed to {new_key} - the old \
         setting has been used, but please update your config."
    );
}

pub(crate) fn warn_value_migrated(entry: &DeprecatedValue) {
    warn!(
        target: DEPRECATION_TARGET,
        "The {} setting in [{}] has the old default value of '{}'. This value has been \
         changed to '{}' in the running config, but please update your config before {}.",
        entry.key,
        entry.section,
        entry.old_value,
        entry.new_value,
        entry.removed_in
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_old_name_lookup() {
        let tables = DeprecationTables::builtin();
        assert_eq!(
            tables.old_name_for("celery", "worker_concurrency"),
            Some("celeryd_concurrency")
        );
        assert_eq!(
            tables.old_name_for("ELASTICSEARCH", "Host"),
            Some("elasticsearch_host")
        );
        assert_eq!(tables.old_name_for("celery", "celeryd_concurrency"), None);
        assert_eq!(tables.old_name_for("core", "executor"), None);
    }

    #[test]
    fn test_each_new_name_has_one_old_name() {
        for (i, a) in DEPRECATED_OPTIONS.iter().enumerate() {
            for b in &DEPRECATED_OPTIONS[i + 1..] {
                assert!(
                    !(a.section == b.section && a.new_key == b.new_key),
                    "duplicate rename for [{}] {}",
                    a.section,
                    a.new_key
                );
            }
            assert_ne!(a.new_key, a.old_key);
        }
    }

    #[test]
    fn test_value_migrations_change_the_value() {
        for entry in DEPRECATED_VALUES {
            assert_ne!(entry.old_value, entry.new_value);
            assert!(!entry.removed_in.is_empty());
        }
    }
}
