//! Layered configuration resolution.
//!
//! A setting is read from the environment (`PREFIX__SECTION__KEY`, optionally
//! via `_CMD` / `_SECRET` for sensitive keys), then the loaded config file
//! (again with `_cmd` / `_secret` indirection), then the built-in defaults.
//! Renamed options fall back to their old spelling with a warning, and
//! retired values are migrated on every load.

pub mod deprecation;
pub mod env;
pub mod export;
pub mod facade;
pub mod ini;
mod resolve;
pub mod sensitive;
pub mod sources;
pub mod store;
pub mod validate;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use deprecation::{DeprecatedOption, DeprecatedValue, DeprecationTables};
pub use env::{Environment, MapEnvironment, ProcessEnvironment, expand_env_var};
pub use export::{ConfigSnapshot, ExportOptions, ExportValue, SectionValue};
pub use facade::SharedConfig;
pub use ini::IniTable;
pub use resolve::parse_bool;
pub use sensitive::{SENSITIVE_CONFIG_VALUES, SensitiveRegistry};
pub use sources::{SecretBackend, SymbolLoader};
pub use store::{ConfigStore, StoreOptions};
pub use tiercfg_core::{ConfigError, Result, SourceTag};
pub use view::ConfigView;
