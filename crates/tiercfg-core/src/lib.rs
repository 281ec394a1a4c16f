//! Shared types for the layered configuration resolver.

pub mod error;
pub mod types;

pub use error::{BoxError, ConfigError, Result};
pub use types::{OutputFormat, SettingId, SourceTag};
