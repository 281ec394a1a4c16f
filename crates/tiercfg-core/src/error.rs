use std::num::{ParseFloatError, ParseIntError};
use std::path::PathBuf;

/// Boxed error returned by pluggable collaborators (secret backends, symbol loaders).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("section/key [{section}/{key}] not found in config")]
    NotFound { section: String, key: String },

    #[error("Cannot execute {command}. Error code is: {exit_code}. Output: {stdout}, Stderr: {stderr}")]
    CommandExecution {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Cannot execute {command}: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command {command} timed out after {timeout_secs}s")]
    CommandTimeout { command: String, timeout_secs: u64 },

    #[error(
        "The value for configuration option \"{section}:{key}\" is not a boolean (received \"{value}\")."
    )]
    ValueFormat {
        section: String,
        key: String,
        value: String,
    },

    #[error(
        "The value for configuration option \"{section}:{key}\" is not an integer (received \"{value}\")."
    )]
    IntParse {
        section: String,
        key: String,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error(
        "The value for configuration option \"{section}:{key}\" is not a float (received \"{value}\")."
    )]
    FloatParse {
        section: String,
        key: String,
        value: String,
        #[source]
        source: ParseFloatError,
    },

    #[error(
        "The object could not be loaded. Please check \"{key}\" key in \"{section}\" section. Current value: \"{path}\"."
    )]
    SymbolLoad {
        section: String,
        key: String,
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("Secret backend lookup for '{identifier}' failed: {source}")]
    SecretBackend {
        identifier: String,
        #[source]
        source: BoxError,
    },

    /// Cross-setting validation failure; aborts the load that triggered it.
    #[error("{0}")]
    Dependency(String),

    #[error("Bad interpolation in [{section}] {key}: {reason}")]
    Interpolation {
        section: String,
        key: String,
        reason: String,
    },

    #[error("{source_name}:{line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("failed to write config: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// True when the error only means "no tier produced a value".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_not_found() {
        let err = ConfigError::NotFound {
            section: "core".into(),
            key: "executor".into(),
        };
        assert_eq!(
            err.to_string(),
            "section/key [core/executor] not found in config"
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_display_command_execution() {
        let err = ConfigError::CommandExecution {
            command: "false".into(),
            exit_code: 1,
            stdout: String::new(),
            stderr: "boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot execute false. Error code is: 1. Output: , Stderr: boom"
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_display_value_format() {
        let err = ConfigError::ValueFormat {
            section: "core".into(),
            key: "unit_test_mode".into(),
            value: "maybe".into(),
        };
        assert_eq!(
            err.to_string(),
            "The value for configuration option \"core:unit_test_mode\" is not a boolean (received \"maybe\")."
        );
    }

    #[test]
    fn test_int_parse_keeps_source() {
        let source = "abc".parse::<i64>().unwrap_err();
        let err = ConfigError::IntParse {
            section: "core".into(),
            key: "parallelism".into(),
            value: "abc".into(),
            source,
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("core:parallelism"));
    }

    #[test]
    fn test_display_symbol_load() {
        let err = ConfigError::SymbolLoad {
            section: "core".into(),
            key: "task_runner".into(),
            path: "no.such.Thing".into(),
            source: "module not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "The object could not be loaded. Please check \"task_runner\" key in \"core\" section. Current value: \"no.such.Thing\"."
        );
    }

    #[test]
    fn test_display_parse() {
        let err = ConfigError::Parse {
            source_name: "airflow.cfg".into(),
            line: 7,
            message: "option outside of a section".into(),
        };
        assert_eq!(err.to_string(), "airflow.cfg:7: option outside of a section");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConfigError>();
    }
}
