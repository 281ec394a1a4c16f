use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tiercfg_core::OutputFormat;

#[derive(Parser)]
#[command(name = "tiercfg")]
#[command(about = "Resolve layered configuration: environment, config file, built-in defaults")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub sources: SourceArgs,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

/// Where the defaults and the config file come from. Nothing is located or
/// created implicitly.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Built-in defaults template
    #[arg(long, global = true, value_name = "PATH")]
    pub defaults: Option<PathBuf>,

    /// Config file layered over the defaults (skipped if missing)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Kill `_cmd` commands that run longer than this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub command_timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the effective value of one setting
    Get {
        section: String,
        key: String,

        /// Printed when no tier has the setting
        #[arg(long)]
        fallback: Option<String>,

        /// Also print which tier supplied the value
        #[arg(long)]
        source: bool,
    },

    /// Print every section and key of the effective configuration
    List {
        /// Show which tier supplied each value
        #[arg(long)]
        source: bool,

        /// Show environment, command and secret values instead of masking them
        #[arg(long)]
        sensitive: bool,

        /// Do not interpolate; escape '%' in environment-supplied values
        #[arg(long)]
        raw: bool,

        /// Leave out PREFIX__SECTION__KEY environment variables
        #[arg(long)]
        no_env: bool,

        /// Do not run `_cmd` commands
        #[arg(long)]
        no_cmds: bool,

        /// Do not query the secret backend
        #[arg(long)]
        no_secrets: bool,
    },

    /// Load and validate the configuration
    Validate,

    /// Write the effective configuration as a config file
    Write {
        /// No spaces around '='
        #[arg(long)]
        compact: bool,

        /// Destination file (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tiercfg",
            "get",
            "core",
            "executor",
            "--defaults",
            "/etc/tiercfg/defaults.cfg",
            "--fallback",
            "SequentialExecutor",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(
            cli.sources.defaults,
            Some(PathBuf::from("/etc/tiercfg/defaults.cfg"))
        );
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Get {
                section,
                key,
                fallback,
                source,
            } => {
                assert_eq!(section, "core");
                assert_eq!(key, "executor");
                assert_eq!(fallback.as_deref(), Some("SequentialExecutor"));
                assert!(!source);
            }
            _ => panic!("expected get"),
        }
    }

    #[test]
    fn parse_list_flags() {
        let cli = Cli::try_parse_from([
            "tiercfg",
            "--config",
            "airflow.cfg",
            "list",
            "--source",
            "--no-env",
            "--no-secrets",
        ])
        .unwrap();
        assert_eq!(cli.sources.config, Some(PathBuf::from("airflow.cfg")));
        match cli.command {
            Commands::List {
                source,
                no_env,
                no_cmds,
                no_secrets,
                ..
            } => {
                assert!(source);
                assert!(no_env);
                assert!(!no_cmds);
                assert!(no_secrets);
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn parse_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["tiercfg", "validate", "--format", "yaml"]).is_err());
    }
}
