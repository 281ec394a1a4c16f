use anyhow::Result;
use clap::Parser;

mod cli;
mod config_cmds;

use cli::{Cli, Commands};
use tiercfg_config::ExportOptions;

fn main() -> Result<()> {
    // Initialize tracing (output to stderr, initialize only once)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let format = cli.format;

    match cli.command {
        Commands::Get {
            section,
            key,
            fallback,
            source,
        } => {
            config_cmds::handle_config_get(
                &cli.sources,
                &section,
                &key,
                fallback.as_deref(),
                source,
                format,
            )?;
        }
        Commands::List {
            source,
            sensitive,
            raw,
            no_env,
            no_cmds,
            no_secrets,
        } => {
            let opts = ExportOptions {
                display_source: source,
                display_sensitive: sensitive,
                raw,
                include_env: !no_env,
                include_cmds: !no_cmds,
                include_secret: !no_secrets,
            };
            config_cmds::handle_config_list(&cli.sources, opts, format)?;
        }
        Commands::Validate => {
            config_cmds::handle_config_validate(&cli.sources, format)?;
        }
        Commands::Write { compact, output } => {
            config_cmds::handle_config_write(&cli.sources, compact, output.as_deref())?;
        }
    }

    Ok(())
}
