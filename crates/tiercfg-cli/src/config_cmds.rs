use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use tiercfg_config::{ConfigSnapshot, ConfigStore, ExportOptions};
use tiercfg_core::{OutputFormat, SourceTag};
use tiercfg_process::ShellCommandRunner;

use crate::cli::SourceArgs;

/// Build a store from `--defaults` and `--config`, validating it.
///
/// Without `--defaults` the defaults tier is empty.
pub(crate) fn load_store(sources: &SourceArgs) -> Result<ConfigStore> {
    let template = match &sources.defaults {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read defaults {}", path.display()))?,
        None => String::new(),
    };
    let runner = match sources.command_timeout {
        Some(secs) => ShellCommandRunner::with_timeout(Duration::from_secs(secs)),
        None => ShellCommandRunner::new(),
    };
    let mut store = ConfigStore::new(&template)
        .context("Failed to parse defaults")?
        .with_command_runner(runner);

    match &sources.config {
        Some(path) => {
            let found = store
                .read_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            if !found {
                warn!(path = %path.display(), "Config file not found; using defaults and environment only");
            }
        }
        None => store.validate().context("Configuration is invalid")?,
    }
    debug!(sections = store.sections().len(), "Configuration loaded");
    Ok(store)
}

#[derive(Serialize)]
struct GetOutput<'a> {
    section: &'a str,
    key: &'a str,
    value: &'a str,
    source: Option<SourceTag>,
}

pub(crate) fn handle_config_get(
    sources: &SourceArgs,
    section: &str,
    key: &str,
    fallback: Option<&str>,
    show_source: bool,
    format: OutputFormat,
) -> Result<()> {
    let store = load_store(sources)?;
    println!(
        "{}",
        render_get(&store, section, key, fallback, show_source, format)?
    );
    Ok(())
}

fn render_get(
    store: &ConfigStore,
    section: &str,
    key: &str,
    fallback: Option<&str>,
    show_source: bool,
    format: OutputFormat,
) -> Result<String> {
    let (value, source) = match fallback {
        Some(fallback) => match store.get_opt_with_source(section, key)? {
            Some((value, source)) => (value, Some(source)),
            None => (fallback.to_string(), None),
        },
        None => {
            let (value, source) = store.get_with_source(section, key)?;
            (value, Some(source))
        }
    };

    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&GetOutput {
            section,
            key,
            value: &value,
            source,
        })?,
        OutputFormat::Text => match source {
            Some(source) if show_source => format!("{value}\t({source})"),
            _ => value,
        },
    })
}

pub(crate) fn handle_config_list(
    sources: &SourceArgs,
    opts: ExportOptions,
    format: OutputFormat,
) -> Result<()> {
    let store = load_store(sources)?;
    let snapshot = store.as_dict(opts)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render_list(&snapshot, opts.display_source, format, &mut out)?;
    out.flush()?;
    Ok(())
}

fn render_list(
    snapshot: &ConfigSnapshot,
    display_source: bool,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, snapshot)?;
            writeln!(out)?;
        }
        OutputFormat::Text if display_source => {
            for (section, entries) in snapshot.sections() {
                writeln!(out, "[{section}]")?;
                for (key, value) in entries {
                    match value.source() {
                        Some(source) => writeln!(out, "{key} = {}\t({source})", value.value())?,
                        None => writeln!(out, "{key} = {}", value.value())?,
                    }
                }
                writeln!(out)?;
            }
        }
        OutputFormat::Text => snapshot.write_ini(out, true)?,
    }
    Ok(())
}

pub(crate) fn handle_config_validate(sources: &SourceArgs, format: OutputFormat) -> Result<()> {
    let store = load_store(sources)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "valid": store.is_validated(), "sections": store.sections() })
        ),
        OutputFormat::Text => eprintln!(
            "Configuration is valid ({} sections)",
            store.sections().len()
        ),
    }
    Ok(())
}

pub(crate) fn handle_config_write(
    sources: &SourceArgs,
    compact: bool,
    output: Option<&Path>,
) -> Result<()> {
    let store = load_store(sources)?;
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            store.write(&mut out, !compact)?;
            out.flush()
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote configuration to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            store.write(&mut out, !compact)?;
            out.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_cmds_tests.rs"]
mod tests;
