//! Full snapshots of the effective configuration and INI output.

use std::io::Write;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use tiercfg_core::{ConfigError, Result, SourceTag};

use crate::ini::{delimiter, escape_percent, write_section};
use crate::store::ConfigStore;

/// What [`ConfigStore::as_dict`] includes and how values are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Pair each value with the tier it came from.
    pub display_source: bool,
    /// Show env, command and secret values instead of the mask.
    pub display_sensitive: bool,
    /// Uninterpolated values, with `%` escaped in env/command/secret values,
    /// so the output can be fed back in as a config file.
    pub raw: bool,
    pub include_env: bool,
    /// Replace `{key}_cmd` directives with the command output.
    pub include_cmds: bool,
    /// Replace `{key}_secret` directives with the secret.
    pub include_secret: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            display_source: false,
            display_sensitive: false,
            raw: false,
            include_env: true,
            include_cmds: true,
            include_secret: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExportValue {
    Plain(String),
    Sourced(String, SourceTag),
}

impl ExportValue {
    pub fn value(&self) -> &str {
        match self {
            Self::Plain(v) | Self::Sourced(v, _) => v,
        }
    }

    pub fn source(&self) -> Option<SourceTag> {
        match self {
            Self::Plain(_) => None,
            Self::Sourced(_, source) => Some(*source),
        }
    }
}

/// Ordered `section -> key -> value` snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    sections: Vec<(String, Vec<(String, ExportValue)>)>,
}

impl ConfigSnapshot {
    fn section_mut(&mut self, name: &str) -> &mut Vec<(String, ExportValue)> {
        let idx = match self
            .sections
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(i) => i,
            None => {
                self.sections.push((name.to_string(), Vec::new()));
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx].1
    }

    /// Keys match case-insensitively; an existing entry keeps its spelling.
    fn insert(&mut self, section: &str, key: String, value: ExportValue) {
        let entries = self.section_mut(section);
        match entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
            Some(slot) => slot.1 = value,
            None => entries.push((key, value)),
        }
    }

    fn remove(&mut self, section: &str, key: &str) {
        if let Some((_, entries)) = self
            .sections
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(section))
        {
            entries.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
        }
    }

    pub fn section(&self, name: &str) -> Option<&[(String, ExportValue)]> {
        self.sections
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, entries)| entries.as_slice())
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&ExportValue> {
        self.section(section)?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &[(String, ExportValue)])> {
        self.sections
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.as_slice()))
    }

    /// Write the snapshot as a config file. Source tags are dropped.
    pub fn write_ini<W: Write + ?Sized>(&self, out: &mut W, space_around_delimiters: bool) -> Result<()> {
        let delimiter = delimiter(space_around_delimiters);
        for (name, entries) in &self.sections {
            let items = entries.iter().map(|(k, v)| (k.as_str(), v.value()));
            write_section(out, name, items, delimiter).map_err(ConfigError::Write)?;
        }
        Ok(())
    }
}

impl Serialize for ConfigSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct Section<'a>(&'a [(String, ExportValue)]);

        impl Serialize for Section<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (k, v) in self.0 {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (name, entries) in &self.sections {
            map.serialize_entry(name, &Section(entries))?;
        }
        map.end()
    }
}

/// A section value coerced the way [`ConfigStore::get_section`] does.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SectionValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl SectionValue {
    fn coerce(raw: String) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Self::Float(f);
        }
        match raw.to_lowercase().as_str() {
            "t" | "true" => Self::Bool(true),
            "f" | "false" => Self::Bool(false),
            _ => Self::Str(raw),
        }
    }
}

impl ConfigStore {
    /// Snapshot every known section and key.
    ///
    /// Defaults are overlaid by file values, then by `PREFIX__*` environment
    /// variables, then by `_cmd` output, then by `_secret` values; the
    /// `_cmd`/`_secret` directive keys are dropped once replaced.
    pub fn as_dict(&self, opts: ExportOptions) -> Result<ConfigSnapshot> {
        let mut cfg = ConfigSnapshot::default();
        let tag = |value: String, source: SourceTag| {
            if opts.display_source {
                ExportValue::Sourced(value, source)
            } else {
                ExportValue::Plain(value)
            }
        };

        for (source, table) in [(SourceTag::Default, &self.defaults), (SourceTag::File, &self.file)] {
            for section in table.sections() {
                for (k, v) in table.items(section.name(), opts.raw)? {
                    cfg.insert(section.name(), k, tag(v, source));
                }
            }
        }

        if opts.include_env {
            self.overlay_env(&mut cfg, opts)?;
        }

        if opts.include_cmds {
            for id in self.sensitive.iter() {
                let Some(value) = self.cmd_option(id.section, id.key)? else {
                    continue;
                };
                if value.is_empty() {
                    continue;
                }
                cfg.insert(
                    id.section,
                    id.key.to_string(),
                    self.render_indirect(value, SourceTag::Command, opts),
                );
                cfg.remove(id.section, &format!("{}_cmd", id.key));
            }
        }

        if opts.include_secret {
            for id in self.sensitive.iter() {
                let Some(value) = self.secret_option(id.section, id.key)? else {
                    continue;
                };
                if value.is_empty() {
                    continue;
                }
                cfg.insert(
                    id.section,
                    id.key.to_string(),
                    self.render_indirect(value, SourceTag::Secret, opts),
                );
                cfg.remove(id.section, &format!("{}_secret", id.key));
            }
        }

        Ok(cfg)
    }

    fn overlay_env(&self, cfg: &mut ConfigSnapshot, opts: ExportOptions) -> Result<()> {
        let prefix = format!("{}__", self.options.env_prefix);
        for (name, _) in self.env.vars() {
            if !name.starts_with(&prefix) {
                continue;
            }
            let mut parts = name.splitn(3, "__");
            let (Some(_), Some(section), Some(key)) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let Some((mut value, _)) = self.env_var_option(section, key)? else {
                continue;
            };

            if !opts.display_sensitive && !self.options.unmasked_env_vars.contains(&name) {
                value = self.options.mask.clone();
            } else if opts.raw {
                value = escape_percent(&value);
            }
            let value = if opts.display_source {
                ExportValue::Sourced(value, SourceTag::Environment)
            } else {
                ExportValue::Plain(value)
            };

            let section = section.to_lowercase();
            let verbatim = self
                .options
                .verbatim_key_sections
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&section));
            let key = if verbatim {
                key.to_string()
            } else {
                key.to_lowercase()
            };
            cfg.insert(&section, key, value);
        }
        Ok(())
    }

    fn render_indirect(&self, value: String, source: SourceTag, opts: ExportOptions) -> ExportValue {
        let value = if opts.display_sensitive {
            value
        } else {
            self.options.mask.clone()
        };
        if opts.display_source {
            ExportValue::Sourced(value, source)
        } else if opts.raw {
            ExportValue::Plain(escape_percent(&value))
        } else {
            ExportValue::Plain(value)
        }
    }

    /// Raw merged entries of one section: defaults, then file values, then
    /// `PREFIX__SECTION__*` variables (with a `_CMD` suffix stripped).
    ///
    /// `None` when the section exists in neither table.
    fn merged_section(&self, section: &str) -> Result<Option<Vec<(String, String, SourceTag)>>> {
        if !self.defaults.has_section(section) && !self.file.has_section(section) {
            return Ok(None);
        }
        self.merged_entries(section).map(Some)
    }

    fn merged_entries(&self, section: &str) -> Result<Vec<(String, String, SourceTag)>> {
        let mut entries: Vec<(String, String, SourceTag)> = Vec::new();
        let mut upsert = |key: String, value: String, source: SourceTag| {
            match entries.iter_mut().find(|(k, _, _)| k.eq_ignore_ascii_case(&key)) {
                Some(slot) => {
                    slot.1 = value;
                    slot.2 = source;
                }
                None => entries.push((key, value, source)),
            }
        };

        for (source, table) in [(SourceTag::Default, &self.defaults), (SourceTag::File, &self.file)] {
            for (k, v) in table.items(section, true)? {
                upsert(k, v, source);
            }
        }

        let prefix = format!("{}__{}__", self.options.env_prefix, section.to_uppercase());
        for (name, _) in self.env.vars() {
            let Some(key) = name.strip_prefix(&prefix) else {
                continue;
            };
            let key = key.strip_suffix("_CMD").unwrap_or(key).to_lowercase();
            if let Some((value, source)) = self.env_var_option(section, &key)? {
                upsert(key, value, source);
            }
        }
        Ok(entries)
    }

    /// Known sections followed by sections named only by `PREFIX__SECTION__KEY`
    /// variables, lower-cased.
    fn sections_with_env(&self) -> Vec<String> {
        let mut names = self.sections();
        let prefix = format!("{}__", self.options.env_prefix);
        for (name, _) in self.env.vars() {
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let Some((section, key)) = rest.split_once("__") else {
                continue;
            };
            if section.is_empty() || key.is_empty() {
                continue;
            }
            if !names.iter().any(|n| n.eq_ignore_ascii_case(section)) {
                names.push(section.to_lowercase());
            }
        }
        names
    }

    /// One section with values coerced to int, float or bool where they parse.
    pub fn get_section(&self, section: &str) -> Result<Option<Vec<(String, SectionValue)>>> {
        Ok(self.merged_section(section)?.map(|entries| {
            entries
                .into_iter()
                .map(|(k, v, _)| (k, SectionValue::coerce(v)))
                .collect()
        }))
    }

    /// Write every section, including values currently supplied by the
    /// environment, so the output reloads to the same effective config.
    ///
    /// Sections that only exist in the environment are written too.
    pub fn write<W: Write + ?Sized>(&self, out: &mut W, space_around_delimiters: bool) -> Result<()> {
        let delimiter = delimiter(space_around_delimiters);
        for section in self.sections_with_env() {
            let entries = match self.merged_section(&section)? {
                Some(entries) => entries,
                None => match self.merged_entries(&section)? {
                    entries if entries.is_empty() => continue,
                    entries => entries,
                },
            };
            let rendered: Vec<(String, String)> = entries
                .into_iter()
                .map(|(k, v, source)| match source {
                    SourceTag::Default | SourceTag::File => (k, v),
                    _ => (k, escape_percent(&v)),
                })
                .collect();
            let items = rendered.iter().map(|(k, v)| (k.as_str(), v.as_str()));
            write_section(out, &section, items, delimiter).map_err(ConfigError::Write)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "export_tests.rs"]
mod tests;
