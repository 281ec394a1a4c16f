//! Sectioned `key = value` tables: parsing, `%(name)s` interpolation, writing.
//!
//! Section and key lookups ignore ASCII case; names keep the spelling they
//! were first stored with. Order of sections and keys is preserved so a
//! written file reads like the one that was loaded.

use std::io::Write;

use tiercfg_core::{ConfigError, Result};

const MAX_INTERPOLATION_DEPTH: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniSection {
    name: String,
    entries: Vec<(String, String)>,
}

impl IniSection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.entries[i].1.as_str())
    }

    fn set(&mut self, key: &str, value: String) {
        match self.position(key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniTable {
    sections: Vec<IniSection>,
}

impl IniTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str, source_name: &str) -> Result<Self> {
        let mut table = Self::new();
        table.merge_str(text, source_name)?;
        Ok(table)
    }

    /// Parse `text` on top of the current contents; later values win.
    pub fn merge_str(&mut self, text: &str, source_name: &str) -> Result<()> {
        let parse_error = |line: usize, message: String| ConfigError::Parse {
            source_name: source_name.to_string(),
            line,
            message,
        };

        let mut current: Option<usize> = None;
        let mut last_key: Option<String> = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let indented = raw_line.starts_with(|c: char| c.is_whitespace());
            if indented && let (Some(section), Some(key)) = (current, last_key.as_deref()) {
                let section = &mut self.sections[section];
                let mut value = section.get(key).unwrap_or_default().to_string();
                value.push('\n');
                value.push_str(line);
                section.set(key, value);
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(parse_error(line_no, format!("unterminated section header: {line}")));
                };
                let name = name.trim();
                if name.is_empty() {
                    return Err(parse_error(line_no, "empty section name".to_string()));
                }
                current = Some(self.section_index_or_insert(name));
                last_key = None;
                continue;
            }

            let Some(section) = current else {
                return Err(parse_error(
                    line_no,
                    format!("option outside of a section: {line}"),
                ));
            };
            let Some(split) = line.find(['=', ':']) else {
                return Err(parse_error(line_no, format!("expected `key = value`: {line}")));
            };
            let key = line[..split].trim_end();
            if key.is_empty() {
                return Err(parse_error(line_no, format!("missing option name: {line}")));
            }
            let value = line[split + 1..].trim();
            self.sections[section].set(key, value.to_string());
            last_key = Some(key.to_string());
        }
        Ok(())
    }

    fn section_index(&self, name: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    fn section_index_or_insert(&mut self, name: &str) -> usize {
        match self.section_index(name) {
            Some(i) => i,
            None => {
                self.sections.push(IniSection::new(name));
                self.sections.len() - 1
            }
        }
    }

    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.section_index(name).map(|i| &self.sections[i])
    }

    pub fn sections(&self) -> impl Iterator<Item = &IniSection> {
        self.sections.iter()
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.section_index(name).is_some()
    }

    pub fn has_option(&self, section: &str, key: &str) -> bool {
        self.get_raw(section, key).is_some()
    }

    pub fn get_raw(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }

    /// Value with `%(name)s` references and `%%` escapes resolved.
    pub fn get(&self, section: &str, key: &str) -> Result<Option<String>> {
        let Some(sect) = self.section(section) else {
            return Ok(None);
        };
        match sect.get(key) {
            Some(raw) => interpolate(sect, key, raw, 1).map(Some),
            None => Ok(None),
        }
    }

    /// Entries of `section`, interpolated unless `raw`.
    pub fn items(&self, section: &str, raw: bool) -> Result<Vec<(String, String)>> {
        let Some(sect) = self.section(section) else {
            return Ok(Vec::new());
        };
        sect.entries()
            .map(|(k, v)| {
                let value = if raw {
                    v.to_string()
                } else {
                    interpolate(sect, k, v, 1)?
                };
                Ok((k.to_string(), value))
            })
            .collect()
    }

    /// Insert or replace, creating the section when needed.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let idx = self.section_index_or_insert(section);
        self.sections[idx].set(key, value.into());
    }

    pub fn remove_option(&mut self, section: &str, key: &str) -> bool {
        match self.section_index(section) {
            Some(i) => self.sections[i].remove(key),
            None => false,
        }
    }
}

fn interpolation_error(section: &IniSection, key: &str, reason: String) -> ConfigError {
    ConfigError::Interpolation {
        section: section.name.clone(),
        key: key.to_string(),
        reason,
    }
}

fn interpolate(section: &IniSection, key: &str, value: &str, depth: usize) -> Result<String> {
    if !value.contains('%') {
        return Ok(value.to_string());
    }
    if depth > MAX_INTERPOLATION_DEPTH {
        return Err(interpolation_error(
            section,
            key,
            format!("recursion limit exceeded in {value:?}"),
        ));
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        if let Some(after) = rest.strip_prefix("%%") {
            out.push('%');
            rest = after;
        } else if let Some(reference) = rest.strip_prefix("%(") {
            let Some(close) = reference.find(")s") else {
                return Err(interpolation_error(
                    section,
                    key,
                    format!("bad interpolation variable reference {rest:?}"),
                ));
            };
            let name = &reference[..close];
            let Some(target) = section.get(name) else {
                return Err(interpolation_error(
                    section,
                    key,
                    format!("bad reference %({name})s"),
                ));
            };
            out.push_str(&interpolate(section, key, target, depth + 1)?);
            rest = &reference[close + 2..];
        } else {
            return Err(interpolation_error(
                section,
                key,
                format!("'%' must be followed by '%' or '(', found: {rest:?}"),
            ));
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Escape `%` so the value reads back literally through interpolation.
pub fn escape_percent(value: &str) -> String {
    value.replace('%', "%%")
}

pub(crate) fn delimiter(space_around_delimiters: bool) -> &'static str {
    if space_around_delimiters { " = " } else { "=" }
}

/// Write one `[section]` block followed by a blank line.
pub fn write_section<'a, W, I>(out: &mut W, name: &str, entries: I, delimiter: &str) -> std::io::Result<()>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    writeln!(out, "[{name}]")?;
    for (key, value) in entries {
        writeln!(out, "{key}{delimiter}{}", value.replace('\n', "\n\t"))?;
    }
    writeln!(out)
}

#[cfg(test)]
#[path = "ini_tests.rs"]
mod tests;
