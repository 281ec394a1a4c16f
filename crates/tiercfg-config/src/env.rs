//! Environment access and `$VAR` / `~` expansion.

use std::collections::{BTreeMap, HashSet};

/// Upper bound on expansion passes; self-referencing values stop here.
const MAX_EXPANSION_PASSES: usize = 32;

/// Read access to environment variables, plus the ability to hide one.
///
/// `remove_var` is used by value migration so a cleared override cannot bring
/// an old value back on the next lookup.
pub trait Environment: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;

    /// All visible variables, sorted by name.
    fn vars(&self) -> Vec<(String, String)>;

    fn remove_var(&mut self, name: &str);
}

/// The real process environment.
///
/// Removal hides the variable from this store only; the process environment
/// itself is never mutated.
#[derive(Debug, Default)]
pub struct ProcessEnvironment {
    hidden: HashSet<String>,
}

impl ProcessEnvironment {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        if self.hidden.contains(name) {
            return None;
        }
        std::env::var(name).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = std::env::vars()
            .filter(|(name, _)| !self.hidden.contains(name))
            .collect();
        vars.sort();
        vars
    }

    fn remove_var(&mut self, name: &str) {
        self.hidden.insert(name.to_string());
    }
}

/// In-memory environment for embedding and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MapEnvironment {
    vars: BTreeMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }
}

impl<K, V> FromIterator<(K, V)> for MapEnvironment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Environment for MapEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn remove_var(&mut self, name: &str) {
        self.vars.remove(name);
    }
}

/// `PREFIX__SECTION__KEY`, upper-cased, underscores preserved.
pub fn env_var_name(prefix: &str, section: &str, key: &str) -> String {
    format!(
        "{prefix}__{}__{}",
        section.to_uppercase(),
        key.to_uppercase()
    )
}

/// Expand `$NAME`, `${NAME}` and a leading `~` until the value stops changing.
///
/// Unknown variables are left as written.
pub fn expand_env_var(value: &str, env: &dyn Environment) -> String {
    let mut current = value.to_string();
    for _ in 0..MAX_EXPANSION_PASSES {
        let next = expand_user(&expand_vars(&current, env), env);
        if next == current {
            return next;
        }
        current = next;
    }
    current
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn expand_vars(value: &str, env: &dyn Environment) -> String {
    if !value.contains('$') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .char_indices()
                .find(|(_, c)| !is_name_char(*c))
                .map_or(after.len(), |(i, _)| i);
            (&after[..end], end)
        };

        match env.var(name).filter(|_| !name.is_empty()) {
            Some(found) => {
                out.push_str(&found);
                rest = &after[consumed..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn home_dir(env: &dyn Environment) -> Option<String> {
    env.var("HOME").or_else(|| {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_string_lossy().into_owned())
    })
}

/// Only `~` and `~/...` are expanded; `~user` is left alone.
fn expand_user(value: &str, env: &dyn Environment) -> String {
    let Some(after) = value.strip_prefix('~') else {
        return value.to_string();
    };
    if !(after.is_empty() || after.starts_with('/')) {
        return value.to_string();
    }
    let Some(home) = home_dir(env) else {
        return value.to_string();
    };
    let expanded = format!("{}{after}", home.trim_end_matches('/'));
    if expanded.is_empty() {
        "/".to_string()
    } else {
        expanded
    }
}
