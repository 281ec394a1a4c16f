use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Identity of a single setting: a `(section, key)` pair.
///
/// Tables built from this type hold lower-case names; lookups lower-case the
/// incoming pair before comparing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SettingId {
    pub section: &'static str,
    pub key: &'static str,
}

impl SettingId {
    pub const fn new(section: &'static str, key: &'static str) -> Self {
        Self { section, key }
    }

    /// Case-insensitive comparison against a runtime pair.
    pub fn matches(&self, section: &str, key: &str) -> bool {
        self.section.eq_ignore_ascii_case(section) && self.key.eq_ignore_ascii_case(key)
    }
}

impl std::fmt::Display for SettingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.section, self.key)
    }
}

/// Tier that produced a value. Only attached when attribution is requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceTag {
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "file")]
    File,
    #[serde(rename = "env var")]
    Environment,
    #[serde(rename = "cmd")]
    Command,
    #[serde(rename = "secret")]
    Secret,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::File => "file",
            Self::Environment => "env var",
            Self::Command => "cmd",
            Self::Secret => "secret",
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
