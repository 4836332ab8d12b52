//! Registry settings and their on-disk forms.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a record without a default-taking function handles a supplied default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultPolicy {
    /// Call the single-argument function and substitute the default when
    /// it yields the target's zero value.
    #[default]
    UseWrapper,
    /// Fail with `ConverterFunctionDefaultNull`.
    ThrowOnMissingDefault,
}

/// Number formatting used by the built-in string converters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberFormat {
    pub decimal_separator: char,
    pub thousands_separator: Option<char>,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            thousands_separator: None,
        }
    }
}

impl NumberFormat {
    /// Rewrite `text` into the form Rust's parsers accept.
    pub fn normalize(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.trim().chars() {
            if Some(c) == self.thousands_separator {
                continue;
            }
            if c == self.decimal_separator {
                out.push('.');
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Format a float with the configured decimal separator.
    pub fn format_float(&self, value: impl std::fmt::Display) -> String {
        let text = value.to_string();
        if self.decimal_separator == '.' {
            text
        } else {
            text.replace('.', &self.decimal_separator.to_string())
        }
    }
}

/// Registry-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Accept converters whose source, target or argument type is generic.
    pub allow_generic_types: bool,
    /// Accept converters whose source or target is the any sentinel.
    pub allow_explicit_any_type: bool,
    /// When no converter matches, try identity and declared upcasts.
    pub allow_dynamic_fallback: bool,
    pub default_policy: DefaultPolicy,
    /// Run discovery over every declared unit on first use.
    pub auto_initialize: bool,
    /// Maximum number of records the registry holds.
    pub capacity: usize,
    /// Surface conversion failures as errors instead of zero values.
    pub strict: bool,
    pub number_format: NumberFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allow_generic_types: false,
            allow_explicit_any_type: false,
            allow_dynamic_fallback: true,
            default_policy: DefaultPolicy::default(),
            auto_initialize: false,
            capacity: 4096,
            strict: false,
            number_format: NumberFormat::default(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a file, picking the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| SettingsError::Io(e.to_string()))?;
        Self::from_bytes(&data, path.to_str())
    }

    /// Parse settings, taking the format from `path`'s extension. TOML when
    /// there is no recognisable extension.
    pub fn from_bytes(data: &[u8], path: Option<&str>) -> Result<Self, SettingsError> {
        let format = path.and_then(format_of_path).unwrap_or("toml");
        Self::from_bytes_format(data, format)
    }

    /// Parse settings written in `format` (`json`, `yaml`/`yml` or `toml`).
    pub fn from_bytes_format(data: &[u8], format: &str) -> Result<Self, SettingsError> {
        let parsed = match format {
            "json" => serde_json::from_slice(data).map_err(|e| e.to_string()),
            "yaml" | "yml" => serde_yaml::from_slice(data).map_err(|e| e.to_string()),
            "toml" => {
                let text = std::str::from_utf8(data).map_err(|_| SettingsError::NotUtf8)?;
                toml::from_str(text).map_err(|e| e.to_string())
            }
            other => return Err(SettingsError::UnknownFormat(other.to_string())),
        };
        parsed.map_err(SettingsError::Parse)
    }

    /// Render the settings in `format`.
    pub fn to_bytes(&self, format: &str) -> Result<Vec<u8>, SettingsError> {
        let rendered = match format {
            "json" => serde_json::to_vec_pretty(self).map_err(|e| e.to_string()),
            "yaml" | "yml" => serde_yaml::to_string(self)
                .map(String::into_bytes)
                .map_err(|e| e.to_string()),
            "toml" => toml::to_string_pretty(self)
                .map(String::into_bytes)
                .map_err(|e| e.to_string()),
            other => return Err(SettingsError::UnknownFormat(other.to_string())),
        };
        rendered.map_err(SettingsError::Render)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings file: {0}")]
    Io(String),

    #[error("settings file is not valid UTF-8")]
    NotUtf8,

    #[error("unknown settings format '{0}' (expected json, yaml or toml)")]
    UnknownFormat(String),

    #[error("invalid settings: {0}")]
    Parse(String),

    #[error("cannot render settings: {0}")]
    Render(String),
}

fn format_of_path(path: &str) -> Option<&'static str> {
    let (_, ext) = path.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "json" => Some("json"),
        "yaml" | "yml" => Some("yaml"),
        "toml" => Some("toml"),
        _ => None,
    }
}
