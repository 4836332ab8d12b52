//! Configuration file support.

use rhi_transcast_core::Settings;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default CLI options.
    pub defaults: Defaults,
    /// Registry settings, overridden by `--settings` and `--strict`.
    pub settings: Settings,
}

/// Default CLI options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Enable verbose output by default.
    pub verbose: bool,
    /// Enable quiet output by default.
    pub quiet: bool,
    /// Register the built-in string and number converters.
    pub builtins: bool,
    /// Units to discover at startup. Empty means every declared unit.
    pub units: Vec<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            verbose: false,
            quiet: false,
            builtins: true,
            units: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from the default location (~/.config/transcast/config.toml).
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Load config from a specific path.
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("transcast").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhi_transcast_core::DefaultPolicy;

    #[test]
    fn test_empty_config() {
        let config = Config::parse("").unwrap();
        assert!(config.defaults.builtins);
        assert!(config.defaults.units.is_empty());
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn test_settings_section() {
        let config = Config::parse(
            r#"
[defaults]
verbose = true
units = ["temperature"]

[settings]
strict = true
default_policy = "throw_on_missing_default"

[settings.number_format]
decimal_separator = ","
thousands_separator = "."
"#,
        )
        .unwrap();

        assert!(config.defaults.verbose);
        assert_eq!(config.defaults.units, vec!["temperature".to_string()]);
        assert!(config.settings.strict);
        assert_eq!(
            config.settings.default_policy,
            DefaultPolicy::ThrowOnMissingDefault
        );
        assert_eq!(config.settings.number_format.decimal_separator, ',');
        assert_eq!(config.settings.capacity, Settings::default().capacity);
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = Config::load_from_path(Some(PathBuf::from("/nonexistent/transcast.toml")));
        assert!(config.defaults.builtins);
    }
}
