//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::query::Truncate;
use crate::view::ViewDefinition;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// User-defined views, added to the built-in catalog
    #[serde(default)]
    pub views: Vec<ViewDefinition>,
}

/// Table and form rendering configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Output width in characters; derived from the content when unset
    #[serde(default)]
    pub width: Option<usize>,

    /// Truncation for every column, overriding per-column settings
    #[serde(default)]
    pub truncate: Option<Truncate>,

    /// Maximum lines per cell, overriding per-column settings
    #[serde(default)]
    pub cell_height: Option<usize>,

    /// Print the query and symbolic field names
    #[serde(default)]
    pub verbose: bool,

    #[serde(default = "default_true")]
    pub show_timespan: bool,

    #[serde(default = "default_true")]
    pub show_title: bool,

    /// Heading printed above the output
    #[serde(skip)]
    pub title: Option<String>,

    #[serde(skip)]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub end_time: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: None,
            truncate: None,
            cell_height: None,
            verbose: false,
            show_timespan: default_true(),
            show_title: default_true(),
            title: None,
            start_time: None,
            end_time: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("eventview").join("config.toml")),
            Some(PathBuf::from("/etc/eventview/config.toml")),
            Some(PathBuf::from("./eventview.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Render overrides
        if let Some(width) = var("EVENTVIEW_WIDTH").and_then(|w| w.parse().ok()) {
            self.render.width = Some(width);
        }
        if let Some(truncate) = var("EVENTVIEW_TRUNCATE").and_then(|t| t.parse().ok()) {
            self.render.truncate = Some(truncate);
        }
        if let Some(height) = var("EVENTVIEW_CELL_HEIGHT").and_then(|h| h.parse().ok()) {
            self.render.cell_height = Some(height);
        }
        if let Some(verbose) = var("EVENTVIEW_VERBOSE") {
            self.render.verbose = matches!(verbose.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        // Logging overrides
        if let Some(level) = var("EVENTVIEW_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("EVENTVIEW_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Eventview Configuration
#
# Environment variables override these settings:
# - EVENTVIEW_WIDTH
# - EVENTVIEW_TRUNCATE
# - EVENTVIEW_CELL_HEIGHT
# - EVENTVIEW_VERBOSE
# - EVENTVIEW_LOG_LEVEL
# - EVENTVIEW_LOG_FORMAT

[render]
# Output width in characters (derived from the content when unset)
# width = 160

# Truncate overflowing text at the "beginning" or "end" of a cell
# truncate = "end"

# Maximum number of lines in a cell
# cell_height = 1

# Print the query text and symbolic field names
verbose = false

# Print the recording timespan below the title of a view
show_timespan = true

# Print the title of a view
show_title = true

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Custom views are added to the built-in catalog:
#
# [[views]]
# name = "long-pauses"
# category = "GC"
# label = "Long GC Pauses"
# query = "SELECT gcId, duration FROM GCPhasePause ORDER BY duration LIMIT 10"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.render.width, None);
        assert!(config.render.show_title);
        assert!(!config.render.verbose);
        assert_eq!(config.logging.level, "warn");
        assert!(config.views.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[render]
width = 120
truncate = "beginning"
cell_height = 3

[[views]]
name = "pauses"
category = "GC"
label = "Pauses"
query = "SELECT * FROM GCPhasePause"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.render.width, Some(120));
        assert_eq!(config.render.truncate, Some(Truncate::Beginning));
        assert_eq!(config.render.cell_height, Some(3));
        assert_eq!(config.views.len(), 1);
        assert_eq!(config.views[0].name, "pauses");
        assert!(!config.views[0].form);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[render\nwidth = ").unwrap();
        assert!(matches!(Config::load(&broken), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("EVENTVIEW_WIDTH", "80"),
            ("EVENTVIEW_TRUNCATE", "Beginning"),
            ("EVENTVIEW_CELL_HEIGHT", "not a number"),
            ("EVENTVIEW_VERBOSE", "true"),
            ("EVENTVIEW_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.render.width, Some(80));
        assert_eq!(config.render.truncate, Some(Truncate::Beginning));
        assert_eq!(config.render.cell_height, None);
        assert!(config.render.verbose);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "warn");
    }
}
