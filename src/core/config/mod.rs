//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! A single user-level file names the platform instances crossforge can
//! talk to. Each entry carries a URL, an optional type, an optional
//! username, a request timeout and optionally a token.
//!
//! # Config Locations
//!
//! Searched in order:
//! 1. `$CROSSFORGE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/crossforge/config.toml`
//! 3. `~/.crossforge/config.toml` (canonical write location)
//!
//! # Tokens
//!
//! `CROSSFORGE_<NAME>_TOKEN` overrides the `token` key of the platform
//! called `<NAME>`. The name is upper-cased and every character outside
//! `[A-Z0-9]` becomes `_`.
//!
//! # Example
//!
//! ```no_run
//! use crossforge::core::config::Config;
//!
//! let result = Config::load().unwrap();
//! let config = result.config;
//!
//! if let Some(name) = config.default_platform() {
//!     let platform = config.platform(name).unwrap();
//!     println!("{} -> {}", name, platform.url);
//! }
//! ```

pub mod schema;

pub use schema::{GlobalConfig, PlatformConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CROSSFORGE_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("platform '{0}' is not configured")]
    UnknownPlatform(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Loaded configuration plus where it came from.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub global: GlobalConfig,
    /// Path to the config file (if loaded)
    path: Option<PathBuf>,
}

impl Config {
    /// Wrap an in-memory configuration.
    pub fn new(global: GlobalConfig) -> Self {
        Self { global, path: None }
    }

    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// fails validation. A missing file is not an error.
    pub fn load() -> Result<ConfigLoadResult, ConfigError> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => Ok(ConfigLoadResult {
                config: Config::default(),
                warnings: Vec::new(),
            }),
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<ConfigLoadResult, ConfigError> {
        let global = Self::read_config(path)?;
        global.validate()?;

        let warnings = global
            .platforms
            .iter()
            .filter(|(_, p)| p.token.is_some())
            .map(|(name, _)| ConfigWarning {
                message: format!(
                    "platform '{}' stores its token in the config file; consider {} instead",
                    name,
                    token_env_var(name)
                ),
                path: path.to_path_buf(),
            })
            .collect();

        Ok(ConfigLoadResult {
            config: Config {
                global,
                path: Some(path.to_path_buf()),
            },
            warnings,
        })
    }

    /// Find the first existing config file.
    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("crossforge/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        let path = dirs::home_dir()?.join(".crossforge/config.toml");
        path.exists().then_some(path)
    }

    fn read_config(path: &Path) -> Result<GlobalConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for the config file.
    ///
    /// Returns `~/.crossforge/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".crossforge/config.toml"))
    }

    /// Validate and write config to the canonical location.
    pub fn write_global(config: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::global_config_path()?;
        Self::write_to(&path, config)?;
        Ok(path)
    }

    /// Validate and write config to `path`.
    ///
    /// Creates parent directories if needed. The file is written to a
    /// sibling temp file and renamed into place.
    pub fn write_to(path: &Path, config: &GlobalConfig) -> Result<(), ConfigError> {
        config.validate()?;
        write_config_atomic(path, config)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Name of the platform used when none is given.
    ///
    /// Falls back to the only configured platform when exactly one exists.
    pub fn default_platform(&self) -> Option<&str> {
        if let Some(name) = self.global.default_platform.as_deref() {
            return Some(name);
        }
        let mut names = self.global.platforms.keys();
        match (names.next(), names.next()) {
            (Some(only), None) => Some(only.as_str()),
            _ => None,
        }
    }

    /// Configured platform names, sorted.
    pub fn platform_names(&self) -> impl Iterator<Item = &str> {
        self.global.platforms.keys().map(String::as_str)
    }

    /// Settings for the platform called `name`, with the token resolved
    /// from the environment when `CROSSFORGE_<NAME>_TOKEN` is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownPlatform` if no such entry exists.
    pub fn platform(&self, name: &str) -> Result<PlatformConfig, ConfigError> {
        self.platform_with(name, |key| std::env::var(key).ok())
    }

    fn platform_with(
        &self,
        name: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<PlatformConfig, ConfigError> {
        let mut platform = self
            .global
            .platforms
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownPlatform(name.to_string()))?;

        if let Some(token) = lookup(&token_env_var(name)).filter(|t| !t.trim().is_empty()) {
            platform.token = Some(token);
        }
        Ok(platform)
    }

    /// Get the path to the loaded config file.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Environment variable holding the token for platform `name`.
pub fn token_env_var(name: &str) -> String {
    let normalized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("CROSSFORGE_{}_TOKEN", normalized)
}

fn write_config_atomic<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    // Same directory so the rename stays on one filesystem
    let temp_path = path.with_extension("toml.tmp");
    let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;

    file.write_all(contents.as_bytes())
        .map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

    file.sync_all().map_err(|e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;

    fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
