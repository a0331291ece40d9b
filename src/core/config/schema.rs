//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Config File
//!
//! Located at (in order of precedence):
//! 1. `$CROSSFORGE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/crossforge/config.toml`
//! 3. `~/.crossforge/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Config values are validated after parsing: platform types must be known,
//! URLs must be http(s), and the default platform must be configured.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Top-level configuration.
///
/// # Example
///
/// ```toml
/// default_platform = "work"
///
/// [platforms.work]
/// type = "gitlab"
/// url = "https://gitlab.example.com"
/// username = "alice"
/// timeout_secs = 30
///
/// [platforms.github]
/// type = "github"
/// url = "https://github.com"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Platform used when none is named
    pub default_platform: Option<String>,

    /// Configured platforms by name
    pub platforms: BTreeMap<String, PlatformConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, platform) in &self.platforms {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "platform name cannot be empty".to_string(),
                ));
            }
            platform
                .validate()
                .map_err(|e| ConfigError::InvalidValue(format!("platform '{}': {}", name, e)))?;
        }

        if let Some(default) = &self.default_platform {
            if !self.platforms.contains_key(default) {
                return Err(ConfigError::InvalidValue(format!(
                    "default_platform '{}' is not configured",
                    default
                )));
            }
        }

        Ok(())
    }
}

/// Connection settings for one platform instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformConfig {
    /// "github" or "gitlab"; detected from the URL host when unset
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub platform_type: Option<String>,

    /// Web URL of the instance
    pub url: String,

    /// Login of the token owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Per-request timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Access token. `CROSSFORGE_<NAME>_TOKEN` takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl PlatformConfig {
    /// Validate one platform entry.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(kind) = &self.platform_type {
            let valid = crate::forge::valid_platform_names();
            if !valid.contains(&kind.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid type '{}', must be one of: {}",
                    kind,
                    valid.join(", ")
                )));
            }
        }

        let url = self.url.trim();
        if url.is_empty() {
            return Err(ConfigError::InvalidValue("url cannot be empty".to_string()));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue(format!(
                "url '{}' must start with http:// or https://",
                url
            )));
        }

        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Display for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.platform_type {
            Some(kind) => write!(f, "{} ({})", self.url, kind),
            None => f.write_str(&self.url),
        }
    }
}
