//! forge::factory
//!
//! Adapter selection and creation.
//!
//! # Design
//!
//! Callers build adapters through [`create_adapter`] rather than naming a
//! concrete backend, so code written against [`PlatformAdapter`] works the
//! same for every platform.
//!
//! # Platform Detection
//!
//! When a config entry has no `type`, the platform is inferred from the
//! URL host:
//! - hosts containing `github` → [`GitHubAdapter`]
//! - hosts containing `gitlab` → [`GitLabAdapter`]
//!
//! # Example
//!
//! ```ignore
//! use crossforge::core::config::PlatformConfig;
//! use crossforge::forge::create_adapter;
//!
//! let adapter = create_adapter(&PlatformConfig {
//!     platform_type: Some("gitlab".into()),
//!     url: "https://gitlab.example.com".into(),
//!     token: Some(token),
//!     ..Default::default()
//! })?;
//! let me = adapter.get_current_user().await?;
//! ```

use std::time::Duration;

use reqwest::Url;

use super::github::GitHubAdapter;
use super::gitlab::GitLabAdapter;
use super::traits::{ForgeError, PlatformAdapter};
use crate::core::config::PlatformConfig;

/// Supported platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformKind {
    GitHub,
    GitLab,
}

impl PlatformKind {
    /// All supported platforms.
    ///
    /// ```
    /// use crossforge::forge::PlatformKind;
    ///
    /// assert_eq!(PlatformKind::all().len(), 2);
    /// ```
    pub fn all() -> &'static [PlatformKind] {
        &[PlatformKind::GitHub, PlatformKind::GitLab]
    }

    /// Name as written in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            PlatformKind::GitHub => "github",
            PlatformKind::GitLab => "gitlab",
        }
    }

    /// Parse a platform name, case-insensitively.
    ///
    /// ```
    /// use crossforge::forge::PlatformKind;
    ///
    /// assert_eq!(PlatformKind::parse("GitLab"), Some(PlatformKind::GitLab));
    /// assert_eq!(PlatformKind::parse("bitbucket"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "github" => Some(PlatformKind::GitHub),
            "gitlab" => Some(PlatformKind::GitLab),
            _ => None,
        }
    }

    /// Infer the platform from a web URL's host.
    ///
    /// ```
    /// use crossforge::forge::PlatformKind;
    ///
    /// assert_eq!(
    ///     PlatformKind::detect("https://gitlab.example.com"),
    ///     Some(PlatformKind::GitLab)
    /// );
    /// assert_eq!(PlatformKind::detect("https://git.example.com"), None);
    /// ```
    pub fn detect(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_lowercase();
        if host.contains("github") {
            Some(PlatformKind::GitHub)
        } else if host.contains("gitlab") {
            Some(PlatformKind::GitLab)
        } else {
            None
        }
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Names accepted for the `type` key in configuration.
pub fn valid_platform_names() -> Vec<&'static str> {
    PlatformKind::all().iter().map(PlatformKind::name).collect()
}

/// Resolve the platform for a config entry: explicit `type` first, then
/// URL detection.
///
/// # Errors
///
/// Returns `ForgeError::Platform` if the type is unknown or cannot be
/// detected.
pub fn resolve_kind(config: &PlatformConfig) -> Result<PlatformKind, ForgeError> {
    match config.platform_type.as_deref() {
        Some(name) => PlatformKind::parse(name).ok_or_else(|| {
            ForgeError::platform(
                name,
                format!(
                    "unsupported platform type '{}', expected one of: {}",
                    name,
                    valid_platform_names().join(", ")
                ),
            )
        }),
        None => PlatformKind::detect(&config.url).ok_or_else(|| {
            ForgeError::platform(
                "unknown",
                format!(
                    "cannot detect platform for '{}'; set `type` explicitly",
                    config.url
                ),
            )
        }),
    }
}

/// Build an adapter for a config entry.
///
/// No network traffic happens here; authentication is deferred to the
/// first operation.
///
/// # Errors
///
/// See [`resolve_kind`].
pub fn create_adapter(config: &PlatformConfig) -> Result<Box<dyn PlatformAdapter>, ForgeError> {
    let kind = resolve_kind(config)?;
    let timeout = config.timeout_secs.map(Duration::from_secs);
    let token = config.token.clone();
    let username = config.username.clone();

    let adapter: Box<dyn PlatformAdapter> = match kind {
        PlatformKind::GitHub => {
            let mut adapter = GitHubAdapter::new(config.url.as_str(), token, username);
            if let Some(timeout) = timeout {
                adapter = adapter.with_timeout(timeout);
            }
            Box::new(adapter)
        }
        PlatformKind::GitLab => {
            let mut adapter = GitLabAdapter::new(config.url.as_str(), token, username);
            if let Some(timeout) = timeout {
                adapter = adapter.with_timeout(timeout);
            }
            Box::new(adapter)
        }
    };

    Ok(adapter)
}
