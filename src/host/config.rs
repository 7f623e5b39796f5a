//! Host configuration.

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading a [`HostConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid host configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("`placeholder` must not be empty")]
    EmptyPlaceholder,

    #[error("`max_segments` must be at least 1")]
    NoSegments,
}

/// Registration and dispatch settings for a [`Host`](super::Host).
///
/// Every field has a default, so a configuration file only needs the keys it changes:
///
/// ```
/// use waypath::HostConfig;
///
/// let config = HostConfig::from_json(r#"{ "lowercase_paths": true }"#).unwrap();
/// assert!(config.lowercase_paths);
/// assert_eq!(config.placeholder, "param");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Lowercase templates at registration and request paths at dispatch.
    pub lowercase_paths: bool,

    /// Name of the positional placeholder in templates, used as `{<placeholder>}`.
    pub placeholder: String,

    /// Log one `info` line per registered route.
    pub report_routes: bool,

    /// Requests with more path segments than this are rejected with `414` before the
    /// router is consulted.
    pub max_segments: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            lowercase_paths: false,
            placeholder: "param".to_owned(),
            report_routes: true,
            max_segments: 32,
        }
    }
}

impl HostConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Json`] for malformed JSON or unknown keys, and the validation
    /// variants for values the host cannot work with.
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values a host relies on.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.placeholder.is_empty() {
            return Err(ConfigError::EmptyPlaceholder);
        }
        if self.max_segments == 0 {
            return Err(ConfigError::NoSegments);
        }
        Ok(())
    }

    /// The placeholder as it appears in a template, e.g. `{param}`.
    pub fn placeholder_token(&self) -> String {
        format!("{{{}}}", self.placeholder)
    }
}
