//! Application configuration value object

use serde::{Deserialize, Serialize};

/// Default minimum ring buffer capacity per speaker, in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub base_uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub buffer_size: Option<usize>,
}

/// Everything the conversion client needs to reach the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Service root without a trailing slash
    pub base_uri: String,
    pub username: String,
    pub password: String,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            base_uri: None,
            username: None,
            password: None,
            buffer_size: Some(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            base_uri: other.base_uri.or(self.base_uri),
            username: other.username.or(self.username),
            password: other.password.or(self.password),
            buffer_size: other.buffer_size.or(self.buffer_size),
        }
    }

    /// Get buffer size, or the default if not set or zero
    pub fn buffer_size_or_default(&self) -> usize {
        self.buffer_size
            .filter(|&size| size > 0)
            .unwrap_or(DEFAULT_BUFFER_SIZE)
    }

    /// Service credentials, or None when any of them is missing or the base
    /// URI is not an absolute http(s) URL. A client built from None is disabled.
    pub fn credentials(&self) -> Option<Credentials> {
        let base_uri = non_blank(&self.base_uri)?.trim();
        let username = non_blank(&self.username)?;
        let password = non_blank(&self.password)?;

        let host = base_uri
            .strip_prefix("https://")
            .or_else(|| base_uri.strip_prefix("http://"))?;
        if host.trim_end_matches('/').is_empty() {
            return None;
        }

        Some(Credentials {
            base_uri: base_uri.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// The value as given, unless it is missing or only whitespace
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}
