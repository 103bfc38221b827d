//! Session configuration.

use std::time::Duration;

use thiserror::Error;

use crate::moderation::ModerationMode;

/// Chat endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080/ws/chat";

/// Moderation service used when none is configured.
pub const DEFAULT_MODERATION_URL: &str = "http://localhost:5000";

/// Upper bound on a single moderation request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Buffered change notifications per subscriber before it lags.
pub const DEFAULT_CHANGE_CAPACITY: usize = 256;

/// Invalid configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Chat endpoint is not a `ws://` or `wss://` URL.
    #[error("chat endpoint must start with ws:// or wss://, got {0:?}")]
    InvalidEndpoint(String),

    /// Moderation base URL is not an `http://` or `https://` URL.
    #[error("moderation url must start with http:// or https://, got {0:?}")]
    InvalidModerationUrl(String),

    /// Change capacity is zero.
    #[error("change capacity must be greater than zero")]
    InvalidCapacity,

    /// Request timeout is zero.
    #[error("moderation request timeout must be greater than zero")]
    InvalidTimeout,

    /// Moderation mode name not recognized.
    #[error("unknown moderation mode {0:?} (expected client-checked or server-authoritative)")]
    UnknownModerationMode(String),
}

/// Moderation service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationConfig {
    /// Policy for this deployment.
    pub mode: ModerationMode,
    /// Base URL of the moderation service, without a trailing path.
    pub base_url: String,
    /// Upper bound on a single request.
    pub request_timeout: Duration,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            mode: ModerationMode::default(),
            base_url: DEFAULT_MODERATION_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Everything a session needs besides the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Chat endpoint.
    pub endpoint: String,
    /// Moderation settings.
    pub moderation: ModerationConfig,
    /// Change notification buffer per subscriber.
    pub change_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            moderation: ModerationConfig::default(),
            change_capacity: DEFAULT_CHANGE_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Check the configuration before a session is built from it.
    ///
    /// # Errors
    ///
    /// The first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !has_scheme(&self.endpoint, &["ws://", "wss://"]) {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        if !has_scheme(&self.moderation.base_url, &["http://", "https://"]) {
            return Err(ConfigError::InvalidModerationUrl(self.moderation.base_url.clone()));
        }
        if self.change_capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        if self.moderation.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes.iter().any(|scheme| url.len() > scheme.len() && url.starts_with(scheme))
}
