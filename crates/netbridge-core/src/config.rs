// ── Runtime session configuration ──
//
// Describes *where* the event stream lives and how the session behaves.
// Carries the session token but never touches disk: the CLI builds a
// `SessionConfig` from its profile and hands it in.

use std::time::Duration;

use netbridge_api::{DEFAULT_BUFFER_CAPACITY, DEFAULT_RECONNECT_DELAY, StreamConfig};
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Recent-activity entries kept on the dashboard.
pub const DEFAULT_ACTIVITY_LIMIT: usize = 20;

/// Configuration for one live session against a backend.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// REST API base address (e.g. `https://bridge.example.com/api/`).
    pub api_url: Url,
    /// Session token; `None` leaves the session unauthenticated until a
    /// token is published through [`LiveSession::credentials`].
    ///
    /// [`LiveSession::credentials`]: crate::LiveSession::credentials
    pub token: Option<SecretString>,
    pub user_id: Option<String>,
    pub reconnect_delay: Duration,
    /// Per-subscriber event buffer (drop-oldest beyond this).
    pub buffer_capacity: usize,
    /// Entries kept in `DashboardSnapshot::recent_activity`.
    pub activity_limit: usize,
}

impl SessionConfig {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            token: None,
            user_id: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            activity_limit: DEFAULT_ACTIVITY_LIMIT,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: SecretString, user_id: Option<String>) -> Self {
        self.token = Some(token);
        self.user_id = user_id;
        self
    }

    /// Stream-client tuning derived from this config.
    pub fn stream_config(&self) -> Result<StreamConfig, CoreError> {
        let config = StreamConfig::new(self.api_url.clone()).map_err(|e| {
            CoreError::InvalidEndpoint {
                url: self.api_url.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(config
            .with_reconnect_delay(self.reconnect_delay)
            .with_buffer_capacity(self.buffer_capacity))
    }
}
