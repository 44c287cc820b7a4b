// ── Core error types ──
//
// User-facing errors from netbridge-core. Consumers never see raw socket
// or JSON failures; the `From<netbridge_api::Error>` impl folds them into
// the handful of situations a user can act on.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Endpoint errors ──────────────────────────────────────────────
    #[error("Invalid API address {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to event stream: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Event stream closed (code {code}): {reason}")]
    StreamClosed { code: u16, reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Malformed event: {message}")]
    MalformedEvent { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<netbridge_api::Error> for CoreError {
    fn from(err: netbridge_api::Error) -> Self {
        use netbridge_api::Error as ApiError;

        match err {
            ApiError::InvalidUrl(e) => CoreError::InvalidEndpoint {
                url: String::new(),
                reason: e.to_string(),
            },
            ApiError::UnsupportedScheme { scheme } => CoreError::InvalidEndpoint {
                url: String::new(),
                reason: format!("scheme '{scheme}' has no streaming equivalent"),
            },
            ApiError::WebSocketConnect(reason) | ApiError::WebSocket(reason) => {
                CoreError::ConnectionFailed { reason }
            }
            ApiError::WebSocketClosed { code, reason } => CoreError::StreamClosed { code, reason },
            ApiError::MissingEventType
            | ApiError::UnknownEventType(_)
            | ApiError::Deserialization { .. } => CoreError::MalformedEvent {
                message: err.to_string(),
            },
        }
    }
}
