use thiserror::Error;

/// Top-level error type for the `netbridge-api` crate.
///
/// None of these reach callers of [`EventStreamClient::connect`] or
/// [`EventStreamClient::disconnect`]; the stream client traces them and
/// recovers on its own. They surface from configuration helpers and from
/// the [`Connector`] seam. `netbridge-core` maps them into user-facing
/// diagnostics.
///
/// [`EventStreamClient::connect`]: crate::websocket::EventStreamClient::connect
/// [`EventStreamClient::disconnect`]: crate::websocket::EventStreamClient::disconnect
/// [`Connector`]: crate::transport::Connector
#[derive(Debug, Error)]
pub enum Error {
    // ── Endpoint ────────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// API base URL uses a scheme with no streaming equivalent.
    #[error("Unsupported URL scheme '{scheme}' (expected http, https, ws or wss)")]
    UnsupportedScheme { scheme: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection or handshake failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the remote end.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// Frame-level I/O or protocol error on an open socket.
    #[error("WebSocket transport error: {0}")]
    WebSocket(String),

    // ── Data ────────────────────────────────────────────────────────
    /// Frame carried no `type` discriminator.
    #[error("Event frame has no 'type' field")]
    MissingEventType,

    /// Frame carried a discriminator this client does not know.
    #[error("Unknown event type '{0}'")]
    UnknownEventType(String),

    /// JSON deserialization failed, with the raw frame for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the error came from the transport and a reconnect
    /// might resolve it.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the error concerns a single frame rather than the
    /// connection.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::MissingEventType | Self::UnknownEventType(_) | Self::Deserialization { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_transient() {
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(
            Error::WebSocketClosed {
                code: 1006,
                reason: String::new()
            }
            .is_transient()
        );
        assert!(!Error::MissingEventType.is_transient());
    }

    #[test]
    fn frame_errors_are_decode_errors() {
        assert!(Error::UnknownEventType("unknown_x".into()).is_decode());
        assert!(!Error::WebSocket("reset".into()).is_decode());
    }
}
