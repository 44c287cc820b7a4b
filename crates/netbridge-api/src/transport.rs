//! Transport seam between the stream client and the socket library.
//!
//! The client drives a [`Connector`] to open one [`Connection`] per attempt
//! and reads [`Frame`]s from it until it ends. Production code uses
//! [`TungsteniteConnector`]; tests plug in an in-memory connector.

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;

/// Close code sent when the server closes without a status (RFC 6455 §7.1.5).
const NO_STATUS_RECEIVED: u16 = 1005;

/// What the client sees of an inbound WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text frame; candidates for event decoding.
    Text(String),
    /// The remote end closed the connection.
    Close { code: u16, reason: String },
    /// Binary, ping, pong and raw frames. Ignored by the client.
    Other,
}

/// An open, receive-only event connection.
pub trait Connection: Send {
    /// Next inbound frame. `None` means the stream ended without a close
    /// frame.
    fn next_frame(&mut self) -> BoxFuture<'_, Option<Result<Frame, Error>>>;

    /// Close the connection with the given status code and reason.
    fn close(&mut self, code: u16, reason: String) -> BoxFuture<'_, Result<(), Error>>;
}

/// Opens event connections.
pub trait Connector: Send + Sync {
    fn open(&self, url: Url) -> BoxFuture<'_, Result<Box<dyn Connection>, Error>>;
}

// ── tokio-tungstenite implementation ─────────────────────────────────

/// [`Connector`] backed by `tokio-tungstenite` (rustls, webpki roots).
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn open(&self, url: Url) -> BoxFuture<'_, Result<Box<dyn Connection>, Error>> {
        async move {
            let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            Ok(Box::new(TungsteniteConnection { stream }) as Box<dyn Connection>)
        }
        .boxed()
    }
}

struct TungsteniteConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connection for TungsteniteConnection {
    fn next_frame(&mut self) -> BoxFuture<'_, Option<Result<Frame, Error>>> {
        async move {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(Error::WebSocket(e.to_string()))),
            };
            Some(Ok(frame_from_message(message)))
        }
        .boxed()
    }

    fn close(&mut self, code: u16, reason: String) -> BoxFuture<'_, Result<(), Error>> {
        async move {
            let frame = CloseFrame {
                code: CloseCode::from(code),
                reason: reason.into(),
            };
            self.stream
                .close(Some(frame))
                .await
                .map_err(|e| Error::WebSocket(e.to_string()))
        }
        .boxed()
    }
}

fn frame_from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Close(Some(close)) => Frame::Close {
            code: u16::from(close.code),
            reason: close.reason.as_str().to_owned(),
        },
        Message::Close(None) => Frame::Close {
            code: NO_STATUS_RECEIVED,
            reason: String::new(),
        },
        // tungstenite answers pings itself
        Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
            Frame::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_becomes_text_frame() {
        let frame = frame_from_message(Message::text(r#"{"type":"router_status"}"#));
        assert_eq!(frame, Frame::Text(r#"{"type":"router_status"}"#.into()));
    }

    #[test]
    fn close_message_keeps_code_and_reason() {
        let frame = frame_from_message(Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "server restart".into(),
        })));
        assert_eq!(
            frame,
            Frame::Close {
                code: 1001,
                reason: "server restart".into()
            }
        );
    }

    #[test]
    fn bare_close_reports_no_status() {
        assert_eq!(
            frame_from_message(Message::Close(None)),
            Frame::Close {
                code: 1005,
                reason: String::new()
            }
        );
    }

    #[test]
    fn control_frames_are_ignored() {
        assert_eq!(frame_from_message(Message::Ping(Default::default())), Frame::Other);
        assert_eq!(frame_from_message(Message::binary(vec![1u8, 2, 3])), Frame::Other);
    }
}
