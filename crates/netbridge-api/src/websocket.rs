//! Live event stream with fixed-delay auto-reconnect.
//!
//! Keeps at most one connection to the backend event endpoint open, decodes
//! each text frame into an [`Event`] and republishes it through an
//! [`EventBus`]. Transport failures and remote closes are traced and
//! followed by a reconnect after a fixed delay, indefinitely. Nothing is
//! ever reported back to the caller of [`connect`](EventStreamClient::connect)
//! or [`disconnect`](EventStreamClient::disconnect).
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use netbridge_api::{EventStreamClient, SessionCredentials, StreamConfig};
//!
//! let credentials = SessionCredentials::with_token(token, Some(user_id));
//! let config = StreamConfig::new("https://bridge.example.com/api/".parse()?)?;
//! let client = EventStreamClient::with_tungstenite(config, Arc::new(credentials));
//!
//! let mut events = client.events();
//! client.connect();
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}: {}", event.kind(), event.timestamp());
//! }
//! ```
//!
//! # State machine
//!
//! ```text
//! Disconnected --connect()--> Connecting --no token--> Disconnected
//! Connecting --socket opens--> Open
//! Connecting --open fails--> Disconnected + reconnect timer
//! Open --remote close / transport error--> Disconnected + reconnect timer
//! Open --disconnect()--> Disconnected
//! reconnect timer fires --> connect()
//! ```
//!
//! Every transition happens under one mutex. Each attempt carries a
//! generation number, and results from an attempt that `disconnect()` or a
//! newer attempt has superseded are discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::bus::{DEFAULT_BUFFER_CAPACITY, EventBus, EventSubscription, MAX_BUFFER_CAPACITY};
use crate::credentials::CredentialStore;
use crate::endpoint;
use crate::error::Error;
use crate::event::{Event, parse_event};
use crate::transport::{Connection, Connector, Frame, TungsteniteConnector};

/// Wait between losing the stream and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

const NORMAL_CLOSURE: u16 = 1000;
const CLOSE_REASON: &str = "Disconnecting";

// ── StreamConfig ─────────────────────────────────────────────────────

/// Tuning for an [`EventStreamClient`].
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// REST API base address; the stream endpoint is derived from it.
    pub api_base_url: Url,

    /// Fixed delay before each reconnect attempt. Default: 5s.
    pub reconnect_delay: Duration,

    /// Undelivered events kept per subscriber before the oldest are
    /// dropped. Default: 64, at most [`MAX_BUFFER_CAPACITY`].
    pub buffer_capacity: usize,
}

impl StreamConfig {
    /// Config with default tuning. Fails if the base URL has no streaming
    /// equivalent.
    pub fn new(api_base_url: Url) -> Result<Self, Error> {
        endpoint::stream_base(&api_base_url)?;
        Ok(Self {
            api_base_url,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        })
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the per-subscriber buffer, clamped to `1..=MAX_BUFFER_CAPACITY`.
    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.clamp(1, MAX_BUFFER_CAPACITY);
        self
    }
}

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
///
/// A pending reconnect shows up as `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
}

// ── EventStreamClient ────────────────────────────────────────────────

/// Handle to the live event stream.
///
/// Owns every task it spawns: dropping the client closes the socket and
/// cancels any pending reconnect.
pub struct EventStreamClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: StreamConfig,
    credentials: Arc<dyn CredentialStore>,
    connector: Arc<dyn Connector>,
    runtime: Handle,
    bus: EventBus,
    slot: Mutex<ConnectionSlot>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
}

/// The single mutable connection record. Only touched with `Inner::slot`
/// held.
#[derive(Default)]
struct ConnectionSlot {
    state: ConnectionState,
    generation: u64,
    session: Option<CancellationToken>,
    reconnect: Option<CancellationToken>,
    /// Reconnects scheduled since the stream was last open.
    attempt: u32,
    /// Events published on the current connection.
    received: u64,
}

enum Transition {
    Opened,
    Abandoned,
    Lost,
}

impl EventStreamClient {
    /// Create a client. Does NOT connect -- call [`connect()`](Self::connect).
    ///
    /// Must be called from within a Tokio runtime; connection I/O and
    /// reconnect timers run on that runtime, so `connect()` and
    /// `disconnect()` may afterwards be called from any thread.
    pub fn new(
        config: StreamConfig,
        credentials: Arc<dyn CredentialStore>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let bus = EventBus::new(config.buffer_capacity);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(Inner {
                config,
                credentials,
                connector,
                runtime: Handle::current(),
                bus,
                slot: Mutex::new(ConnectionSlot::default()),
                state_tx,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Create a client that connects with [`TungsteniteConnector`].
    pub fn with_tungstenite(config: StreamConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        Self::new(config, credentials, Arc::new(TungsteniteConnector))
    }

    /// Start connecting unless a connection is already open or in flight.
    ///
    /// Returns immediately. A missing session token abandons the attempt
    /// without scheduling a retry; call `connect()` again once logged in.
    /// Calling this while a reconnect is pending connects right away.
    pub fn connect(&self) {
        self.inner.connect(None);
    }

    /// Close the connection with a normal-closure status and cancel any
    /// pending reconnect.
    ///
    /// Returns immediately. Once it has returned, nothing more is published
    /// from the old connection, and an attempt still in flight will never
    /// reach [`Open`](ConnectionState::Open).
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Subscribe to decoded events published from now on.
    pub fn events(&self) -> EventSubscription {
        self.inner.bus.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock_slot().state
    }

    /// Subscribe to connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// `true` while the stream is open and has delivered at least one
    /// event on the current connection.
    pub fn is_live(&self) -> bool {
        let slot = self.inner.lock_slot();
        slot.state == ConnectionState::Open && slot.received > 0
    }

    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }
}

impl Drop for EventStreamClient {
    fn drop(&mut self) {
        self.inner.disconnect();
        self.inner.shutdown.cancel();
    }
}

// ── State transitions ────────────────────────────────────────────────

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, ConnectionSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, slot: &mut ConnectionSlot, state: ConnectionState) {
        slot.state = state;
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    /// Begin a new attempt. `timer` is set when a reconnect timer fires, so
    /// a timer that lost the race against `disconnect()` stays silent.
    fn connect(self: &Arc<Self>, timer: Option<&CancellationToken>) {
        let mut slot = self.lock_slot();

        if self.shutdown.is_cancelled() || timer.is_some_and(CancellationToken::is_cancelled) {
            return;
        }
        if matches!(slot.state, ConnectionState::Connecting | ConnectionState::Open) {
            tracing::trace!(state = ?slot.state, "event stream already active, ignoring connect");
            return;
        }

        if let Some(pending) = slot.reconnect.take() {
            pending.cancel();
        }

        slot.generation += 1;
        slot.received = 0;
        let session = self.shutdown.child_token();
        slot.session = Some(session.clone());
        self.set_state(&mut slot, ConnectionState::Connecting);

        let generation = slot.generation;
        drop(slot);

        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            inner.run_session(generation, session).await;
        });
    }

    fn disconnect(&self) {
        let mut slot = self.lock_slot();

        if let Some(timer) = slot.reconnect.take() {
            timer.cancel();
        }
        if let Some(session) = slot.session.take() {
            session.cancel();
        }

        slot.generation += 1;
        slot.received = 0;
        slot.attempt = 0;
        if slot.state != ConnectionState::Disconnected {
            tracing::debug!("event stream disconnect requested");
        }
        self.set_state(&mut slot, ConnectionState::Disconnected);
    }

    /// Apply a transition reported by the attempt with `generation`.
    ///
    /// Returns `false` (and changes nothing) if that attempt has been
    /// superseded.
    fn transition(self: &Arc<Self>, generation: u64, transition: Transition) -> bool {
        let mut slot = self.lock_slot();
        if slot.generation != generation {
            return false;
        }

        match transition {
            Transition::Opened => {
                slot.attempt = 0;
                self.set_state(&mut slot, ConnectionState::Open);
            }
            Transition::Abandoned => {
                slot.session = None;
                self.set_state(&mut slot, ConnectionState::Disconnected);
            }
            Transition::Lost => {
                slot.session = None;
                slot.received = 0;
                self.set_state(&mut slot, ConnectionState::Disconnected);
                self.schedule_reconnect(&mut slot);
            }
        }
        true
    }

    fn schedule_reconnect(self: &Arc<Self>, slot: &mut ConnectionSlot) {
        if self.shutdown.is_cancelled() {
            return;
        }

        let timer = self.shutdown.child_token();
        if let Some(previous) = slot.reconnect.replace(timer.clone()) {
            previous.cancel();
        }
        slot.attempt = slot.attempt.saturating_add(1);

        let delay = self.config.reconnect_delay;
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt = slot.attempt,
            "Waiting before event stream reconnect"
        );

        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let fired = tokio::select! {
                biased;
                () = timer.cancelled() => false,
                () = tokio::time::sleep(delay) => true,
            };
            if fired {
                inner.connect(Some(&timer));
            }
        });
    }

    /// Decode a text frame and publish it if the attempt is still current.
    ///
    /// Publishing under the slot lock orders it strictly before or after
    /// any `disconnect()`.
    fn dispatch(&self, generation: u64, text: &str) {
        let event: Event = match parse_event(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "Dropping undecodable event frame");
                return;
            }
        };

        let mut slot = self.lock_slot();
        if slot.generation != generation || slot.state != ConnectionState::Open {
            return;
        }
        slot.received += 1;
        let delivered = self.bus.publish(event);
        tracing::trace!(delivered, "event published");
    }
}

// ── Single connection lifecycle ──────────────────────────────────────

enum SessionEnd {
    Cancelled,
    Lost,
}

impl Inner {
    async fn run_session(self: Arc<Self>, generation: u64, session: CancellationToken) {
        let token = tokio::select! {
            biased;
            () = session.cancelled() => return,
            token = self.credentials.token() => token,
        };

        let Some(token) = token else {
            tracing::debug!("No session token, abandoning event stream connection");
            self.transition(generation, Transition::Abandoned);
            return;
        };

        let url = match endpoint::stream_url(&self.config.api_base_url, &token) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot derive event stream URL");
                self.transition(generation, Transition::Lost);
                return;
            }
        };

        tracing::info!(url = %endpoint::redacted(&url), "Connecting to event stream");

        let opened = tokio::select! {
            biased;
            () = session.cancelled() => return,
            result = self.connector.open(url) => result,
        };

        let mut connection = match opened {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!(error = %e, "Event stream connection failed");
                self.transition(generation, Transition::Lost);
                return;
            }
        };

        if !self.transition(generation, Transition::Opened) {
            close_quietly(connection.as_mut()).await;
            return;
        }

        tracing::info!("Event stream connected");

        match self
            .read_frames(generation, &session, connection.as_mut())
            .await
        {
            SessionEnd::Cancelled => {
                close_quietly(connection.as_mut()).await;
                tracing::debug!("Event stream closed");
            }
            SessionEnd::Lost => {
                self.transition(generation, Transition::Lost);
            }
        }
    }

    /// Read frames until the connection drops or the session is cancelled.
    async fn read_frames(
        &self,
        generation: u64,
        session: &CancellationToken,
        connection: &mut dyn Connection,
    ) -> SessionEnd {
        loop {
            let next = tokio::select! {
                biased;
                () = session.cancelled() => None,
                frame = connection.next_frame() => Some(frame),
            };
            let Some(frame) = next else {
                return SessionEnd::Cancelled;
            };

            match frame {
                Some(Ok(Frame::Text(text))) => self.dispatch(generation, &text),
                Some(Ok(Frame::Other)) => tracing::trace!("Ignoring non-text frame"),
                Some(Ok(Frame::Close { code, reason })) => {
                    tracing::info!(code, reason = %reason, "Event stream closed by server");
                    return SessionEnd::Lost;
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Event stream transport error");
                    return SessionEnd::Lost;
                }
                None => {
                    tracing::info!("Event stream ended");
                    return SessionEnd::Lost;
                }
            }
        }
    }
}

async fn close_quietly(connection: &mut dyn Connection) {
    if let Err(e) = connection
        .close(NORMAL_CLOSURE, CLOSE_REASON.to_owned())
        .await
    {
        tracing::debug!(error = %e, "Event stream close handshake failed");
    }
}

// ── Tests ────────────────────────────────────────────────────────────
