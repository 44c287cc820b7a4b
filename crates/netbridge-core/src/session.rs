// ── Live session ──
//
// Owns one `EventStreamClient` and a bridge task that folds its events
// into a `LiveDashboard`, publishing every change as an immutable snapshot
// through a `watch` channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use netbridge_api::{
    ConnectionState, Connector, Event, EventStreamClient, EventSubscription, SessionCredentials,
    TungsteniteConnector,
};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::SessionConfig;
use crate::dashboard::{DashboardSnapshot, LiveDashboard, RouterSummary};
use crate::error::CoreError;
use crate::stream::DashboardStream;

/// A live connection to the backend plus the dashboard it keeps current.
///
/// Dropping the session stops it.
pub struct LiveSession {
    config: SessionConfig,
    client: EventStreamClient,
    credentials: SessionCredentials,
    dashboard: Arc<DashboardState>,
    bridge: Mutex<Option<CancellationToken>>,
    runtime: Handle,
}

/// Reducer plus the channel its snapshots are published on.
struct DashboardState {
    reducer: Mutex<LiveDashboard>,
    snapshot_tx: watch::Sender<Arc<DashboardSnapshot>>,
}

impl DashboardState {
    fn lock(&self) -> MutexGuard<'_, LiveDashboard> {
        self.reducer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, dashboard: &LiveDashboard) {
        self.snapshot_tx
            .send_replace(Arc::new(dashboard.snapshot().clone()));
    }

    /// Apply `event` unless the bridge feeding it has been cancelled.
    fn apply(&self, event: &Event, bridge: &CancellationToken) {
        let mut dashboard = self.lock();
        if bridge.is_cancelled() {
            return;
        }
        dashboard.apply(event);
        self.publish(&dashboard);
    }

    fn set_offline(&self) {
        let mut dashboard = self.lock();
        if dashboard.set_offline() {
            self.publish(&dashboard);
        }
    }
}

impl LiveSession {
    /// Create a session that connects over `tokio-tungstenite`.
    ///
    /// Does NOT connect -- call [`start()`](Self::start). Must be called
    /// from within a Tokio runtime.
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        Self::with_connector(config, Arc::new(TungsteniteConnector))
    }

    /// Create a session over a custom transport.
    pub fn with_connector(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, CoreError> {
        let stream_config = config.stream_config()?;

        let credentials = SessionCredentials::new();
        if let Some(token) = &config.token {
            credentials.set_session(token.clone(), config.user_id.clone());
        }

        let client =
            EventStreamClient::new(stream_config, Arc::new(credentials.clone()), connector);

        let reducer = LiveDashboard::new(config.activity_limit);
        let (snapshot_tx, _) = watch::channel(Arc::new(reducer.snapshot().clone()));

        Ok(Self {
            config,
            client,
            credentials,
            dashboard: Arc::new(DashboardState {
                reducer: Mutex::new(reducer),
                snapshot_tx,
            }),
            bridge: Mutex::new(None),
            runtime: Handle::current(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Credential store read by the stream on every connection attempt.
    /// Publish a token here after logging in, then call `start()`.
    pub fn credentials(&self) -> &SessionCredentials {
        &self.credentials
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start feeding the dashboard and connect the stream.
    ///
    /// Idempotent. Without a session token the connection attempt is
    /// abandoned silently; the dashboard simply stays offline.
    pub fn start(&self) {
        let mut bridge = self.bridge.lock().unwrap_or_else(PoisonError::into_inner);
        if bridge.is_none() {
            let cancel = CancellationToken::new();
            let events = self.client.events();
            let states = self.client.watch_state();
            let dashboard = Arc::clone(&self.dashboard);

            self.runtime
                .spawn(bridge_task(events, states, dashboard, cancel.clone()));
            *bridge = Some(cancel);
            debug!("dashboard bridge started");
        }
        drop(bridge);

        self.client.connect();
    }

    /// Disconnect and stop feeding the dashboard. The last snapshot stays
    /// available, marked offline.
    pub fn stop(&self) {
        if let Some(cancel) = self
            .bridge
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            cancel.cancel();
            debug!("dashboard bridge stopped");
        }
        self.client.disconnect();
        self.dashboard.set_offline();
    }

    // ── Dashboard access ─────────────────────────────────────────────

    /// Current dashboard snapshot.
    pub fn snapshot(&self) -> Arc<DashboardSnapshot> {
        self.dashboard.snapshot_tx.borrow().clone()
    }

    /// Subscribe to dashboard changes.
    pub fn watch(&self) -> DashboardStream {
        DashboardStream::new(self.dashboard.snapshot_tx.subscribe())
    }

    /// Replace the dashboard's router list, e.g. from an initial fetch.
    pub fn seed_routers(&self, routers: impl IntoIterator<Item = RouterSummary>) {
        let mut dashboard = self.dashboard.lock();
        dashboard.seed_routers(routers);
        self.dashboard.publish(&dashboard);
    }

    // ── Stream access ────────────────────────────────────────────────

    /// Subscribe to raw events, independent of the dashboard.
    pub fn events(&self) -> EventSubscription {
        self.client.events()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.client.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.client.watch_state()
    }

    /// `true` while the stream is open and delivering events.
    pub fn is_live(&self) -> bool {
        self.client.is_live()
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Bridge task ──────────────────────────────────────────────────────

enum Step {
    Stop,
    State,
    Event(Arc<Event>),
}

async fn bridge_task(
    mut events: EventSubscription,
    mut states: watch::Receiver<ConnectionState>,
    dashboard: Arc<DashboardState>,
    cancel: CancellationToken,
) {
    loop {
        let step = tokio::select! {
            biased;
            () = cancel.cancelled() => Step::Stop,
            changed = states.changed() => match changed {
                Ok(()) => Step::State,
                Err(_) => Step::Stop,
            },
            event = events.recv() => event.map_or(Step::Stop, Step::Event),
        };

        match step {
            Step::Stop => break,
            Step::State => {
                let state = *states.borrow_and_update();
                if state != ConnectionState::Open {
                    dashboard.set_offline();
                }
            }
            Step::Event(event) => dashboard.apply(&event, &cancel),
        }
    }

    if events.dropped() > 0 {
        debug!(dropped = events.dropped(), "dashboard bridge fell behind the stream");
    }
}
