// netbridge-core: Live dashboard state between netbridge-api and consumers (CLI).

pub mod config;
pub mod dashboard;
pub mod error;
pub mod session;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_ACTIVITY_LIMIT, SessionConfig};
pub use dashboard::{Activity, DashboardSnapshot, LiveDashboard, RouterSummary};
pub use error::CoreError;
pub use session::LiveSession;
pub use stream::DashboardStream;

// Stream-level types consumers need alongside a session.
pub use netbridge_api::{
    ConnectionState, Event, EventKind, EventSubscription, MAX_BUFFER_CAPACITY,
};
