// netbridge-api: Async client for the NetworkBridge live event stream

pub mod bus;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod transport;
pub mod websocket;

pub use bus::{DEFAULT_BUFFER_CAPACITY, EventBus, EventSubscription, MAX_BUFFER_CAPACITY};
pub use credentials::{CredentialStore, Session, SessionCredentials};
pub use error::Error;
pub use event::{
    ChartPoint, DashboardStats, Event, EventKind, IncomeRecorded, RouterStatus, VoucherActivated,
    VoucherShare, parse_event,
};
pub use transport::{Connection, Connector, Frame, TungsteniteConnector};
pub use websocket::{ConnectionState, DEFAULT_RECONNECT_DELAY, EventStreamClient, StreamConfig};
