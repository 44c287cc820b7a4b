//! Command handlers: bridge CLI args -> live session -> output formatting.

pub mod config_cmd;
pub mod dashboard;
pub mod events;

use netbridge_core::ConnectionState;

use crate::output::Painter;

/// Resolves on Ctrl-C. Never resolves if the handler can't be installed.
pub(crate) async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Report a connection state change on stderr.
pub(crate) fn report_state(state: ConnectionState, painter: Painter, quiet: bool) {
    if quiet {
        return;
    }
    match state {
        ConnectionState::Connecting => eprintln!("{}", painter.dim("… connecting")),
        ConnectionState::Open => eprintln!("{}", painter.good("● connected")),
        ConnectionState::Disconnected => {
            eprintln!("{}", painter.bad("○ disconnected, retrying shortly"));
        }
    }
}
