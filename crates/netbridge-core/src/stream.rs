// ── Reactive dashboard stream ──
//
// Subscription type for consuming dashboard changes from a `LiveSession`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::watch;
use tokio_stream::Stream;
use tokio_stream::wrappers::WatchStream;

use crate::dashboard::DashboardSnapshot;

/// A subscription to the live dashboard.
///
/// Provides point-in-time snapshot access and change notification via
/// [`changed()`](Self::changed) or by converting to a `Stream`.
pub struct DashboardStream {
    current: Arc<DashboardSnapshot>,
    receiver: watch::Receiver<Arc<DashboardSnapshot>>,
}

impl DashboardStream {
    pub(crate) fn new(mut receiver: watch::Receiver<Arc<DashboardSnapshot>>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// The snapshot seen last by this subscription.
    pub fn current(&self) -> &Arc<DashboardSnapshot> {
        &self.current
    }

    /// The latest snapshot (may have changed since `current`).
    pub fn latest(&self) -> Arc<DashboardSnapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the session has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<DashboardSnapshot>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` that yields the current snapshot first and
    /// then one per change.
    pub fn into_stream(self) -> DashboardWatchStream {
        DashboardWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct DashboardWatchStream {
    inner: WatchStream<Arc<DashboardSnapshot>>,
}

impl Stream for DashboardWatchStream {
    type Item = Arc<DashboardSnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
