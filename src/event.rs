//! Events emitted by the [`LiveStateSubscriber`](crate::subscriber::LiveStateSubscriber).

use std::sync::Arc;
use std::time::Duration;

use crate::protocol::GameState;

/// Lifecycle and data events from the live feed.
///
/// `Snapshot` carries the same `Arc` that
/// [`latest_snapshot`](crate::subscriber::LiveStateSubscriber::latest_snapshot)
/// returns, so consumers that only want the newest state can ignore the
/// payload and read the watch channel instead.
#[derive(Debug, Clone)]
pub enum SubscriberEvent {
    /// A connection to the feed is open. Emitted once per (re)connection.
    Connected,
    /// A new snapshot replaced the previous one.
    Snapshot(Arc<GameState>),
    /// The connection was lost and another attempt is scheduled.
    Reconnecting {
        /// 1-based attempt number since the connection was lost.
        attempt: u32,
        /// Wait before the attempt.
        delay: Duration,
    },
    /// The subscriber stopped. Always the last event.
    Disconnected {
        /// Why the feed ended; `None` for a clean close by the backend.
        reason: Option<String>,
    },
}

impl SubscriberEvent {
    /// `true` for [`SubscriberEvent::Disconnected`].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}
