//! Live state subscriber: mirrors the backend's game state from the feed.
//!
//! [`LiveStateSubscriber`] is a thin handle over a background loop that owns
//! the transport. Every text frame is decoded as a full [`GameState`] and
//! replaces the previous snapshot in a `watch` channel; frames that do not
//! decode are logged and dropped, so the last good snapshot stays current.
//! Lifecycle changes are reported on a bounded [`SubscriberEvent`] channel.
//!
//! Without a [`Connector`] the subscriber stops when the connection ends.
//! [`LiveStateSubscriber::start_with_reconnect`] instead redials according to
//! the configured [`ReconnectPolicy`].
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = WebSocketTransport::connect(&config.ws_url).await?;
//! let (subscriber, mut events) =
//!     LiveStateSubscriber::start(transport, SubscriberConfig::default());
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SubscriberEvent::Snapshot(state) => println!("phase: {}", state.phase),
//!         SubscriberEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::error::{Result, WerewolfError};
use crate::event::SubscriberEvent;
use crate::protocol::GameState;
use crate::transport::{Connector, Transport};

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Backoff schedule for re-establishing a lost feed.
///
/// Attempt `n` (1-based) waits `initial_delay * multiplier^(n-1)`, capped at
/// `max_delay`. After `max_attempts` consecutive failures the subscriber
/// gives up. The counter restarts after every successful connection.
///
/// ```
/// use std::time::Duration;
/// use werewolf_client::subscriber::ReconnectPolicy;
///
/// let policy = ReconnectPolicy::default();
/// assert_eq!(policy.delay_for(1), Some(Duration::from_millis(500)));
/// assert_eq!(policy.delay_for(2), Some(Duration::from_secs(1)));
/// assert_eq!(policy.delay_for(6), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait before the first attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
    /// Growth factor between attempts. Values below 1 are treated as 1.
    pub multiplier: u32,
    /// Consecutive attempts before giving up. `0` disables reconnection.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2,
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Wait before 1-based `attempt`, or `None` once attempts are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = self.multiplier.max(1).saturating_pow(attempt - 1);
        let delay = self
            .initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }
}

/// Configuration for a [`LiveStateSubscriber`].
///
/// ```
/// use std::time::Duration;
/// use werewolf_client::subscriber::{ReconnectPolicy, SubscriberConfig};
///
/// let config = SubscriberConfig::default()
///     .with_event_channel_capacity(16)
///     .with_reconnect_policy(ReconnectPolicy::disabled())
///     .with_shutdown_timeout(Duration::from_millis(200));
/// assert_eq!(config.event_channel_capacity, 16);
/// ```
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer falls behind, `Snapshot` events are dropped with a
    /// warning; the watch channel still holds the newest snapshot. The final
    /// `Disconnected` event is always delivered.
    ///
    /// Defaults to **64**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time the background loop gets to close the transport on
    /// [`LiveStateSubscriber::shutdown`] before it is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Reconnect schedule used by [`LiveStateSubscriber::start_with_reconnect`].
    pub reconnect: ReconnectPolicy,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SubscriberConfig {
    /// Set the capacity of the bounded event channel (clamped to at least 1).
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the graceful shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the reconnect schedule.
    #[must_use]
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

// ── Shared state ────────────────────────────────────────────────────

struct SubscriberState {
    connected: AtomicBool,
}

type SnapshotSlot = Option<Arc<GameState>>;

// ── Subscriber handle ───────────────────────────────────────────────

/// Handle to the live game-state feed.
pub struct LiveStateSubscriber {
    /// Serialized intents queued for the background loop.
    cmd_tx: mpsc::UnboundedSender<String>,
    state: Arc<SubscriberState>,
    snapshot_rx: watch::Receiver<SnapshotSlot>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl LiveStateSubscriber {
    /// Start mirroring the feed over an already-connected transport.
    ///
    /// The subscriber stops for good when this connection ends.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start<T: Transport>(
        transport: T,
        config: SubscriberConfig,
    ) -> (Self, mpsc::Receiver<SubscriberEvent>) {
        Self::spawn(transport, None::<NoReconnect<T>>, config)
    }

    /// Start mirroring the feed, redialing through `connector` when the
    /// connection is lost.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start_with_reconnect<C: Connector>(
        transport: C::Transport,
        connector: C,
        config: SubscriberConfig,
    ) -> (Self, mpsc::Receiver<SubscriberEvent>) {
        Self::spawn(transport, Some(connector), config)
    }

    fn spawn<C: Connector>(
        transport: C::Transport,
        connector: Option<C>,
        config: SubscriberConfig,
    ) -> (Self, mpsc::Receiver<SubscriberEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<String>();
        // tokio panics on a zero-capacity channel.
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<SubscriberEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (snapshot_tx, snapshot_rx) = watch::channel::<SnapshotSlot>(None);

        let state = Arc::new(SubscriberState {
            connected: AtomicBool::new(true),
        });

        let task = tokio::spawn(subscription_loop(
            transport,
            connector,
            config.reconnect,
            LoopChannels {
                cmd_rx,
                event_tx,
                snapshot_tx,
                shutdown_rx,
            },
            Arc::clone(&state),
        ));

        let subscriber = Self {
            cmd_tx,
            state,
            snapshot_rx,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (subscriber, event_rx)
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// The most recent snapshot, or `None` before the first one arrives.
    pub fn latest_snapshot(&self) -> Option<Arc<GameState>> {
        self.snapshot_rx.borrow().clone()
    }

    /// A watch receiver that observes every snapshot replacement.
    pub fn watch_snapshots(&self) -> watch::Receiver<Option<Arc<GameState>>> {
        self.snapshot_rx.clone()
    }

    /// `true` while a connection to the feed is open.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    // ── Outgoing ────────────────────────────────────────────────────

    /// Send an arbitrary JSON intent over the feed.
    ///
    /// No view uses this today; it exists for backend features that read
    /// client frames.
    ///
    /// # Errors
    ///
    /// Returns [`WerewolfError::NotConnected`] while disconnected or after
    /// shutdown.
    pub fn send(&self, intent: serde_json::Value) -> Result<()> {
        if !self.is_connected() {
            return Err(WerewolfError::NotConnected);
        }
        let json = serde_json::to_string(&intent)?;
        self.cmd_tx
            .send(json)
            .map_err(|_| WerewolfError::NotConnected)
    }

    /// Send the backend's keep-alive intent. It answers with a control frame
    /// that the subscriber skips.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub fn ping(&self) -> Result<()> {
        self.send(serde_json::json!({ "action": "ping" }))
    }

    /// Stop the background loop, closing the transport.
    pub async fn shutdown(&mut self) {
        debug!("LiveStateSubscriber: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("subscription loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("subscription loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("subscription loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for LiveStateSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStateSubscriber")
            .field("connected", &self.is_connected())
            .field("has_snapshot", &self.snapshot_rx.borrow().is_some())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for LiveStateSubscriber {
    fn drop(&mut self) {
        // No executor to drive a graceful close from here.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Background loop ─────────────────────────────────────────────────

/// Stand-in connector for subscribers started without reconnection.
struct NoReconnect<T>(PhantomData<fn() -> T>);

#[async_trait]
impl<T: Transport> Connector for NoReconnect<T> {
    type Transport = T;

    async fn connect(&self) -> Result<T> {
        Err(WerewolfError::NotConnected)
    }
}

struct LoopChannels {
    cmd_rx: mpsc::UnboundedReceiver<String>,
    event_tx: mpsc::Sender<SubscriberEvent>,
    snapshot_tx: watch::Sender<SnapshotSlot>,
    shutdown_rx: oneshot::Receiver<()>,
}

/// How one connection ended.
enum SessionEnd {
    /// Shutdown requested or the handle was dropped.
    Shutdown,
    /// The connection failed or the backend closed it.
    Lost(Option<String>),
}

enum ReconnectOutcome<T> {
    Connected(T),
    Shutdown,
    GaveUp,
}

/// Frames the backend sends that are not snapshots, e.g. `{"action":"pong"}`.
#[derive(Deserialize)]
struct ControlFrame {
    action: String,
}

async fn subscription_loop<C: Connector>(
    transport: C::Transport,
    connector: Option<C>,
    policy: ReconnectPolicy,
    mut channels: LoopChannels,
    state: Arc<SubscriberState>,
) {
    debug!("subscription loop started");
    let mut transport = transport;

    loop {
        state.connected.store(true, Ordering::Release);
        emit_event(&channels.event_tx, SubscriberEvent::Connected).await;

        match drive_connection(&mut transport, &mut channels).await {
            SessionEnd::Shutdown => {
                let _ = transport.close().await;
                emit_disconnected(&channels.event_tx, &state, Some("client shut down".into()))
                    .await;
                break;
            }
            SessionEnd::Lost(reason) => {
                state.connected.store(false, Ordering::Release);
                let _ = transport.close().await;

                let Some(connector) = connector.as_ref() else {
                    emit_disconnected(&channels.event_tx, &state, reason).await;
                    break;
                };

                match reconnect(connector, &policy, &mut channels).await {
                    ReconnectOutcome::Connected(fresh) => {
                        info!("game feed reconnected");
                        transport = fresh;
                    }
                    ReconnectOutcome::Shutdown => {
                        emit_disconnected(
                            &channels.event_tx,
                            &state,
                            Some("client shut down".into()),
                        )
                        .await;
                        break;
                    }
                    ReconnectOutcome::GaveUp => {
                        let reason = match reason {
                            Some(r) => format!("{r}; reconnect attempts exhausted"),
                            None => "reconnect attempts exhausted".to_string(),
                        };
                        emit_disconnected(&channels.event_tx, &state, Some(reason)).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("subscription loop exited");
}

/// Multiplex outgoing intents, shutdown and incoming frames on one connection.
async fn drive_connection(
    transport: &mut impl Transport,
    channels: &mut LoopChannels,
) -> SessionEnd {
    loop {
        tokio::select! {
            cmd = channels.cmd_rx.recv() => {
                match cmd {
                    Some(json) => {
                        if let Err(e) = transport.send(json).await {
                            error!("transport send error: {e}");
                            return SessionEnd::Lost(Some(format!("transport send error: {e}")));
                        }
                    }
                    None => {
                        debug!("command channel closed, stopping subscription");
                        return SessionEnd::Shutdown;
                    }
                }
            }

            _ = &mut channels.shutdown_rx => {
                debug!("shutdown signal received");
                return SessionEnd::Shutdown;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => handle_frame(&text, channels).await,
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        return SessionEnd::Lost(Some(format!("transport receive error: {e}")));
                    }
                    None => {
                        debug!("game feed closed by server");
                        return SessionEnd::Lost(None);
                    }
                }
            }
        }
    }
}

/// Replace the snapshot with a decoded frame, or drop the frame.
async fn handle_frame(text: &str, channels: &LoopChannels) {
    match serde_json::from_str::<GameState>(text) {
        Ok(snapshot) => {
            let problems = snapshot.check_consistency();
            if !problems.is_empty() {
                warn!(?problems, "snapshot violates game-state invariants");
            }
            debug!(
                phase = %snapshot.phase,
                day = snapshot.day_number,
                players = snapshot.players.len(),
                "snapshot received"
            );
            let snapshot = Arc::new(snapshot);
            channels.snapshot_tx.send_replace(Some(Arc::clone(&snapshot)));
            emit_event(&channels.event_tx, SubscriberEvent::Snapshot(snapshot)).await;
        }
        Err(e) => match serde_json::from_str::<ControlFrame>(text) {
            Ok(control) => debug!(action = %control.action, "control frame skipped"),
            Err(_) => warn!("discarding malformed snapshot frame: {e}"),
        },
    }
}

/// Redial until a connection opens, shutdown is requested or the policy
/// runs out of attempts.
async fn reconnect<C: Connector>(
    connector: &C,
    policy: &ReconnectPolicy,
    channels: &mut LoopChannels,
) -> ReconnectOutcome<C::Transport> {
    let mut attempt: u32 = 0;
    loop {
        let Some((next, delay)) = next_attempt(policy, attempt) else {
            warn!(attempts = attempt, "giving up on game feed");
            return ReconnectOutcome::GaveUp;
        };
        attempt = next;

        emit_event(
            &channels.event_tx,
            SubscriberEvent::Reconnecting { attempt, delay },
        )
        .await;

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = &mut channels.shutdown_rx => return ReconnectOutcome::Shutdown,
        }

        let connected = tokio::select! {
            result = connector.connect() => result,
            _ = &mut channels.shutdown_rx => return ReconnectOutcome::Shutdown,
        };
        match connected {
            Ok(transport) => return ReconnectOutcome::Connected(transport),
            Err(e) => warn!(attempt, "reconnect attempt failed: {e}"),
        }
    }
}

/// Number and wait of the attempt after `previous`, or `None` when the
/// policy is exhausted.
fn next_attempt(policy: &ReconnectPolicy, previous: u32) -> Option<(u32, Duration)> {
    let next = previous.checked_add(1)?;
    policy.delay_for(next).map(|delay| (next, delay))
}

/// Emit an event without blocking the loop; drops it if the channel is full.
async fn emit_event(event_tx: &mpsc::Sender<SubscriberEvent>, event: SubscriberEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit the final `Disconnected` event. Awaits channel space: this event is
/// never dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<SubscriberEvent>,
    state: &SubscriberState,
    reason: Option<String>,
) {
    state.connected.store(false, Ordering::Release);
    if event_tx
        .send(SubscriberEvent::Disconnected { reason })
        .await
        .is_err()
    {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::Phase;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    type Script = Vec<Option<std::result::Result<String, WerewolfError>>>;

    /// Replays scripted frames and records sent messages.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, WerewolfError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(incoming: Script) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (transport, sent, closed)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), WerewolfError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, WerewolfError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), WerewolfError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    /// Hands out scripted transports; fails once the script runs dry.
    struct ScriptedConnector {
        transports: StdMutex<VecDeque<MockTransport>>,
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        type Transport = MockTransport;

        async fn connect(&self) -> Result<MockTransport> {
            self.transports
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| WerewolfError::TransportReceive("refused".into()))
        }
    }

    fn snapshot_json(phase: &str, day: u32) -> String {
        format!(r#"{{"phase":"{phase}","day_number":{day},"players":[],"dead_players":[],"votes":{{}}}}"#)
    }

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            multiplier: 2,
            max_attempts,
        }
    }

    #[tokio::test]
    async fn first_event_is_connected_then_snapshot() {
        let (transport, _sent, _closed) =
            MockTransport::new(vec![Some(Ok(snapshot_json("lobby", 0)))]);
        let (mut sub, mut events) = LiveStateSubscriber::start(transport, SubscriberConfig::default());

        assert!(matches!(events.recv().await.unwrap(), SubscriberEvent::Connected));
        let SubscriberEvent::Snapshot(state) = events.recv().await.unwrap() else {
            panic!("expected Snapshot");
        };
        assert_eq!(state.phase, Phase::Lobby);
        assert_eq!(sub.latest_snapshot().unwrap().phase, Phase::Lobby);
        assert!(sub.is_connected());

        sub.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_frame_keeps_previous_snapshot() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(snapshot_json("night", 1))),
            Some(Ok("this is not json".into())),
            Some(Ok(r#"{"action":"pong"}"#.into())),
        ]);
        let (mut sub, mut events) = LiveStateSubscriber::start(transport, SubscriberConfig::default());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Snapshot
        tokio::time::sleep(Duration::from_millis(50)).await;

        let latest = sub.latest_snapshot().unwrap();
        assert_eq!(latest.phase, Phase::Night);
        assert_eq!(latest.day_number, 1);
        assert!(sub.is_connected());
        assert!(events.try_recv().is_err());

        sub.shutdown().await;
    }

    #[tokio::test]
    async fn clean_close_without_connector_disconnects() {
        let (transport, _sent, closed) = MockTransport::new(vec![None]);
        let (mut sub, mut events) = LiveStateSubscriber::start(transport, SubscriberConfig::default());

        let _ = events.recv().await; // Connected
        let SubscriberEvent::Disconnected { reason } = events.recv().await.unwrap() else {
            panic!("expected Disconnected");
        };
        assert!(reason.is_none());
        assert!(!sub.is_connected());
        assert!(closed.load(Ordering::Relaxed));
        assert!(matches!(sub.ping(), Err(WerewolfError::NotConnected)));

        sub.shutdown().await;
    }

    #[tokio::test]
    async fn send_forwards_intent_to_transport() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut sub, mut events) = LiveStateSubscriber::start(transport, SubscriberConfig::default());
        let _ = events.recv().await; // Connected

        sub.ping().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let last: serde_json::Value = serde_json::from_str(messages.last().unwrap()).unwrap();
            assert_eq!(last["action"], "ping");
        }

        sub.shutdown().await;
        assert!(matches!(sub.ping(), Err(WerewolfError::NotConnected)));
    }

    #[tokio::test]
    async fn reconnects_after_lost_connection() {
        let (first, _s1, _c1) = MockTransport::new(vec![
            Some(Ok(snapshot_json("day", 1))),
            Some(Err(WerewolfError::TransportReceive("reset".into()))),
        ]);
        let (second, _s2, _c2) = MockTransport::new(vec![Some(Ok(snapshot_json("night", 2)))]);
        let connector = ScriptedConnector {
            transports: StdMutex::new(VecDeque::from(vec![second])),
        };
        let config = SubscriberConfig::default().with_reconnect_policy(fast_policy(3));
        let (mut sub, mut events) = LiveStateSubscriber::start_with_reconnect(first, connector, config);

        assert!(matches!(events.recv().await.unwrap(), SubscriberEvent::Connected));
        assert!(matches!(events.recv().await.unwrap(), SubscriberEvent::Snapshot(_)));
        let SubscriberEvent::Reconnecting { attempt, delay } = events.recv().await.unwrap() else {
            panic!("expected Reconnecting");
        };
        assert_eq!(attempt, 1);
        assert_eq!(delay, Duration::from_millis(5));
        assert!(matches!(events.recv().await.unwrap(), SubscriberEvent::Connected));
        let SubscriberEvent::Snapshot(state) = events.recv().await.unwrap() else {
            panic!("expected Snapshot");
        };
        assert_eq!(state.phase, Phase::Night);
        assert_eq!(sub.latest_snapshot().unwrap().day_number, 2);

        sub.shutdown().await;
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (first, _sent, _closed) = MockTransport::new(vec![None]);
        let connector = ScriptedConnector {
            transports: StdMutex::new(VecDeque::new()),
        };
        let config = SubscriberConfig::default().with_reconnect_policy(fast_policy(2));
        let (mut sub, mut events) = LiveStateSubscriber::start_with_reconnect(first, connector, config);

        let mut attempts = Vec::new();
        let reason = loop {
            match events.recv().await.unwrap() {
                SubscriberEvent::Reconnecting { attempt, .. } => attempts.push(attempt),
                SubscriberEvent::Disconnected { reason } => break reason,
                _ => {}
            }
        };
        assert_eq!(attempts, vec![1, 2]);
        assert!(reason.unwrap().contains("exhausted"));
        assert!(!sub.is_connected());

        sub.shutdown().await;
    }

    /// Never finishes dialing.
    struct HangingConnector;

    #[async_trait]
    impl Connector for HangingConnector {
        type Transport = MockTransport;

        async fn connect(&self) -> Result<MockTransport> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_during_connect_attempt_still_disconnects() {
        let (first, _sent, _closed) = MockTransport::new(vec![None]);
        // The loop must give up on the dial well inside this timeout.
        let config = SubscriberConfig::default()
            .with_reconnect_policy(fast_policy(3))
            .with_shutdown_timeout(Duration::from_secs(5));
        let (mut sub, mut events) =
            LiveStateSubscriber::start_with_reconnect(first, HangingConnector, config);

        loop {
            if let SubscriberEvent::Reconnecting { .. } = events.recv().await.unwrap() {
                break;
            }
        }
        // Past the backoff sleep, inside connect().
        tokio::time::sleep(Duration::from_millis(30)).await;

        tokio::time::timeout(Duration::from_secs(1), sub.shutdown())
            .await
            .expect("shutdown waited on a hanging connect");

        let mut last = None;
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(200), events.recv()).await
        {
            last = Some(event);
        }
        let Some(SubscriberEvent::Disconnected { reason }) = last else {
            panic!("expected a final Disconnected, got {last:?}");
        };
        assert_eq!(reason.as_deref(), Some("client shut down"));
    }

    #[test]
    fn attempt_counter_stops_at_u32_max() {
        let policy = ReconnectPolicy {
            max_attempts: u32::MAX,
            ..fast_policy(0)
        };
        assert_eq!(next_attempt(&policy, 0), Some((1, Duration::from_millis(5))));
        assert_eq!(
            next_attempt(&policy, u32::MAX - 1),
            Some((u32::MAX, Duration::from_millis(20)))
        );
        assert_eq!(next_attempt(&policy, u32::MAX), None);
        assert_eq!(next_attempt(&fast_policy(2), 2), None);
    }

    #[tokio::test]
    async fn shutdown_emits_final_disconnected() {
        let (transport, _sent, closed) = MockTransport::new(vec![]);
        let (mut sub, mut events) = LiveStateSubscriber::start(transport, SubscriberConfig::default());
        let _ = events.recv().await; // Connected

        sub.shutdown().await;

        let SubscriberEvent::Disconnected { reason } = events.recv().await.unwrap() else {
            panic!("expected Disconnected");
        };
        assert_eq!(reason.as_deref(), Some("client shut down"));
        assert!(closed.load(Ordering::Relaxed));
        assert!(events.recv().await.is_none());
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            multiplier: 2,
            max_attempts: 4,
        };
        assert_eq!(policy.delay_for(0), None);
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(350)));
        assert_eq!(policy.delay_for(4), Some(Duration::from_millis(350)));
        assert_eq!(policy.delay_for(5), None);
        assert_eq!(ReconnectPolicy::disabled().delay_for(1), None);
    }

    #[test]
    fn config_defaults() {
        let config = SubscriberConfig::default();
        assert_eq!(config.event_channel_capacity, 64);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.reconnect, ReconnectPolicy::default());
        assert_eq!(
            SubscriberConfig::default()
                .with_event_channel_capacity(0)
                .event_channel_capacity,
            1
        );
    }
}
