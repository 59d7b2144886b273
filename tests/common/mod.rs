#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Werewolf client integration tests.
//!
//! Provides a channel-based [`MockTransport`], an axum-backed
//! [`MockHttpServer`] and helpers for building snapshots.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use tokio::net::TcpListener;
use werewolf_client::protocol::{GameState, Phase, Player};
use werewolf_client::{Transport, WerewolfError};

// ── MockTransport ───────────────────────────────────────────────────

/// A channel-based mock transport for integration testing.
///
/// Scripted frames are consumed in order by `recv()`. A `None` entry ends
/// the connection. All frames sent by the client are recorded in `sent`.
pub struct MockTransport {
    incoming: VecDeque<Option<Result<String, WerewolfError>>>,
    /// Hang after the script instead of reporting a closed connection.
    hang_when_drained: bool,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a mock transport that hangs once the script is drained, so the
    /// loop stays alive until shutdown.
    pub fn new(
        incoming: Vec<Option<Result<String, WerewolfError>>>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            hang_when_drained: true,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }

    /// Like [`new`](Self::new), but the connection closes after the script.
    pub fn closing(frames: Vec<String>) -> Self {
        let (mut transport, _, _) = Self::new(frames.into_iter().map(|f| Some(Ok(f))).collect());
        transport.hang_when_drained = false;
        transport
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), WerewolfError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, WerewolfError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else if self.hang_when_drained {
            std::future::pending().await
        } else {
            None
        }
    }

    async fn close(&mut self) -> Result<(), WerewolfError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── Snapshot helpers ────────────────────────────────────────────────

/// A living player with the given role.
pub fn player(id: &str, role: Option<&str>) -> Player {
    Player {
        id: id.into(),
        username: id.to_lowercase(),
        display_name: id.to_uppercase(),
        avatar_url: String::new(),
        role: role.map(Into::into),
        is_alive: true,
        is_muted: false,
    }
}

/// Four players: `p1` werewolf, `p2` seer, `p3` witch, `p4` villager.
pub fn game_state(phase: Phase, day_number: u32) -> GameState {
    GameState {
        phase,
        day_number,
        players: vec![
            player("p1", Some("Loup-Garou")),
            player("p2", Some("Voyante")),
            player("p3", Some("Sorcière")),
            player("p4", Some("Villageois")),
        ],
        dead_players: Vec::new(),
        votes: HashMap::new(),
        acted_players: Vec::new(),
    }
}

/// Mark `id` dead in `state`.
pub fn kill(state: &mut GameState, id: &str) {
    for p in state.players.iter_mut().filter(|p| p.id == id) {
        p.is_alive = false;
    }
    state.dead_players.push(id.into());
}

/// JSON frame for `state`, as the backend pushes it.
pub fn snapshot_json(state: &GameState) -> String {
    serde_json::to_string(state).expect("snapshot serialization")
}

/// The backend's answer to a ping.
pub fn pong_json() -> String {
    r#"{"action":"pong"}"#.to_string()
}

// ── MockHttpServer ──────────────────────────────────────────────────

/// A request as received by [`MockHttpServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including the query string.
    pub target: String,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

struct ServerState {
    requests: StdMutex<Vec<RecordedRequest>>,
    responses: StdMutex<VecDeque<(u16, String)>>,
}

/// axum server answering scripted `(status, body)` pairs in request order,
/// whatever the route. Unscripted requests get a 404.
pub struct MockHttpServer {
    pub base_url: String,
    state: Arc<ServerState>,
    task: tokio::task::JoinHandle<()>,
}

impl MockHttpServer {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let state = Arc::new(ServerState {
            requests: StdMutex::new(Vec::new()),
            responses: StdMutex::new(VecDeque::from(responses)),
        });
        let app = Router::new()
            .fallback(record_and_reply)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            task,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for MockHttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn record_and_reply(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_lowercase(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        target,
        headers,
        body,
    });

    let (status, body) = state
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((404, r#"{"detail":"Not Found"}"#.to_string()));
    (
        StatusCode::from_u16(status).unwrap(),
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
}
