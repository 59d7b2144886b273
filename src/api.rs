//! REST client for the Werewolf backend.
//!
//! Each call is a single request/response round trip: no retry, no
//! idempotency key. A 2xx response decodes into the endpoint's
//! acknowledgement; anything else becomes [`WerewolfError::Api`] carrying the
//! backend's `detail` when it sent one. Callers decide how to surface the
//! failure and must not treat an acknowledgement as the new game state; the
//! next snapshot on the feed is the source of truth.
//!
//! The intents the interaction panels need are behind [`ActionSubmitter`] so
//! panels can be driven by a test double.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Result, WerewolfError};
use crate::protocol::{
    Ack, AuthSession, ErrorDetail, GameState, GameStats, LoginUrl, NightActionRequest,
    PhaseChangeAck, Phase, Player, PlayersResponse, ResetAck, StartGameAck, VoteAck, VoteRequest,
};
use crate::session::{Session, SessionStorage};

/// Game intents the client can send to the backend.
#[async_trait]
pub trait ActionSubmitter: Send + Sync {
    /// Record `voter_id`'s day vote against `target_id`.
    async fn cast_vote(&self, voter_id: &str, target_id: &str) -> Result<VoteAck>;

    /// Record a night action.
    async fn submit_night_action(&self, request: &NightActionRequest) -> Result<Ack>;

    /// Deal roles to the players in the voice channel and start night one.
    async fn start_game(&self) -> Result<StartGameAck>;

    /// Move the game to `phase`.
    async fn change_phase(&self, phase: Phase) -> Result<PhaseChangeAck>;

    /// Return the game to an empty lobby.
    async fn reset_game(&self) -> Result<ResetAck>;
}

/// HTTP client for the backend's REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Client for the backend at `base_url` (e.g. `http://localhost:8000`).
    ///
    /// # Errors
    ///
    /// Returns [`WerewolfError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    /// Like [`new`](Self::new) with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`WerewolfError::Http`] if the HTTP client cannot be built.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::from_parts(http, base_url))
    }

    /// Client built from a [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`WerewolfError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::with_timeout(config.api_url.clone(), config.request_timeout)
    }

    /// Reuse an existing `reqwest::Client`.
    pub fn from_parts(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── Auth ────────────────────────────────────────────────────────

    /// Discord authorization URL to send the user to.
    pub async fn login_url(&self) -> Result<String> {
        let response = self.http.get(self.url("/auth/login")).send().await?;
        let login: LoginUrl = read_json(response).await.map_err(into_auth_error)?;
        Ok(login.auth_url)
    }

    /// Exchange the OAuth `code` from the redirect for a session.
    ///
    /// # Errors
    ///
    /// An empty code or any backend rejection becomes [`WerewolfError::Auth`].
    pub async fn exchange_code(&self, code: &str) -> Result<AuthSession> {
        if code.trim().is_empty() {
            return Err(WerewolfError::Auth("missing authorization code".into()));
        }
        debug!("exchanging OAuth code");
        let response = self
            .http
            .post(self.url("/auth/callback"))
            .query(&[("code", code)])
            .send()
            .await?;
        read_json(response).await.map_err(into_auth_error)
    }

    /// Exchange `code` and store the result in `session`.
    pub async fn login<S: SessionStorage>(
        &self,
        code: &str,
        session: &Session<S>,
    ) -> Result<AuthSession> {
        let auth = self.exchange_code(code).await?;
        session.save(&auth)?;
        Ok(auth)
    }

    /// The player record behind the session's bearer token.
    ///
    /// # Errors
    ///
    /// [`WerewolfError::Auth`] when logged out or the token is rejected.
    pub async fn current_user<S: SessionStorage>(&self, session: &Session<S>) -> Result<Player> {
        let token = session.require_token()?;
        let response = self
            .http
            .get(self.url("/auth/me"))
            .bearer_auth(token)
            .send()
            .await?;
        read_json(response).await.map_err(|e| match e {
            WerewolfError::Api { status: 401, message } => WerewolfError::Auth(message),
            other => other,
        })
    }

    // ── Game queries ────────────────────────────────────────────────

    /// Current snapshot, for polling when the feed is down.
    pub async fn game_state(&self) -> Result<GameState> {
        let response = self.http.get(self.url("/game/state")).send().await?;
        read_json(response).await
    }

    /// Players in the current round.
    pub async fn players(&self) -> Result<Vec<Player>> {
        let response = self.http.get(self.url("/game/players")).send().await?;
        let body: PlayersResponse = read_json(response).await?;
        Ok(body.players)
    }

    /// Aggregate counters for the current round.
    pub async fn game_stats(&self) -> Result<GameStats> {
        let response = self.http.get(self.url("/game/stats")).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl ActionSubmitter for ApiClient {
    async fn cast_vote(&self, voter_id: &str, target_id: &str) -> Result<VoteAck> {
        debug!(voter = voter_id, target_id, "casting vote");
        let body = VoteRequest {
            voter_id: voter_id.to_owned(),
            target_id: target_id.to_owned(),
        };
        let response = self
            .http
            .post(self.url("/game/vote"))
            .json(&body)
            .send()
            .await?;
        read_json(response).await
    }

    async fn submit_night_action(&self, request: &NightActionRequest) -> Result<Ack> {
        debug!(actor = %request.actor_id, action = ?request.action, "submitting night action");
        let response = self
            .http
            .post(self.url("/game/night-action"))
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }

    async fn start_game(&self) -> Result<StartGameAck> {
        let response = self.http.post(self.url("/game/start")).send().await?;
        read_json(response).await
    }

    async fn change_phase(&self, phase: Phase) -> Result<PhaseChangeAck> {
        let path = format!("/game/phase/{phase}");
        let response = self.http.post(self.url(&path)).send().await?;
        read_json(response).await
    }

    async fn reset_game(&self) -> Result<ResetAck> {
        let response = self.http.post(self.url("/game/reset")).send().await?;
        read_json(response).await
    }
}

/// Decode a 2xx body, or turn the response into [`WerewolfError::Api`].
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorDetail>(&body)
        .ok()
        .and_then(ErrorDetail::into_message)
        .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
    warn!(status = status.as_u16(), %message, "backend rejected request");

    Err(WerewolfError::Api {
        status: status.as_u16(),
        message,
    })
}

fn into_auth_error(err: WerewolfError) -> WerewolfError {
    match err {
        WerewolfError::Api { message, .. } => WerewolfError::Auth(message),
        other => other,
    }
}

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
    use crate::session::MemoryStorage;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/game/state"), "http://localhost:8000/game/state");
    }

    #[tokio::test]
    async fn empty_code_is_rejected_locally() {
        let client = ApiClient::new("http://127.0.0.1:1").unwrap();
        let err = client.exchange_code("  ").await.unwrap_err();
        assert!(matches!(err, WerewolfError::Auth(_)));
    }

    #[tokio::test]
    async fn current_user_requires_login() {
        let client = ApiClient::new("http://127.0.0.1:1").unwrap();
        let session = Session::new(MemoryStorage::default());
        let err = client.current_user(&session).await.unwrap_err();
        assert!(matches!(err, WerewolfError::Auth(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_http_error() {
        let client = ApiClient::with_timeout("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = client.start_game().await.unwrap_err();
        assert!(matches!(err, WerewolfError::Http(_)));
    }

    #[test]
    fn api_errors_become_auth_errors() {
        let err = into_auth_error(WerewolfError::Api {
            status: 400,
            message: "Erreur Discord OAuth: invalid_grant".into(),
        });
        assert!(matches!(err, WerewolfError::Auth(m) if m.contains("invalid_grant")));
    }
}
