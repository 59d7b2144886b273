//! Wire-compatible types for the Werewolf backend.
//!
//! Field names match the backend's JSON exactly. Snapshots pushed over the
//! WebSocket feed and returned by `GET /game/state` both decode into
//! [`GameState`]; the REST acknowledgements have their own small structs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WerewolfError;

// ── Type aliases ────────────────────────────────────────────────────

/// Discord snowflake identifying a player.
pub type PlayerId = String;

// ── Enums ───────────────────────────────────────────────────────────

/// Current stage of a game round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Waiting for players; nothing has been dealt yet.
    #[default]
    Lobby,
    /// Role-specific private actions.
    Night,
    /// Public discussion; votes are accepted.
    Day,
    /// Explicit voting stage; behaves like `Day` for the client.
    Voting,
    /// The round is over.
    Ended,
}

impl Phase {
    /// Wire name of the phase, as used in `POST /game/phase/{phase}`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Night => "night",
            Self::Day => "day",
            Self::Voting => "voting",
            Self::Ended => "ended",
        }
    }

    /// Banner text for the phase indicator.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Lobby => "En attente",
            Self::Night => "Nuit",
            Self::Day => "Jour",
            Self::Voting => "Vote",
            Self::Ended => "Partie terminée",
        }
    }

    /// `true` for the phases in which day votes are accepted.
    pub fn is_voting(&self) -> bool {
        matches!(self, Self::Day | Self::Voting)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = WerewolfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lobby" => Ok(Self::Lobby),
            "night" => Ok(Self::Night),
            "day" => Ok(Self::Day),
            "voting" => Ok(Self::Voting),
            "ended" => Ok(Self::Ended),
            other => Err(WerewolfError::UnknownPhase(other.to_owned())),
        }
    }
}

// ── Structs ─────────────────────────────────────────────────────────

/// The authenticated Discord user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: PlayerId,
    pub username: String,
    #[serde(default)]
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Result of the OAuth code exchange: a bearer token plus the identity it
/// belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    pub user: Identity,
}

/// A player in the current round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: String,
    /// Only present on the viewer's own entry; the backend hides the rest.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default = "default_alive")]
    pub is_alive: bool,
    #[serde(default)]
    pub is_muted: bool,
}

fn default_alive() -> bool {
    true
}

/// A complete game-state snapshot. Each push replaces the previous one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GameState {
    pub phase: Phase,
    #[serde(default)]
    pub day_number: u32,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub dead_players: Vec<PlayerId>,
    /// voter id → target id, one entry per voter this round.
    #[serde(default)]
    pub votes: HashMap<PlayerId, PlayerId>,
    /// Players whose night action the backend has recorded this round.
    /// Older backends never send it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acted_players: Vec<PlayerId>,
}

impl GameState {
    /// Look up a player by id.
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Players still in the game, in seating order.
    pub fn living_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive)
    }

    /// `true` when `id` has a vote recorded this round.
    pub fn has_voted(&self, id: &str) -> bool {
        self.votes.contains_key(id)
    }

    /// `true` when the backend reports `id`'s night action as recorded.
    pub fn has_acted(&self, id: &str) -> bool {
        self.acted_players.iter().any(|p| p == id)
    }

    /// Check the snapshot's internal invariants.
    ///
    /// Returns one message per violation; an empty vector means the snapshot
    /// is consistent. Server snapshots are never rejected on this basis.
    pub fn check_consistency(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let mut seen = HashSet::new();
        for player in &self.players {
            if !seen.insert(player.id.as_str()) {
                problems.push(format!("duplicate player id {}", player.id));
            }
        }

        let dead: HashSet<&str> = self.dead_players.iter().map(String::as_str).collect();
        for player in &self.players {
            if player.is_alive == dead.contains(player.id.as_str()) {
                problems.push(format!(
                    "player {} is_alive={} disagrees with dead_players",
                    player.id, player.is_alive
                ));
            }
        }

        for voter in self.votes.keys() {
            if self.player(voter).is_none() {
                problems.push(format!("vote from unknown player {voter}"));
            }
        }

        problems
    }
}

// ── REST payloads ───────────────────────────────────────────────────

/// Response of `GET /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginUrl {
    pub auth_url: String,
}

/// Response of `POST /game/start`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartGameAck {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    /// Number of players dealt into the round.
    #[serde(default)]
    pub players: u32,
}

/// Response of `POST /game/phase/{phase}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseChangeAck {
    pub success: bool,
    pub phase: Phase,
}

/// Body of `POST /game/vote`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteRequest {
    pub voter_id: PlayerId,
    pub target_id: PlayerId,
}

/// Response of `POST /game/vote`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub votes_count: Option<u32>,
}

/// Response of `POST /game/reset`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetAck {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Night action kinds, as sent to `POST /game/night-action`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NightActionKind {
    /// Werewolves choose a victim.
    Eliminate,
    /// The seer inspects a player's role.
    Investigate,
    /// The guard shields a player.
    Protect,
    /// The witch's death potion.
    Poison,
    /// The witch's life potion on the wolves' victim. Takes no target.
    Save,
    /// Cupid binds two lovers.
    Pair,
}

/// Body of `POST /game/night-action`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NightActionRequest {
    pub actor_id: PlayerId,
    pub action: NightActionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_ids: Vec<PlayerId>,
}

/// Generic `{success, message?}` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response of `GET /game/players`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayersResponse {
    pub players: Vec<Player>,
}

/// Response of `GET /game/stats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameStats {
    pub phase: Phase,
    pub day: u32,
    pub alive: u32,
    pub dead: u32,
    #[serde(default)]
    pub roles_alive: BTreeMap<String, u32>,
    #[serde(default)]
    pub votes_count: u32,
}

/// Error body the backend attaches to non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorDetail {
    pub detail: serde_json::Value,
}

impl ErrorDetail {
    /// Flatten `detail` into a display string. Validation errors arrive as
    /// arrays of objects; plain rejections as a string.
    pub(crate) fn into_message(self) -> Option<String> {
        match self.detail {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Null => None,
            serde_json::Value::String(_) => None,
            other => Some(other.to_string()),
        }
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

    #[test]
    fn phase_parses_wire_names() {
        for phase in [
            Phase::Lobby,
            Phase::Night,
            Phase::Day,
            Phase::Voting,
            Phase::Ended,
        ] {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
        let err = "dusk".parse::<Phase>().unwrap_err();
        assert!(matches!(&err, WerewolfError::UnknownPhase(name) if name == "dusk"));
        assert_eq!(err.to_string(), "unknown phase: dusk");
    }

    #[test]
    fn consistent_snapshot_has_no_problems() {
        let state: GameState = serde_json::from_str(
            r#"{"phase":"day","day_number":1,
                "players":[
                  {"id":"a","display_name":"A","is_alive":true},
                  {"id":"b","display_name":"B","is_alive":false}],
                "dead_players":["b"],"votes":{"a":"a"}}"#,
        )
        .unwrap();
        assert!(state.check_consistency().is_empty());
    }

    #[test]
    fn acted_players_decode_and_default_to_empty() {
        let state: GameState = serde_json::from_str(
            r#"{"phase":"night","day_number":2,
                "players":[{"id":"a","display_name":"A"},{"id":"b","display_name":"B"}],
                "acted_players":["b"]}"#,
        )
        .unwrap();
        assert_eq!(state.acted_players, vec!["b".to_string()]);
        assert!(state.has_acted("b"));
        assert!(!state.has_acted("a"));

        let legacy: GameState =
            serde_json::from_str(r#"{"phase":"night","players":[]}"#).unwrap();
        assert!(legacy.acted_players.is_empty());
        let encoded = serde_json::to_value(&legacy).unwrap();
        assert!(encoded.get("acted_players").is_none());
    }

    #[test]
    fn inconsistent_snapshot_is_reported() {
        let state: GameState = serde_json::from_str(
            r#"{"phase":"day",
                "players":[
                  {"id":"a","display_name":"A","is_alive":false},
                  {"id":"a","display_name":"A2"}],
                "votes":{"ghost":"a"}}"#,
        )
        .unwrap();
        let problems = state.check_consistency();
        assert!(problems.iter().any(|p| p.contains("duplicate")));
        assert!(problems.iter().any(|p| p.contains("dead_players")));
        assert!(problems.iter().any(|p| p.contains("ghost")));
    }

    #[test]
    fn error_detail_flattens_validation_arrays() {
        let detail: ErrorDetail =
            serde_json::from_str(r#"{"detail":[{"msg":"field required"}]}"#).unwrap();
        assert!(detail.into_message().unwrap().contains("field required"));

        let detail: ErrorDetail = serde_json::from_str(r#"{"detail":""}"#).unwrap();
        assert!(detail.into_message().is_none());
    }
}
