//! Phase projection: which surface the viewer gets for a snapshot.
//!
//! [`project`] is a pure function of the latest snapshot and the viewer's id.
//! It never looks at earlier snapshots, so a new push fully determines the
//! next view.

use std::collections::HashMap;

use crate::protocol::{GameState, Phase, Player, PlayerId};
use crate::roles::{Role, RoleDescriptor};

/// Identifies a round of interaction. Panels reset when it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoundKey {
    pub phase: Phase,
    pub day_number: u32,
}

impl RoundKey {
    /// Key of the round a snapshot describes.
    pub fn of(state: &GameState) -> Self {
        Self {
            phase: state.phase,
            day_number: state.day_number,
        }
    }
}

/// One row of a vote tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyEntry {
    pub target_id: PlayerId,
    pub count: usize,
}

/// Votes grouped by target, most-voted first (ties by target id).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoteTally {
    entries: Vec<TallyEntry>,
}

impl VoteTally {
    /// Group a `voter → target` map by target.
    pub fn from_votes(votes: &HashMap<PlayerId, PlayerId>) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for target in votes.values() {
            *counts.entry(target.as_str()).or_default() += 1;
        }

        let mut entries: Vec<TallyEntry> = counts
            .into_iter()
            .map(|(target_id, count)| TallyEntry {
                target_id: target_id.to_owned(),
                count,
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.target_id.cmp(&b.target_id)));

        Self { entries }
    }

    /// Rows, most-voted first.
    pub fn entries(&self) -> &[TallyEntry] {
        &self.entries
    }

    /// Votes received by `target_id`.
    pub fn count_for(&self, target_id: &str) -> usize {
        self.entries
            .iter()
            .find(|e| e.target_id == target_id)
            .map_or(0, |e| e.count)
    }

    /// Total votes; always equals the number of voters.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// The most-voted target, if the lead is not shared.
    pub fn leader(&self) -> Option<&TallyEntry> {
        match self.entries.as_slice() {
            [first, second, ..] if first.count == second.count => None,
            [first, ..] => Some(first),
            [] => None,
        }
    }
}

/// Night surface for a living player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightActionView {
    pub round: RoundKey,
    pub me: Player,
    pub role: Role,
    pub descriptor: &'static RoleDescriptor,
    /// Living players other than the viewer.
    pub candidate_targets: Vec<Player>,
    /// The backend already recorded the viewer's action this night.
    pub has_acted: bool,
}

/// Day vote surface for a living player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayVoteView {
    pub round: RoundKey,
    pub me: Player,
    /// Living players other than the viewer.
    pub candidate_targets: Vec<Player>,
    pub votes: HashMap<PlayerId, PlayerId>,
    pub has_voted: bool,
    /// Target of the viewer's recorded vote.
    pub my_vote: Option<PlayerId>,
    pub tally: VoteTally,
    pub votes_cast: usize,
    pub living_count: usize,
}

/// What to render for the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewModel {
    /// No snapshot yet.
    Loading,
    /// The viewer is not dealt into the running round.
    NotInGame,
    /// Waiting room.
    Lobby { players: Vec<Player> },
    /// The viewer is alive at night.
    NightAction(NightActionView),
    /// The viewer is alive during the day.
    DayVote(DayVoteView),
    /// The viewer is dead; read-only.
    Spectating { round: RoundKey, me: Player },
    /// The round is over.
    Results { players: Vec<Player> },
}

/// Coarse classification of a [`ViewModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Loading,
    NotInGame,
    Lobby,
    NightAction,
    DayVote,
    Spectating,
    Results,
}

impl ViewModel {
    /// Classification without the payload.
    pub fn kind(&self) -> ViewKind {
        match self {
            Self::Loading => ViewKind::Loading,
            Self::NotInGame => ViewKind::NotInGame,
            Self::Lobby { .. } => ViewKind::Lobby,
            Self::NightAction(_) => ViewKind::NightAction,
            Self::DayVote(_) => ViewKind::DayVote,
            Self::Spectating { .. } => ViewKind::Spectating,
            Self::Results { .. } => ViewKind::Results,
        }
    }

    /// Round of the interactive views; `None` for the others.
    pub fn round_key(&self) -> Option<RoundKey> {
        match self {
            Self::NightAction(view) => Some(view.round),
            Self::DayVote(view) => Some(view.round),
            Self::Spectating { round, .. } => Some(*round),
            _ => None,
        }
    }
}

/// Derive the viewer's surface from a snapshot.
pub fn project(snapshot: Option<&GameState>, my_id: &str) -> ViewModel {
    let Some(state) = snapshot else {
        return ViewModel::Loading;
    };

    let round = RoundKey::of(state);

    match (state.phase, state.player(my_id)) {
        (Phase::Lobby, _) => ViewModel::Lobby {
            players: state.players.clone(),
        },
        (_, None) => ViewModel::NotInGame,
        (Phase::Ended, Some(_)) => ViewModel::Results {
            players: state.players.clone(),
        },
        (_, Some(me)) if !me.is_alive => ViewModel::Spectating {
            round,
            me: me.clone(),
        },
        (Phase::Night, Some(me)) => {
            let role = Role::from_wire(me.role.as_deref());
            ViewModel::NightAction(NightActionView {
                round,
                me: me.clone(),
                role,
                descriptor: role.descriptor(),
                candidate_targets: candidate_targets(state, my_id),
                has_acted: state.has_acted(my_id),
            })
        }
        (Phase::Day | Phase::Voting, Some(me)) => ViewModel::DayVote(DayVoteView {
            round,
            me: me.clone(),
            candidate_targets: candidate_targets(state, my_id),
            votes: state.votes.clone(),
            has_voted: state.has_voted(my_id),
            my_vote: state.votes.get(my_id).cloned(),
            tally: VoteTally::from_votes(&state.votes),
            votes_cast: state.votes.len(),
            living_count: state.living_players().count(),
        }),
    }
}

/// Living players other than `my_id`, in seating order.
pub fn candidate_targets(state: &GameState, my_id: &str) -> Vec<Player> {
    state
        .living_players()
        .filter(|p| p.id != my_id)
        .cloned()
        .collect()
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

    fn player(id: &str, alive: bool, role: Option<&str>) -> Player {
        Player {
            id: id.into(),
            username: id.into(),
            display_name: id.to_uppercase(),
            avatar_url: String::new(),
            role: role.map(Into::into),
            is_alive: alive,
            is_muted: false,
        }
    }

    fn state(phase: Phase, players: Vec<Player>) -> GameState {
        let dead_players = players
            .iter()
            .filter(|p| !p.is_alive)
            .map(|p| p.id.clone())
            .collect();
        GameState {
            phase,
            day_number: 1,
            players,
            dead_players,
            votes: HashMap::new(),
            acted_players: Vec::new(),
        }
    }

    #[test]
    fn no_snapshot_is_loading() {
        assert_eq!(project(None, "p1"), ViewModel::Loading);
    }

    #[test]
    fn absent_viewer_outside_lobby_is_not_in_game() {
        for phase in [Phase::Night, Phase::Day, Phase::Voting, Phase::Ended] {
            let mut s = state(phase, vec![player("p2", true, None)]);
            s.votes.insert("p2".into(), "p2".into());
            assert_eq!(project(Some(&s), "p1").kind(), ViewKind::NotInGame, "{phase}");
        }
    }

    #[test]
    fn absent_viewer_in_lobby_sees_lobby() {
        let s = state(Phase::Lobby, vec![player("p2", true, None)]);
        let ViewModel::Lobby { players } = project(Some(&s), "p1") else {
            panic!("expected Lobby");
        };
        assert_eq!(players.len(), 1);
    }

    #[test]
    fn seated_viewer_in_lobby_sees_lobby_dead_or_alive() {
        for alive in [true, false] {
            let s = state(Phase::Lobby, vec![player("p1", alive, Some("Voyante"))]);
            assert_eq!(project(Some(&s), "p1").kind(), ViewKind::Lobby, "alive={alive}");
        }
    }

    #[test]
    fn guard_at_night_protects_living_others() {
        let s = state(
            Phase::Night,
            vec![
                player("p1", true, Some("Garde")),
                player("p2", true, None),
                player("p3", false, None),
                player("p4", true, None),
            ],
        );
        let ViewModel::NightAction(view) = project(Some(&s), "p1") else {
            panic!("expected NightAction");
        };
        assert_eq!(view.role, Role::Guard);
        assert_eq!(
            view.descriptor.night_action,
            Some(crate::protocol::NightActionKind::Protect)
        );
        let ids: Vec<&str> = view.candidate_targets.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p4"]);
    }

    #[test]
    fn night_view_reports_recorded_action() {
        let mut s = state(
            Phase::Night,
            vec![player("p1", true, Some("Voyante")), player("p2", true, None)],
        );
        let ViewModel::NightAction(view) = project(Some(&s), "p1") else {
            panic!("expected NightAction");
        };
        assert!(!view.has_acted);

        s.acted_players.push("p1".into());
        let ViewModel::NightAction(view) = project(Some(&s), "p1") else {
            panic!("expected NightAction");
        };
        assert!(view.has_acted);
    }

    #[test]
    fn unknown_role_falls_back_to_villager() {
        let s = state(Phase::Night, vec![player("p1", true, Some("Ancien"))]);
        let ViewModel::NightAction(view) = project(Some(&s), "p1") else {
            panic!("expected NightAction");
        };
        assert_eq!(view.role, Role::Villager);
        assert!(view.descriptor.night_action.is_none());
    }

    #[test]
    fn dead_viewer_spectates() {
        for phase in [Phase::Night, Phase::Day, Phase::Voting] {
            let s = state(phase, vec![player("p1", false, None), player("p2", true, None)]);
            assert_eq!(project(Some(&s), "p1").kind(), ViewKind::Spectating);
        }
    }

    #[test]
    fn ended_shows_results_even_when_dead() {
        let s = state(Phase::Ended, vec![player("p1", false, None)]);
        assert_eq!(project(Some(&s), "p1").kind(), ViewKind::Results);
    }

    #[test]
    fn day_vote_reports_own_vote_and_tally() {
        let mut s = state(
            Phase::Day,
            vec![player("p1", true, None), player("p2", true, None)],
        );
        s.votes.insert("p1".into(), "p2".into());

        let ViewModel::DayVote(view) = project(Some(&s), "p1") else {
            panic!("expected DayVote");
        };
        assert!(view.has_voted);
        assert_eq!(view.my_vote.as_deref(), Some("p2"));
        assert_eq!(
            view.tally.entries(),
            &[TallyEntry {
                target_id: "p2".into(),
                count: 1
            }]
        );
        assert_eq!(view.votes_cast, 1);
        assert_eq!(view.living_count, 2);
    }

    #[test]
    fn voting_phase_behaves_like_day() {
        let s = state(Phase::Voting, vec![player("p1", true, None)]);
        assert_eq!(project(Some(&s), "p1").kind(), ViewKind::DayVote);
    }

    #[test]
    fn tally_sums_to_vote_count_and_orders_by_count() {
        let votes: HashMap<PlayerId, PlayerId> = [
            ("a", "x"),
            ("b", "y"),
            ("c", "x"),
            ("d", "z"),
            ("e", "y"),
            ("f", "x"),
        ]
        .into_iter()
        .map(|(v, t)| (v.to_string(), t.to_string()))
        .collect();

        let tally = VoteTally::from_votes(&votes);
        assert_eq!(tally.total(), votes.len());
        let order: Vec<(&str, usize)> = tally
            .entries()
            .iter()
            .map(|e| (e.target_id.as_str(), e.count))
            .collect();
        assert_eq!(order, vec![("x", 3), ("y", 2), ("z", 1)]);
        assert_eq!(tally.leader().unwrap().target_id, "x");
        assert_eq!(tally.count_for("nobody"), 0);
    }

    #[test]
    fn tied_tally_has_no_leader() {
        let votes: HashMap<PlayerId, PlayerId> =
            [("a".to_string(), "x".to_string()), ("b".to_string(), "y".to_string())]
                .into_iter()
                .collect();
        assert!(VoteTally::from_votes(&votes).leader().is_none());
        assert!(VoteTally::default().leader().is_none());
    }

    #[test]
    fn projection_depends_only_on_latest_snapshot() {
        let mut first = state(
            Phase::Day,
            vec![player("p1", true, None), player("p2", true, None)],
        );
        first.votes.insert("p1".into(), "p2".into());

        let mut second = state(
            Phase::Night,
            vec![player("p1", true, Some("Voyante")), player("p2", true, None)],
        );
        second.day_number = 2;

        let _ = project(Some(&first), "p1");
        let after = project(Some(&second), "p1");
        assert_eq!(after, project(Some(&second), "p1"));
        let ViewModel::NightAction(view) = after else {
            panic!("expected NightAction");
        };
        assert_eq!(view.round.day_number, 2);
        assert_eq!(view.role, Role::Seer);
    }
}
