//! Local interaction state for the night-action and day-vote panels.
//!
//! A panel walks `Idle → Selected → Submitting → Confirmed`. Selection is
//! free until the player submits; `Submitting` and `Confirmed` ignore further
//! clicks so a burst of confirms produces one request. A rejected submission
//! returns to `Selected` with the backend's message, keeping the selection
//! for a retry.
//!
//! Submissions are split into [`InteractionPanel::begin_confirm`], which
//! hands out a [`PendingSubmission`] ticket, and
//! [`InteractionPanel::complete`], which applies the outcome. Every panel
//! instance has a unique generation; a ticket whose panel has since been
//! reset or replaced completes as [`Completion::Stale`] and changes nothing.
//! [`InteractionPanel::confirm`] chains both halves for callers that can hold
//! `&mut` across the request.
//!
//! [`PanelHost`] owns the panel for the current view and replaces it whenever
//! the phase or day number changes: votes and actions never carry over
//! between rounds.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::api::ActionSubmitter;
use crate::error::Result;
use crate::projector::{DayVoteView, NightActionView, RoundKey, ViewModel};
use crate::protocol::{NightActionKind, NightActionRequest, PlayerId};
use crate::roles::Role;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Which panel this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    DayVote,
    NightAction(Role),
}

/// What a submission does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    Vote,
    Night(NightActionKind),
}

/// A submission in flight or confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub action: PanelAction,
    /// Selection when the submission started; restored on failure.
    pub selection: Vec<PlayerId>,
}

/// Panel state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PanelState {
    #[default]
    Idle,
    /// Targets chosen, not yet submitted. Never empty.
    Selected(Vec<PlayerId>),
    Submitting(Submission),
    Confirmed(Submission),
}

impl PanelState {
    /// Currently highlighted targets.
    pub fn selection(&self) -> &[PlayerId] {
        match self {
            Self::Idle => &[],
            Self::Selected(targets) => targets,
            Self::Submitting(sub) | Self::Confirmed(sub) => &sub.selection,
        }
    }
}

/// Request to send to the backend for a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionRequest {
    Vote { voter_id: PlayerId, target_id: PlayerId },
    Night(NightActionRequest),
}

impl SubmissionRequest {
    /// Send this request through `submitter`, discarding the acknowledgement
    /// payload.
    pub async fn execute<A: ActionSubmitter + ?Sized>(&self, submitter: &A) -> Result<()> {
        match self {
            Self::Vote {
                voter_id,
                target_id,
            } => {
                submitter.cast_vote(voter_id, target_id).await?;
            }
            Self::Night(request) => {
                submitter.submit_night_action(request).await?;
            }
        }
        Ok(())
    }
}

/// Ticket for a submission started by [`InteractionPanel::begin_confirm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    generation: u64,
    pub request: SubmissionRequest,
}

/// Outcome of [`InteractionPanel::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The backend accepted; the panel is `Confirmed`.
    Confirmed,
    /// The backend refused; the panel is back to `Selected` (or `Idle`).
    Rejected,
    /// The ticket's panel is gone; nothing changed.
    Stale,
}

/// Interaction state of one panel instance.
#[derive(Debug, Clone)]
pub struct InteractionPanel {
    generation: u64,
    kind: PanelKind,
    round: RoundKey,
    actor_id: PlayerId,
    candidates: Vec<PlayerId>,
    already_acted: bool,
    state: PanelState,
    last_error: Option<String>,
}

impl InteractionPanel {
    /// Panel for a day vote view.
    pub fn for_day_vote(view: &DayVoteView) -> Self {
        Self::new(
            PanelKind::DayVote,
            view.round,
            view.me.id.clone(),
            view.candidate_targets.iter().map(|p| p.id.clone()).collect(),
            view.has_voted,
        )
    }

    /// Panel for a night action view.
    pub fn for_night_action(view: &NightActionView) -> Self {
        Self::new(
            PanelKind::NightAction(view.role),
            view.round,
            view.me.id.clone(),
            view.candidate_targets.iter().map(|p| p.id.clone()).collect(),
            view.has_acted,
        )
    }

    /// Panel for whichever interactive view `view` is.
    pub fn from_view(view: &ViewModel) -> Option<Self> {
        match view {
            ViewModel::DayVote(v) => Some(Self::for_day_vote(v)),
            ViewModel::NightAction(v) => Some(Self::for_night_action(v)),
            _ => None,
        }
    }

    fn new(
        kind: PanelKind,
        round: RoundKey,
        actor_id: PlayerId,
        candidates: Vec<PlayerId>,
        already_acted: bool,
    ) -> Self {
        Self {
            generation: next_generation(),
            kind,
            round,
            actor_id,
            candidates,
            already_acted,
            state: PanelState::Idle,
            last_error: None,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn kind(&self) -> PanelKind {
        self.kind
    }

    pub fn round(&self) -> RoundKey {
        self.round
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    /// Message of the last rejected submission, until the next attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The backend reports the player's vote/action as recorded.
    pub fn already_acted(&self) -> bool {
        self.already_acted
    }

    /// Targets the confirm button needs.
    pub fn required_targets(&self) -> usize {
        match self.kind {
            PanelKind::DayVote => 1,
            PanelKind::NightAction(role) => role.descriptor().target_count,
        }
    }

    /// `true` when confirm would start a submission.
    pub fn can_confirm(&self) -> bool {
        !self.already_acted
            && matches!(&self.state, PanelState::Selected(t) if t.len() == self.required_targets())
            && self.primary_action().is_some()
    }

    fn primary_action(&self) -> Option<PanelAction> {
        match self.kind {
            PanelKind::DayVote => Some(PanelAction::Vote),
            PanelKind::NightAction(role) => role.descriptor().night_action.map(PanelAction::Night),
        }
    }

    fn accepts_input(&self) -> bool {
        !self.already_acted && matches!(self.state, PanelState::Idle | PanelState::Selected(_))
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// Choose `target_id`. Returns `false` when the click is ignored.
    ///
    /// Single-target panels replace the selection. Multi-target panels
    /// toggle `target_id` and keep the most recent picks.
    pub fn select(&mut self, target_id: &str) -> bool {
        let required = self.required_targets();
        if required == 0 || !self.accepts_input() {
            return false;
        }
        if !self.candidates.iter().any(|c| c == target_id) {
            debug!(player = target_id, "ignoring selection of non-candidate");
            return false;
        }

        let mut selection = self.state.selection().to_vec();
        if required == 1 {
            selection = vec![target_id.to_owned()];
        } else if let Some(pos) = selection.iter().position(|t| t == target_id) {
            selection.remove(pos);
        } else {
            selection.push(target_id.to_owned());
            if selection.len() > required {
                selection.remove(0);
            }
        }

        self.state = if selection.is_empty() {
            PanelState::Idle
        } else {
            PanelState::Selected(selection)
        };
        true
    }

    /// Drop the selection.
    pub fn clear_selection(&mut self) {
        if matches!(self.state, PanelState::Selected(_)) {
            self.state = PanelState::Idle;
        }
    }

    /// Start submitting the selection. `None` when there is nothing to
    /// submit, a submission is in flight or the panel is confirmed.
    pub fn begin_confirm(&mut self) -> Option<PendingSubmission> {
        if !self.can_confirm() {
            return None;
        }
        let action = self.primary_action()?;
        let selection = self.state.selection().to_vec();
        self.start(action, selection)
    }

    /// Start the role's target-less special action (the witch's life
    /// potion). Allowed from `Idle` and `Selected`.
    pub fn begin_special(&mut self) -> Option<PendingSubmission> {
        let PanelKind::NightAction(role) = self.kind else {
            return None;
        };
        let special = role.descriptor().special_action?;
        if !self.accepts_input() {
            return None;
        }
        let selection = self.state.selection().to_vec();
        self.start(PanelAction::Night(special.kind), selection)
    }

    fn start(&mut self, action: PanelAction, selection: Vec<PlayerId>) -> Option<PendingSubmission> {
        let request = match action {
            PanelAction::Vote => SubmissionRequest::Vote {
                voter_id: self.actor_id.clone(),
                target_id: selection.first()?.clone(),
            },
            PanelAction::Night(kind) => SubmissionRequest::Night(NightActionRequest {
                actor_id: self.actor_id.clone(),
                action: kind,
                target_ids: if kind == NightActionKind::Save {
                    Vec::new()
                } else {
                    selection.clone()
                },
            }),
        };

        self.last_error = None;
        self.state = PanelState::Submitting(Submission { action, selection });
        debug!(generation = self.generation, ?action, "submission started");

        Some(PendingSubmission {
            generation: self.generation,
            request,
        })
    }

    /// Apply the outcome of a ticket's request.
    pub fn complete(&mut self, ticket: &PendingSubmission, result: Result<()>) -> Completion {
        self.settle(ticket, result.err().map(|e| e.user_message()))
    }

    fn settle(&mut self, ticket: &PendingSubmission, failure: Option<String>) -> Completion {
        if ticket.generation != self.generation {
            debug!(
                ticket = ticket.generation,
                panel = self.generation,
                "ignoring result for a torn-down panel"
            );
            return Completion::Stale;
        }
        if !matches!(self.state, PanelState::Submitting(_)) {
            return Completion::Stale;
        }
        let PanelState::Submitting(submission) = std::mem::take(&mut self.state) else {
            return Completion::Stale;
        };

        match failure {
            None => {
                self.state = PanelState::Confirmed(submission);
                Completion::Confirmed
            }
            Some(message) => {
                self.last_error = Some(message);
                self.state = if submission.selection.is_empty() {
                    PanelState::Idle
                } else {
                    PanelState::Selected(submission.selection)
                };
                Completion::Rejected
            }
        }
    }

    /// Submit the selection and wait for the outcome.
    ///
    /// Returns `Ok(false)` when there was nothing to submit.
    ///
    /// # Errors
    ///
    /// The submitter's error; the panel is back to `Selected` with
    /// [`last_error`](Self::last_error) set.
    pub async fn confirm<A: ActionSubmitter + ?Sized>(&mut self, submitter: &A) -> Result<bool> {
        let Some(ticket) = self.begin_confirm() else {
            return Ok(false);
        };
        self.finish(ticket, submitter).await
    }

    /// Submit the special action and wait for the outcome.
    ///
    /// # Errors
    ///
    /// Same as [`confirm`](Self::confirm).
    pub async fn confirm_special<A: ActionSubmitter + ?Sized>(
        &mut self,
        submitter: &A,
    ) -> Result<bool> {
        let Some(ticket) = self.begin_special() else {
            return Ok(false);
        };
        self.finish(ticket, submitter).await
    }

    async fn finish<A: ActionSubmitter + ?Sized>(
        &mut self,
        ticket: PendingSubmission,
        submitter: &A,
    ) -> Result<bool> {
        match ticket.request.execute(submitter).await {
            Ok(()) => {
                self.settle(&ticket, None);
                Ok(true)
            }
            Err(e) => {
                self.settle(&ticket, Some(e.user_message()));
                Err(e)
            }
        }
    }

    /// Back to `Idle` as a new instance; outstanding tickets go stale.
    pub fn reset(&mut self) {
        self.generation = next_generation();
        self.state = PanelState::Idle;
        self.last_error = None;
    }

    /// Follow the backend's round. A different round resets the panel to a
    /// fresh `Idle` instance; the same round only updates the recorded flag.
    pub fn sync(&mut self, round: RoundKey, already_acted: bool) {
        if round != self.round {
            debug!(from = ?self.round, to = ?round, "round changed, resetting panel");
            self.round = round;
            self.reset();
        }
        self.already_acted = already_acted;
    }

    /// Take in a newer snapshot of the same round.
    fn refresh(&mut self, candidates: Vec<PlayerId>, already_acted: bool) {
        self.already_acted = already_acted;
        if let PanelState::Selected(targets) = &mut self.state {
            targets.retain(|t| candidates.contains(t));
            if targets.is_empty() {
                self.state = PanelState::Idle;
            }
        }
        self.candidates = candidates;
    }
}

// ── Host ────────────────────────────────────────────────────────────

/// Owns the panel of the current view.
#[derive(Debug, Default)]
pub struct PanelHost {
    panel: Option<InteractionPanel>,
}

impl PanelHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Align the panel with a freshly projected view.
    ///
    /// Same panel kind, player and round: the panel keeps its state and picks
    /// up the new candidates and acknowledgement. Anything else tears the
    /// panel down and, for interactive views, mounts a fresh `Idle` one.
    pub fn sync(&mut self, view: &ViewModel) {
        let Some(fresh) = InteractionPanel::from_view(view) else {
            if self.panel.take().is_some() {
                debug!(kind = ?view.kind(), "panel torn down");
            }
            return;
        };

        match &mut self.panel {
            Some(panel)
                if panel.kind == fresh.kind
                    && panel.round == fresh.round
                    && panel.actor_id == fresh.actor_id =>
            {
                panel.refresh(fresh.candidates, fresh.already_acted);
            }
            _ => {
                debug!(round = ?fresh.round, kind = ?fresh.kind, "panel mounted");
                self.panel = Some(fresh);
            }
        }
    }

    pub fn panel(&self) -> Option<&InteractionPanel> {
        self.panel.as_ref()
    }

    pub fn panel_mut(&mut self) -> Option<&mut InteractionPanel> {
        self.panel.as_mut()
    }

    /// Route a ticket's outcome to the mounted panel.
    pub fn complete(&mut self, ticket: &PendingSubmission, result: Result<()>) -> Completion {
        match self.panel.as_mut() {
            Some(panel) => panel.complete(ticket, result),
            None => Completion::Stale,
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
    use crate::error::WerewolfError;
    use crate::projector::project;
    use crate::protocol::{
        Ack, GameState, Phase, PhaseChangeAck, Player, ResetAck, StartGameAck, VoteAck,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records calls; rejects votes with the scripted message when set.
    #[derive(Default)]
    struct RecordingSubmitter {
        calls: Mutex<Vec<SubmissionRequest>>,
        reject_with: Option<String>,
    }

    impl RecordingSubmitter {
        fn rejecting(message: &str) -> Self {
            Self {
                reject_with: Some(message.into()),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<SubmissionRequest> {
            self.calls.lock().unwrap().clone()
        }

        fn outcome(&self) -> Result<()> {
            match &self.reject_with {
                Some(message) => Err(WerewolfError::Api {
                    status: 400,
                    message: message.clone(),
                }),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ActionSubmitter for RecordingSubmitter {
        async fn cast_vote(&self, voter_id: &str, target_id: &str) -> Result<VoteAck> {
            self.calls.lock().unwrap().push(SubmissionRequest::Vote {
                voter_id: voter_id.into(),
                target_id: target_id.into(),
            });
            self.outcome().map(|()| VoteAck {
                success: true,
                votes_count: None,
            })
        }

        async fn submit_night_action(&self, request: &NightActionRequest) -> Result<Ack> {
            self.calls
                .lock()
                .unwrap()
                .push(SubmissionRequest::Night(request.clone()));
            self.outcome().map(|()| Ack {
                success: true,
                message: None,
            })
        }

        async fn start_game(&self) -> Result<StartGameAck> {
            unimplemented!()
        }

        async fn change_phase(&self, _phase: Phase) -> Result<PhaseChangeAck> {
            unimplemented!()
        }

        async fn reset_game(&self) -> Result<ResetAck> {
            unimplemented!()
        }
    }

    fn player(id: &str, role: Option<&str>) -> Player {
        Player {
            id: id.into(),
            username: id.into(),
            display_name: id.into(),
            avatar_url: String::new(),
            role: role.map(Into::into),
            is_alive: true,
            is_muted: false,
        }
    }

    fn snapshot(phase: Phase, day: u32, my_role: Option<&str>) -> GameState {
        GameState {
            phase,
            day_number: day,
            players: vec![player("p1", my_role), player("p2", None), player("p3", None)],
            dead_players: Vec::new(),
            votes: HashMap::new(),
            acted_players: Vec::new(),
        }
    }

    fn day_panel() -> InteractionPanel {
        InteractionPanel::from_view(&project(Some(&snapshot(Phase::Day, 1, None)), "p1")).unwrap()
    }

    fn night_panel(role: &str) -> InteractionPanel {
        InteractionPanel::from_view(&project(Some(&snapshot(Phase::Night, 1, Some(role))), "p1"))
            .unwrap()
    }

    #[test]
    fn select_moves_to_selected_and_replaces() {
        let mut panel = day_panel();
        assert_eq!(panel.state(), &PanelState::Idle);
        assert!(panel.select("p2"));
        assert!(panel.select("p3"));
        assert_eq!(panel.state(), &PanelState::Selected(vec!["p3".into()]));
    }

    #[test]
    fn cannot_select_self_or_unknown() {
        let mut panel = day_panel();
        assert!(!panel.select("p1"));
        assert!(!panel.select("ghost"));
        assert_eq!(panel.state(), &PanelState::Idle);
    }

    #[test]
    fn selection_ignored_after_server_recorded_vote() {
        let mut state = snapshot(Phase::Day, 1, None);
        state.votes.insert("p1".into(), "p2".into());
        let mut panel = InteractionPanel::from_view(&project(Some(&state), "p1")).unwrap();
        assert!(panel.already_acted());
        assert!(!panel.select("p3"));
        assert!(panel.begin_confirm().is_none());
    }

    #[test]
    fn night_panel_ignores_input_once_action_recorded() {
        let mut state = snapshot(Phase::Night, 1, Some("Sorcière"));
        state.acted_players.push("p1".into());
        let mut panel = InteractionPanel::from_view(&project(Some(&state), "p1")).unwrap();

        assert!(panel.already_acted());
        assert!(!panel.select("p2"));
        assert!(!panel.can_confirm());
        assert!(panel.begin_confirm().is_none());
        assert!(panel.begin_special().is_none());
        assert_eq!(panel.state(), &PanelState::Idle);
    }

    #[test]
    fn double_confirm_yields_one_ticket() {
        let mut panel = day_panel();
        panel.select("p2");
        let ticket = panel.begin_confirm().unwrap();
        assert!(panel.begin_confirm().is_none());
        assert!(!panel.select("p3"));
        assert_eq!(
            ticket.request,
            SubmissionRequest::Vote {
                voter_id: "p1".into(),
                target_id: "p2".into()
            }
        );

        assert_eq!(panel.complete(&ticket, Ok(())), Completion::Confirmed);
        assert!(matches!(panel.state(), PanelState::Confirmed(_)));
        assert!(panel.begin_confirm().is_none());
    }

    #[test]
    fn confirm_without_selection_is_noop() {
        let mut panel = day_panel();
        assert!(panel.begin_confirm().is_none());
        assert_eq!(panel.state(), &PanelState::Idle);
    }

    #[tokio::test]
    async fn repeated_confirm_calls_submitter_once() {
        let submitter = RecordingSubmitter::default();
        let mut panel = day_panel();
        panel.select("p2");

        assert!(panel.confirm(&submitter).await.unwrap());
        assert!(!panel.confirm(&submitter).await.unwrap());
        assert_eq!(submitter.calls().len(), 1);
    }

    #[tokio::test]
    async fn rejected_vote_returns_to_selected_with_message() {
        let submitter = RecordingSubmitter::rejecting("already voted");
        let mut panel = day_panel();
        panel.select("p2");

        let err = panel.confirm(&submitter).await.unwrap_err();
        assert_eq!(err.user_message(), "already voted");
        assert_eq!(panel.state(), &PanelState::Selected(vec!["p2".into()]));
        assert_eq!(panel.last_error(), Some("already voted"));

        // Retry is possible and clears the message.
        let ticket = panel.begin_confirm().unwrap();
        assert!(panel.last_error().is_none());
        panel.complete(&ticket, Ok(()));
    }

    #[test]
    fn stale_ticket_after_reset_is_ignored() {
        let mut panel = day_panel();
        panel.select("p2");
        let ticket = panel.begin_confirm().unwrap();
        panel.reset();

        assert_eq!(panel.complete(&ticket, Ok(())), Completion::Stale);
        assert_eq!(panel.state(), &PanelState::Idle);
    }

    #[test]
    fn sync_to_new_round_resets_and_stales_ticket() {
        let mut panel = day_panel();
        let round = panel.round();
        panel.select("p2");
        let ticket = panel.begin_confirm().unwrap();

        panel.sync(round, false);
        assert!(matches!(panel.state(), PanelState::Submitting(_)));

        let next = RoundKey {
            phase: Phase::Voting,
            day_number: 1,
        };
        panel.sync(next, true);
        assert_eq!(panel.state(), &PanelState::Idle);
        assert_eq!(panel.round(), next);
        assert!(panel.already_acted());
        assert_eq!(panel.complete(&ticket, Ok(())), Completion::Stale);
    }

    #[test]
    fn guard_submits_protect() {
        let mut panel = night_panel("Garde");
        assert!(panel.select("p3"));
        let ticket = panel.begin_confirm().unwrap();
        assert_eq!(
            ticket.request,
            SubmissionRequest::Night(NightActionRequest {
                actor_id: "p1".into(),
                action: NightActionKind::Protect,
                target_ids: vec!["p3".into()],
            })
        );
    }

    #[test]
    fn villager_has_nothing_to_do() {
        let mut panel = night_panel("Villageois");
        assert_eq!(panel.required_targets(), 0);
        assert!(!panel.select("p2"));
        assert!(panel.begin_confirm().is_none());
        assert!(panel.begin_special().is_none());
    }

    #[test]
    fn cupid_needs_two_lovers() {
        let mut panel = night_panel("Cupidon");
        panel.select("p2");
        assert!(panel.begin_confirm().is_none());
        panel.select("p3");
        let ticket = panel.begin_confirm().unwrap();
        let SubmissionRequest::Night(request) = ticket.request else {
            panic!("expected night request");
        };
        assert_eq!(request.action, NightActionKind::Pair);
        assert_eq!(request.target_ids, vec!["p2".to_string(), "p3".to_string()]);
    }

    #[test]
    fn cupid_toggles_selection() {
        let mut panel = night_panel("Cupidon");
        panel.select("p2");
        panel.select("p2");
        assert_eq!(panel.state(), &PanelState::Idle);
    }

    #[tokio::test]
    async fn witch_save_is_target_less_and_keeps_selection_on_failure() {
        let submitter = RecordingSubmitter::rejecting("no potion left");
        let mut panel = night_panel("Sorcière");
        panel.select("p2");

        assert!(panel.confirm_special(&submitter).await.is_err());
        let SubmissionRequest::Night(request) = &submitter.calls()[0] else {
            panic!("expected night request");
        };
        assert_eq!(request.action, NightActionKind::Save);
        assert!(request.target_ids.is_empty());
        assert_eq!(panel.state(), &PanelState::Selected(vec!["p2".into()]));
    }

    #[test]
    fn host_resets_panel_when_round_changes() {
        let mut host = PanelHost::new();
        host.sync(&project(Some(&snapshot(Phase::Day, 1, None)), "p1"));
        host.panel_mut().unwrap().select("p2");
        let ticket = host.panel_mut().unwrap().begin_confirm().unwrap();

        // Same round: state survives.
        host.sync(&project(Some(&snapshot(Phase::Day, 1, None)), "p1"));
        assert!(matches!(
            host.panel().unwrap().state(),
            PanelState::Submitting(_)
        ));

        // Next day: fresh Idle panel, old ticket is stale.
        host.sync(&project(Some(&snapshot(Phase::Day, 2, None)), "p1"));
        assert_eq!(host.panel().unwrap().state(), &PanelState::Idle);
        assert_eq!(host.complete(&ticket, Ok(())), Completion::Stale);
        assert_eq!(host.panel().unwrap().state(), &PanelState::Idle);
    }

    #[test]
    fn host_resets_panel_when_phase_changes() {
        let mut host = PanelHost::new();
        host.sync(&project(Some(&snapshot(Phase::Day, 1, Some("Garde"))), "p1"));
        host.panel_mut().unwrap().select("p2");

        host.sync(&project(Some(&snapshot(Phase::Voting, 1, Some("Garde"))), "p1"));
        assert_eq!(host.panel().unwrap().state(), &PanelState::Idle);

        host.sync(&project(Some(&snapshot(Phase::Night, 1, Some("Garde"))), "p1"));
        assert_eq!(host.panel().unwrap().kind(), PanelKind::NightAction(Role::Guard));
        assert_eq!(host.panel().unwrap().state(), &PanelState::Idle);

        host.sync(&project(Some(&snapshot(Phase::Ended, 1, None)), "p1"));
        assert!(host.panel().is_none());
    }

    #[test]
    fn host_picks_up_recorded_action_within_the_round() {
        let mut host = PanelHost::new();
        host.sync(&project(Some(&snapshot(Phase::Night, 1, Some("Voyante"))), "p1"));
        assert!(host.panel_mut().unwrap().select("p2"));
        assert!(!host.panel().unwrap().already_acted());

        let mut next = snapshot(Phase::Night, 1, Some("Voyante"));
        next.acted_players.push("p1".into());
        host.sync(&project(Some(&next), "p1"));

        let panel = host.panel_mut().unwrap();
        assert!(panel.already_acted());
        assert_eq!(panel.state(), &PanelState::Selected(vec!["p2".into()]));
        assert!(!panel.select("p3"));
        assert!(panel.begin_confirm().is_none());
    }

    #[test]
    fn refresh_drops_targets_that_died() {
        let mut host = PanelHost::new();
        host.sync(&project(Some(&snapshot(Phase::Day, 1, None)), "p1"));
        host.panel_mut().unwrap().select("p3");

        let mut next = snapshot(Phase::Day, 1, None);
        next.players[2].is_alive = false;
        next.dead_players.push("p3".into());
        host.sync(&project(Some(&next), "p1"));

        assert_eq!(host.panel().unwrap().state(), &PanelState::Idle);
        assert!(!host.panel_mut().unwrap().select("p3"));
    }

    #[test]
    fn completes_through_blocking_executor() {
        let submitter = RecordingSubmitter::default();
        let mut panel = night_panel("Voyante");
        panel.select("p2");
        let confirmed = tokio_test::block_on(panel.confirm(&submitter)).unwrap();
        assert!(confirmed);
        assert!(matches!(panel.state(), PanelState::Confirmed(_)));
    }
}
