//! # Scripted Transport Example
//!
//! Plays a short game against an in-process fake backend:
//!
//! - a loopback [`Transport`] carries snapshot frames to the subscriber
//! - a fake [`ActionSubmitter`] records intents and answers repeat votes
//!   with `already voted`, the way the real backend does
//!
//! No network is needed, which makes this a template for testing UI code.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example scripted_transport
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use werewolf_client::protocol::{
    Ack, GameState, NightActionRequest, Phase, PhaseChangeAck, Player, ResetAck, StartGameAck,
    VoteAck,
};
use werewolf_client::{
    project, ActionSubmitter, LiveStateSubscriber, PanelHost, SubscriberConfig, SubscriberEvent,
    Transport, WerewolfError,
};

// ─────────────────────────────────────────────────────────────────────
// Loopback transport
// ─────────────────────────────────────────────────────────────────────

/// Client half of an in-process channel pair. Frames pushed on the sender
/// returned by [`loopback`] arrive through `recv`.
struct LoopbackTransport {
    rx: mpsc::UnboundedReceiver<String>,
}

fn loopback() -> (LoopbackTransport, mpsc::UnboundedSender<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LoopbackTransport { rx }, tx)
}

#[async_trait]
impl Transport for LoopbackTransport {
    /// The fake backend ignores client frames.
    async fn send(&mut self, _message: String) -> Result<(), WerewolfError> {
        Ok(())
    }

    /// Cancel-safe because `mpsc::UnboundedReceiver::recv` is.
    async fn recv(&mut self) -> Option<Result<String, WerewolfError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), WerewolfError> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Fake backend
// ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeBackend {
    voters: Mutex<HashSet<String>>,
}

#[async_trait]
impl ActionSubmitter for FakeBackend {
    async fn cast_vote(&self, voter_id: &str, target_id: &str) -> werewolf_client::Result<VoteAck> {
        let mut voters = self.voters.lock().map_err(|_| WerewolfError::TransportClosed)?;
        if !voters.insert(voter_id.to_owned()) {
            return Err(WerewolfError::Api {
                status: 400,
                message: "already voted".into(),
            });
        }
        tracing::info!("Backend: {voter_id} votes against {target_id}");
        Ok(VoteAck {
            success: true,
            votes_count: u32::try_from(voters.len()).ok(),
        })
    }

    async fn submit_night_action(&self, request: &NightActionRequest) -> werewolf_client::Result<Ack> {
        tracing::info!("Backend: night action {request:?}");
        Ok(Ack {
            success: true,
            message: None,
        })
    }

    async fn start_game(&self) -> werewolf_client::Result<StartGameAck> {
        Err(WerewolfError::Api {
            status: 501,
            message: "not supported by the fake backend".into(),
        })
    }

    async fn change_phase(&self, phase: Phase) -> werewolf_client::Result<PhaseChangeAck> {
        Ok(PhaseChangeAck {
            success: true,
            phase,
        })
    }

    async fn reset_game(&self) -> werewolf_client::Result<ResetAck> {
        Err(WerewolfError::Api {
            status: 501,
            message: "not supported by the fake backend".into(),
        })
    }
}

fn player(id: &str, name: &str, role: &str) -> Player {
    Player {
        id: id.into(),
        username: name.to_lowercase(),
        display_name: name.into(),
        avatar_url: String::new(),
        role: Some(role.into()),
        is_alive: true,
        is_muted: false,
    }
}

fn snapshot(phase: Phase, day_number: u32, votes: &[(&str, &str)]) -> GameState {
    GameState {
        phase,
        day_number,
        players: vec![
            player("1", "Alice", "Voyante"),
            player("2", "Bob", "Loup-Garou"),
            player("3", "Chloé", "Villageois"),
        ],
        dead_players: Vec::new(),
        votes: votes
            .iter()
            .map(|(v, t)| ((*v).to_string(), (*t).to_string()))
            .collect::<HashMap<_, _>>(),
        acted_players: Vec::new(),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Script
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let me = "1";
    let backend = FakeBackend::default();
    let (transport, feed) = loopback();
    let (mut subscriber, mut events) =
        LiveStateSubscriber::start(transport, SubscriberConfig::default());
    let mut panels = PanelHost::new();

    feed.send(serde_json::to_string(&snapshot(Phase::Night, 1, &[]))?)?;
    feed.send(serde_json::to_string(&snapshot(Phase::Day, 1, &[]))?)?;
    feed.send(serde_json::to_string(&snapshot(Phase::Day, 1, &[(me, "2")]))?)?;
    drop(feed);

    while let Some(event) = events.recv().await {
        let state = match event {
            SubscriberEvent::Snapshot(state) => state,
            other => {
                tracing::info!("Event: {other:?}");
                if other.is_terminal() {
                    break;
                }
                continue;
            }
        };

        let view = project(Some(&*state), me);
        tracing::info!("View: {:?} at day {}", view.kind(), state.day_number);
        panels.sync(&view);
        let Some(panel) = panels.panel_mut() else {
            continue;
        };

        if panel.already_acted() {
            tracing::info!("Already acted this round, panel is read-only");
            continue;
        }
        panel.select("2");
        match panel.confirm(&backend).await {
            Ok(true) => tracing::info!("Confirmed: {:?}", panel.state()),
            Ok(false) => tracing::info!("Nothing to confirm"),
            Err(e) => tracing::warn!("Rejected ({}), panel back to {:?}", e.user_message(), panel.state()),
        }
    }

    subscriber.shutdown().await;
    Ok(())
}
