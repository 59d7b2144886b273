//! # Terminal Client Example
//!
//! A line-oriented Werewolf client:
//!
//! 1. Load the saved session (or exchange an OAuth code for one)
//! 2. Subscribe to the game feed over WebSocket, reconnecting on loss
//! 3. Print the projected view after every snapshot
//! 4. Drive the vote / night-action panel from stdin
//!
//! ## Running
//!
//! ```sh
//! # Backend on localhost:8000, first run with the code from the Discord redirect:
//! WEREWOLF_OAUTH_CODE=abc123 cargo run --example terminal_client
//!
//! # Later runs reuse the stored session:
//! WEREWOLF_API_URL=https://wolf.example.com cargo run --example terminal_client
//! ```
//!
//! Commands: `select <player-id>`, `confirm`, `special`, `clear`, `quit`.

use tokio::io::{AsyncBufReadExt, BufReader};
use werewolf_client::interaction::PanelKind;
use werewolf_client::{
    project, ApiClient, ClientConfig, Connector, FileStorage, LiveStateSubscriber, PanelHost,
    Session, SubscriberConfig, SubscriberEvent, ViewModel, WebSocketConnector,
};

/// Session file when `WEREWOLF_SESSION_FILE` is not set.
const DEFAULT_SESSION_FILE: &str = ".werewolf-session.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=werewolf_client=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let config = ClientConfig::from_env()?;
    let api = ApiClient::from_config(&config)?;
    let session_file = std::env::var("WEREWOLF_SESSION_FILE")
        .unwrap_or_else(|_| DEFAULT_SESSION_FILE.to_string());
    let session = Session::new(FileStorage::new(session_file));

    // ── Login ───────────────────────────────────────────────────────
    if let Ok(code) = std::env::var("WEREWOLF_OAUTH_CODE") {
        let auth = api.login(&code, &session).await?;
        tracing::info!("Logged in as {}", auth.user.username);
    }
    let Some(my_id) = session.player_id()? else {
        tracing::error!("Not logged in. Open {} and rerun with WEREWOLF_OAUTH_CODE", api.login_url().await?);
        return Ok(());
    };

    // ── Subscribe ───────────────────────────────────────────────────
    tracing::info!("Connecting to {}", config.ws_url);
    let connector = WebSocketConnector::new(config.ws_url.clone());
    let transport = connector.connect().await?;
    let (mut subscriber, mut events) =
        LiveStateSubscriber::start_with_reconnect(transport, connector, SubscriberConfig::default());

    let mut panels = PanelHost::new();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SubscriberEvent::Connected => tracing::info!("Feed connected"),
                    SubscriberEvent::Snapshot(state) => {
                        let view = project(Some(&*state), &my_id);
                        panels.sync(&view);
                        render(&view, &panels);
                    }
                    SubscriberEvent::Reconnecting { attempt, delay } => {
                        tracing::warn!("Feed lost, retry #{attempt} in {delay:?}");
                    }
                    SubscriberEvent::Disconnected { reason } => {
                        tracing::warn!("Disconnected: {}", reason.as_deref().unwrap_or("closed by server"));
                        break;
                    }
                }
            }

            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                let mut words = line.split_whitespace();
                let Some(panel) = panels.panel_mut() else {
                    println!("Nothing to do right now.");
                    continue;
                };
                let outcome = match (words.next(), words.next()) {
                    (Some("select"), Some(target)) => {
                        if !panel.select(target) {
                            println!("Can't select {target}.");
                        }
                        Ok(true)
                    }
                    (Some("confirm"), _) => panel.confirm(&api).await,
                    (Some("special"), _) => panel.confirm_special(&api).await,
                    (Some("clear"), _) => {
                        panel.clear_selection();
                        Ok(true)
                    }
                    (Some("quit"), _) => break,
                    _ => {
                        println!("Commands: select <id>, confirm, special, clear, quit");
                        Ok(true)
                    }
                };
                if let Err(e) = outcome {
                    println!("Rejected: {}", e.user_message());
                }
                println!("Panel: {:?}", panel.state());
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    subscriber.shutdown().await;
    Ok(())
}

fn render(view: &ViewModel, panels: &PanelHost) {
    match view {
        ViewModel::Loading => println!("Loading…"),
        ViewModel::NotInGame => println!("You are not part of this game."),
        ViewModel::Lobby { players } => {
            println!("Lobby: {} player(s) waiting", players.len());
        }
        ViewModel::NightAction(night) => {
            let d = night.descriptor;
            println!("Night {}: {} ({})", night.round.day_number, d.title, night.role);
            println!("  {}", d.instructions);
            if night.has_acted {
                println!("  Action recorded.");
            }
            for p in &night.candidate_targets {
                println!("  - {} [{}]", p.display_name, p.id);
            }
        }
        ViewModel::DayVote(day) => {
            println!(
                "Day {}: {}/{} votes cast",
                day.round.day_number, day.votes_cast, day.living_count
            );
            for p in &day.candidate_targets {
                println!("  - {} [{}]: {} vote(s)", p.display_name, p.id, day.tally.count_for(&p.id));
            }
            if let Some(target) = &day.my_vote {
                println!("  You voted for {target}.");
            }
        }
        ViewModel::Spectating { round, .. } => {
            println!("You are dead. Watching {} of day {}.", round.phase.label(), round.day_number);
        }
        ViewModel::Results { players } => {
            println!("Game over:");
            for p in players {
                let status = if p.is_alive { "alive" } else { "dead" };
                println!("  - {} ({}) {status}", p.display_name, p.role.as_deref().unwrap_or("?"));
            }
        }
    }

    if let Some(panel) = panels.panel() {
        if let PanelKind::NightAction(role) = panel.kind() {
            if let Some(special) = role.descriptor().special_action {
                println!("  `special`: {}", special.label);
            }
        }
    }
}
