//! # Werewolf Client
//!
//! Async Rust client for the Discord Loup-Garou (Werewolf) game backend.
//!
//! The backend is authoritative: it pushes a full [`GameState`] snapshot on
//! its feed after every change, and accepts player intents over REST. This
//! crate mirrors the snapshots, projects them into what the local player
//! should see, and drives the local selection/confirm flow of the voting and
//! night-action panels.
//!
//! ## Features
//!
//! - **Live state**: [`LiveStateSubscriber`] keeps the latest snapshot over
//!   any [`Transport`], with optional backoff reconnection
//! - **Pure projection**: [`project`] maps a snapshot and the player id to a
//!   [`ViewModel`]
//! - **Interaction panels**: [`InteractionPanel`] guards against double
//!   submission and stale results across rounds
//! - **REST actions**: [`ApiClient`] implements [`ActionSubmitter`], auth and
//!   the read endpoints
//! - **WebSocket built-in**: default `transport-websocket` feature provides
//!   `WebSocketTransport` and `WebSocketConnector`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use werewolf_client::{
//!     project, ApiClient, ClientConfig, LiveStateSubscriber, PanelHost,
//!     SubscriberConfig, SubscriberEvent, WebSocketConnector,
//! };
//!
//! let config = ClientConfig::from_env()?;
//! let api = ApiClient::from_config(&config)?;
//! let connector = WebSocketConnector::new(&config.ws_url);
//! let transport = connector.connect().await?;
//! let (_subscriber, mut events) =
//!     LiveStateSubscriber::start_with_reconnect(transport, connector, SubscriberConfig::default());
//!
//! let mut panels = PanelHost::new();
//! while let Some(event) = events.recv().await {
//!     if let SubscriberEvent::Snapshot(state) = event {
//!         let view = project(Some(&*state), "my-discord-id");
//!         panels.sync(&view);
//!     }
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod event;
pub mod interaction;
pub mod projector;
pub mod protocol;
pub mod roles;
pub mod session;
#[cfg(feature = "tokio-runtime")]
pub mod subscriber;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use api::{ActionSubmitter, ApiClient};
pub use config::ClientConfig;
pub use error::{Result, WerewolfError};
pub use event::SubscriberEvent;
pub use interaction::{InteractionPanel, PanelHost, PanelState};
pub use projector::{project, ViewKind, ViewModel};
pub use protocol::{GameState, Phase, Player, PlayerId};
pub use roles::Role;
pub use session::{FileStorage, MemoryStorage, Session, SessionStorage};
#[cfg(feature = "tokio-runtime")]
pub use subscriber::{LiveStateSubscriber, ReconnectPolicy, SubscriberConfig};
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
