//! Transport abstraction for the live game-state feed.
//!
//! The backend pushes one JSON document per frame; every frame is a complete
//! [`GameState`](crate::protocol::GameState). [`Transport`] is the text-frame
//! channel the [`LiveStateSubscriber`](crate::subscriber::LiveStateSubscriber)
//! reads from, and [`Connector`] is how the subscriber opens a fresh one when
//! reconnecting.
//!
//! # Connection Setup
//!
//! Opening the first connection is not part of [`Transport`]. Build a
//! connected transport (e.g. `WebSocketTransport::connect`) and hand it to the
//! subscriber.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use werewolf_client::error::WerewolfError;
//! use werewolf_client::transport::Transport;
//! use tokio::sync::mpsc;
//!
//! struct ChannelTransport {
//!     rx: mpsc::UnboundedReceiver<String>,
//! }
//!
//! #[async_trait]
//! impl Transport for ChannelTransport {
//!     async fn send(&mut self, _message: String) -> Result<(), WerewolfError> {
//!         Ok(())
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, WerewolfError>> {
//!         self.rx.recv().await.map(Ok)
//!     }
//!
//!     async fn close(&mut self) -> Result<(), WerewolfError> {
//!         self.rx.close();
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::WerewolfError;

/// A bidirectional text message transport.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe: the subscriber polls it
/// inside `tokio::select!`. Channel-backed implementations are cancel-safe by
/// construction.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one JSON text message to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`WerewolfError::TransportSend`] if the message could not be sent.
    async fn send(&mut self, message: String) -> Result<(), WerewolfError>;

    /// Receive the next text frame.
    ///
    /// - `Some(Ok(text))`: a complete frame
    /// - `Some(Err(e))`: a transport error
    /// - `None`: the backend closed the connection cleanly
    async fn recv(&mut self) -> Option<Result<String, WerewolfError>>;

    /// Close the connection gracefully. Must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Resources are released
    /// regardless.
    async fn close(&mut self) -> Result<(), WerewolfError>;
}

/// Opens new transports for the subscriber's reconnect loop.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Transport produced by this connector.
    type Transport: Transport;

    /// Open a fresh connection to the live feed.
    ///
    /// # Errors
    ///
    /// Any error is treated as a failed reconnect attempt.
    async fn connect(&self) -> Result<Self::Transport, WerewolfError>;
}
