//! Error types for the Werewolf client.

use thiserror::Error;

/// Errors that can occur when using the Werewolf client.
#[derive(Debug, Error)]
pub enum WerewolfError {
    /// Authentication failed or no credential is available.
    ///
    /// Covers a missing or rejected OAuth code and calls that need a bearer
    /// token while the session is logged out.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The backend answered with a non-2xx status.
    #[error("backend rejected request ({status}): {message}")]
    Api {
        /// HTTP status code returned by the backend.
        status: u16,
        /// The backend's `detail` field when present, else a generic message.
        message: String,
    },

    /// The HTTP request could not be completed (DNS, connect, body decode).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Attempted an operation that requires a live subscription, but the
    /// background loop has stopped.
    #[error("not connected to server")]
    NotConnected,

    /// Failed to serialize or deserialize a JSON document.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The session storage backend failed to read or write an entry.
    #[error("session storage error: {0}")]
    Storage(String),

    /// A phase name outside `lobby`, `night`, `day`, `voting`, `ended`.
    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    /// A configuration value is missing or malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WerewolfError {
    /// Message suitable for showing to the acting player.
    ///
    /// Backend rejections surface their `detail` verbatim; everything else
    /// falls back to the error's display text.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// A specialized [`Result`] type for Werewolf client operations.
pub type Result<T> = std::result::Result<T, WerewolfError>;

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
    fn api_error_user_message_is_backend_detail() {
        let err = WerewolfError::Api {
            status: 400,
            message: "already voted".into(),
        };
        assert_eq!(err.user_message(), "already voted");
        assert_eq!(
            err.to_string(),
            "backend rejected request (400): already voted"
        );
    }

    #[test]
    fn other_errors_fall_back_to_display() {
        assert_eq!(
            WerewolfError::NotConnected.user_message(),
            "not connected to server"
        );
    }

    #[test]
    fn serde_errors_convert() {
        let err: WerewolfError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, WerewolfError::Serialization(_)));
    }
}
