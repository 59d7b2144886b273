//! Backend endpoints and client-wide settings.

use std::time::Duration;

use crate::error::{Result, WerewolfError};

/// Default REST base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Environment variable overriding [`ClientConfig::api_url`].
pub const API_URL_ENV: &str = "WEREWOLF_API_URL";

/// Environment variable overriding [`ClientConfig::ws_url`].
pub const WS_URL_ENV: &str = "WEREWOLF_WS_URL";

/// Environment variable overriding [`ClientConfig::request_timeout`], in seconds.
pub const REQUEST_TIMEOUT_ENV: &str = "WEREWOLF_REQUEST_TIMEOUT_SECS";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the backend lives.
///
/// ```
/// use werewolf_client::config::ClientConfig;
///
/// let config = ClientConfig::new("https://wolf.example.com/");
/// assert_eq!(config.api_url, "https://wolf.example.com");
/// assert_eq!(config.ws_url, "wss://wolf.example.com/ws");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// REST base URL, without a trailing slash.
    pub api_url: String,
    /// Live feed URL. Derived from `api_url` unless set explicitly.
    pub ws_url: String,
    /// Per-request timeout for REST calls.
    ///
    /// Defaults to **10 seconds**.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    /// Configuration for the backend at `api_url`; the feed URL is derived
    /// by switching the scheme to `ws`/`wss` and appending `/ws`.
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let ws_url = derive_ws_url(&api_url);
        Self {
            api_url,
            ws_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the feed URL.
    #[must_use]
    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    /// Override the REST timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build from `WEREWOLF_API_URL`, `WEREWOLF_WS_URL` and
    /// `WEREWOLF_REQUEST_TIMEOUT_SECS`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`WerewolfError::InvalidConfig`] when a variable is set but
    /// malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) over an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// Returns [`WerewolfError::InvalidConfig`] when a value is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = lookup(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut config = Self::new(api_url);

        if let Some(ws_url) = lookup(WS_URL_ENV) {
            config.ws_url = ws_url;
        }

        if let Some(raw) = lookup(REQUEST_TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                WerewolfError::InvalidConfig(format!("{REQUEST_TIMEOUT_ENV} must be seconds, got {raw:?}"))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check URL schemes.
    ///
    /// # Errors
    ///
    /// Returns [`WerewolfError::InvalidConfig`] naming the bad field.
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(WerewolfError::InvalidConfig(format!(
                "api_url must be http(s), got {:?}",
                self.api_url
            )));
        }
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(WerewolfError::InvalidConfig(format!(
                "ws_url must be ws(s), got {:?}",
                self.ws_url
            )));
        }
        Ok(())
    }
}

fn derive_ws_url(api_url: &str) -> String {
    if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{rest}/ws")
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{rest}/ws")
    } else {
        format!("{api_url}/ws")
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
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_localhost() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.ws_url, "ws://localhost:8000/ws");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        config.validate().unwrap();
    }

    #[test]
    fn environment_overrides_apply() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_URL_ENV, "https://wolf.example.com"),
            (WS_URL_ENV, "wss://feed.example.com/ws"),
            (REQUEST_TIMEOUT_ENV, "3"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://wolf.example.com");
        assert_eq!(config.ws_url, "wss://feed.example.com/ws");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[(REQUEST_TIMEOUT_ENV, "soon")])).unwrap_err();
        assert!(matches!(err, WerewolfError::InvalidConfig(_)));

        let err = ClientConfig::from_lookup(lookup(&[(API_URL_ENV, "ftp://nope")])).unwrap_err();
        assert!(matches!(err, WerewolfError::InvalidConfig(_)));
    }
}
