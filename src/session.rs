//! Session store: the bearer token and identity obtained at login.
//!
//! The session does not reach for a global. Callers construct a [`Session`]
//! over whatever [`SessionStorage`] fits their platform and pass it to the
//! code that needs "who am I". Two entries are kept, `auth_token` and
//! `user_data`, and they are always cleared together.
//!
//! # Example
//!
//! ```
//! use werewolf_client::protocol::{AuthSession, Identity};
//! use werewolf_client::session::{MemoryStorage, Session};
//!
//! let session = Session::new(MemoryStorage::default());
//! assert!(!session.is_authenticated());
//!
//! session.save(&AuthSession {
//!     access_token: "jwt".into(),
//!     user: Identity {
//!         id: "42".into(),
//!         username: "alice".into(),
//!         discriminator: "0".into(),
//!         avatar: None,
//!     },
//! })?;
//! assert_eq!(session.player_id()?.as_deref(), Some("42"));
//!
//! session.logout()?;
//! assert!(session.identity()?.is_none());
//! # Ok::<(), werewolf_client::WerewolfError>(())
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{Result, WerewolfError};
use crate::protocol::{AuthSession, Identity, PlayerId};

/// Storage key of the bearer token.
pub const TOKEN_KEY: &str = "auth_token";

/// Storage key of the JSON-serialized [`Identity`].
pub const IDENTITY_KEY: &str = "user_data";

/// String key/value capability backing a [`Session`].
pub trait SessionStorage: Send + Sync {
    /// Read an entry. `Ok(None)` when absent.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Create or overwrite an entry.
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Delete an entry. Deleting a missing entry is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

// ── In-memory storage ───────────────────────────────────────────────

/// Process-local storage, lost on exit. Suitable for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| WerewolfError::Storage("memory storage lock poisoned".into()))
    }
}

impl SessionStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// ── File storage ────────────────────────────────────────────────────

/// Storage persisted as a single JSON object on disk.
///
/// Every operation reads the whole file and, for writes, replaces it. The
/// file holds two short strings, so nothing smarter is warranted.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStorage {
    /// Use `path` as the backing file. It is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(HashMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(entries)?)?;
        Ok(())
    }

    fn locked<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| WerewolfError::Storage("file storage lock poisoned".into()))?;
        f()
    }
}

impl SessionStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        self.locked(|| Ok(self.load()?.get(key).cloned()))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.locked(|| {
            let mut entries = self.load()?;
            entries.insert(key.to_owned(), value.to_owned());
            self.store(&entries)
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.locked(|| {
            let mut entries = self.load()?;
            if entries.remove(key).is_some() {
                self.store(&entries)?;
            }
            Ok(())
        })
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// The viewer's credential and identity, over an injected storage.
#[derive(Debug)]
pub struct Session<S: SessionStorage> {
    storage: S,
}

impl<S: SessionStorage> Session<S> {
    /// Wrap a storage backend.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Persist the result of a successful OAuth exchange.
    ///
    /// The identity is written before the token, so a stored token always
    /// has an identity next to it. If the token write fails, both entries
    /// are cleared and the session reads as logged out.
    ///
    /// # Errors
    ///
    /// Returns [`WerewolfError::Storage`] or [`WerewolfError::Io`] if the
    /// backend cannot be written.
    pub fn save(&self, auth: &AuthSession) -> Result<()> {
        let identity = serde_json::to_string(&auth.user)?;
        self.storage.write(IDENTITY_KEY, &identity)?;
        if let Err(e) = self.storage.write(TOKEN_KEY, &auth.access_token) {
            warn!(user = %auth.user.id, "token write failed, clearing session: {e}");
            if let Err(cleanup) = self.clear() {
                warn!("could not clear partial session: {cleanup}");
            }
            return Err(e);
        }
        debug!(user = %auth.user.id, "session saved");
        Ok(())
    }

    /// The bearer token, if logged in.
    pub fn token(&self) -> Result<Option<String>> {
        self.storage.read(TOKEN_KEY)
    }

    /// The stored identity, if logged in.
    ///
    /// A corrupt identity entry is treated as absent and logged.
    pub fn identity(&self) -> Result<Option<Identity>> {
        let Some(raw) = self.storage.read(IDENTITY_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(identity) => Ok(Some(identity)),
            Err(e) => {
                warn!("discarding unreadable stored identity: {e}");
                Ok(None)
            }
        }
    }

    /// Id of the logged-in player, used to find "me" in snapshots.
    pub fn player_id(&self) -> Result<Option<PlayerId>> {
        Ok(self.identity()?.map(|identity| identity.id))
    }

    /// `true` when a bearer token is stored.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.token(), Ok(Some(token)) if !token.is_empty())
    }

    /// Token for an authenticated call, or [`WerewolfError::Auth`].
    pub fn require_token(&self) -> Result<String> {
        match self.token()? {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(WerewolfError::Auth("not logged in".into())),
        }
    }

    /// Forget the token and identity.
    ///
    /// Both removals are attempted even if the first fails. The first
    /// error is returned.
    pub fn logout(&self) -> Result<()> {
        self.clear()?;
        debug!("session cleared");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let token = self.storage.remove(TOKEN_KEY);
        let identity = self.storage.remove(IDENTITY_KEY);
        token.and(identity)
    }

    /// Borrow the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
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

    fn alice() -> AuthSession {
        AuthSession {
            access_token: "token-abc".into(),
            user: Identity {
                id: "1001".into(),
                username: "alice".into(),
                discriminator: "0".into(),
                avatar: Some("hash".into()),
            },
        }
    }

    #[test]
    fn save_then_read_back() {
        let session = Session::new(MemoryStorage::default());
        session.save(&alice()).unwrap();

        assert!(session.is_authenticated());
        assert_eq!(session.token().unwrap().as_deref(), Some("token-abc"));
        assert_eq!(session.identity().unwrap(), Some(alice().user));
        assert_eq!(session.require_token().unwrap(), "token-abc");
    }

    #[test]
    fn logout_clears_both_entries() {
        let session = Session::new(MemoryStorage::default());
        session.save(&alice()).unwrap();
        session.logout().unwrap();

        assert!(!session.is_authenticated());
        assert!(session.storage().read(TOKEN_KEY).unwrap().is_none());
        assert!(session.storage().read(IDENTITY_KEY).unwrap().is_none());
        assert!(matches!(
            session.require_token(),
            Err(WerewolfError::Auth(_))
        ));
    }

    /// Memory storage that rejects writes and removals of chosen keys.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail_write: Option<&'static str>,
        fail_remove: Option<&'static str>,
    }

    impl SessionStorage for FlakyStorage {
        fn read(&self, key: &str) -> Result<Option<String>> {
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<()> {
            if self.fail_write == Some(key) {
                return Err(WerewolfError::Storage(format!("cannot write {key}")));
            }
            self.inner.write(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            if self.fail_remove == Some(key) {
                return Err(WerewolfError::Storage(format!("cannot remove {key}")));
            }
            self.inner.remove(key)
        }
    }

    #[test]
    fn failed_identity_write_leaves_no_token() {
        let session = Session::new(FlakyStorage {
            fail_write: Some(IDENTITY_KEY),
            ..FlakyStorage::default()
        });

        assert!(matches!(session.save(&alice()), Err(WerewolfError::Storage(_))));
        assert!(!session.is_authenticated());
        assert!(session.identity().unwrap().is_none());
        assert!(session.storage().read(TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn failed_token_write_clears_identity() {
        let session = Session::new(FlakyStorage {
            fail_write: Some(TOKEN_KEY),
            ..FlakyStorage::default()
        });

        assert!(matches!(session.save(&alice()), Err(WerewolfError::Storage(_))));
        assert!(!session.is_authenticated());
        assert!(session.player_id().unwrap().is_none());
    }

    #[test]
    fn logout_removes_identity_when_token_removal_fails() {
        let session = Session::new(FlakyStorage {
            fail_remove: Some(TOKEN_KEY),
            ..FlakyStorage::default()
        });
        session.save(&alice()).unwrap();

        let err = session.logout().unwrap_err();
        assert!(err.to_string().contains(TOKEN_KEY), "{err}");
        assert!(session.identity().unwrap().is_none());
    }

    #[test]
    fn corrupt_identity_reads_as_absent() {
        let storage = MemoryStorage::default();
        storage.write(IDENTITY_KEY, "{not json").unwrap();
        let session = Session::new(storage);
        assert!(session.identity().unwrap().is_none());
    }

    #[test]
    fn file_storage_persists_across_instances() {
        let path = std::env::temp_dir().join(format!(
            "werewolf-session-{}-{:?}.json",
            std::process::id(),
            std::thread::current().id()
        ));
        let _ = std::fs::remove_file(&path);

        Session::new(FileStorage::new(&path)).save(&alice()).unwrap();

        let reopened = Session::new(FileStorage::new(&path));
        assert_eq!(reopened.player_id().unwrap().as_deref(), Some("1001"));

        reopened.logout().unwrap();
        assert!(!Session::new(FileStorage::new(&path)).is_authenticated());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn file_storage_missing_file_is_empty() {
        let storage = FileStorage::new(std::env::temp_dir().join("werewolf-does-not-exist.json"));
        assert!(storage.read(TOKEN_KEY).unwrap().is_none());
        storage.remove(TOKEN_KEY).unwrap();
    }
}
