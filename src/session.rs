// src/session.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::ClientResult;
use crate::models::User;

/// What gets persisted between runs: the bearer token and the user snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// Nothing signed in yet.
    Initial,
    Requested,
    /// The backend rejected the token (401) or the stored session failed to restore.
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    SignedOut { reason: SignOutReason },
    SignedIn(User),
}

// ─── STORAGE ─────────────────────────────────────────────────────────────────

pub trait SessionStore: Send + Sync {
    fn save(&self, session: &Session) -> ClientResult<()>;

    fn load(&self) -> ClientResult<Option<Session>>;

    fn clear(&self) -> ClientResult<()>;
}

/// JSON file on disk, e.g. `~/.taskline/session.json`.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: &Session) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn load(&self) -> ClientResult<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn clear(&self) -> ClientResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps the session for the life of the process only.
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &Session) -> ClientResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn load(&self) -> ClientResult<Option<Session>> {
        Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn clear(&self) -> ClientResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

// ─── CONTEXT ─────────────────────────────────────────────────────────────────

/// Shared handle to the signed-in session. Cloning is cheap; every clone sees
/// the same state, and a sign-out through any of them is seen by all.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: Box<dyn SessionStore>,
    current: RwLock<Option<Session>>,
    events: watch::Sender<SessionState>,
}

impl SessionContext {
    pub fn new(store: impl SessionStore + 'static) -> Self {
        let (events, _) = watch::channel(SessionState::SignedOut {
            reason: SignOutReason::Initial,
        });
        Self {
            inner: Arc::new(SessionInner {
                store: Box::new(store),
                current: RwLock::new(None),
                events,
            }),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.token.clone())
    }

    pub fn current_user(&self) -> Option<User> {
        self.read().as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.inner.events.borrow(), SessionState::SignedIn(_))
    }

    pub fn state(&self) -> SessionState {
        self.inner.events.borrow().clone()
    }

    /// Receives every sign-in and sign-out, including forced ones.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.events.subscribe()
    }

    /// Reads the persisted session without activating it.
    pub fn load_persisted(&self) -> ClientResult<Option<Session>> {
        self.inner.store.load()
    }

    /// Makes `session` current in memory so its token can be tried, without
    /// persisting or announcing it.
    pub(crate) fn stage(&self, session: Session) {
        *self.write() = Some(session);
    }

    /// Persists and activates a session.
    pub fn establish(&self, session: Session) -> ClientResult<()> {
        self.inner.store.save(&session)?;
        let user = session.user.clone();
        *self.write() = Some(session);
        info!("Signed in as {}", user.username);
        self.publish(SessionState::SignedIn(user));
        Ok(())
    }

    /// Replaces the cached user snapshot after a profile change.
    pub fn update_user(&self, user: User) -> ClientResult<()> {
        let updated = {
            let mut current = self.write();
            match current.as_mut() {
                Some(session) => {
                    session.user = user.clone();
                    session.clone()
                }
                None => return Ok(()),
            }
        };
        self.inner.store.save(&updated)?;
        self.publish(SessionState::SignedIn(user));
        Ok(())
    }

    pub fn clear(&self, reason: SignOutReason) -> ClientResult<()> {
        *self.write() = None;
        let stored = self.inner.store.clear();
        self.publish(SessionState::SignedOut { reason });
        stored
    }

    /// Global 401 policy: drop the session that owned `token`. A newer session
    /// established in the meantime is left alone.
    pub(crate) fn expire(&self, token: &str) {
        let owned = self.read().as_ref().is_some_and(|s| s.token == token);
        if !owned {
            debug!("Ignoring 401 for a token that is no longer current");
            return;
        }
        warn!("Session rejected by server; signing out");
        if let Err(e) = self.clear(SignOutReason::Expired) {
            error!("Failed to clear stored session: {}", e);
        }
    }

    fn publish(&self, next: SessionState) {
        self.inner.events.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.inner.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Session>> {
        self.inner.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}
