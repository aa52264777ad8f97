//! Process-wide record of who is signed in.
//!
//! The store owns a [`SessionState`] snapshot, persists it through a
//! [`PersistentStore`] so a restart keeps the user signed in, and publishes
//! every change on its [`ChangeFeed`].
//!
//! Invariants:
//! - authenticated if and only if an identity is present (derived, never stored twice)
//! - `loading` is set only while a login/restore is in flight and is cleared on
//!   every exit path, including when the caller drops the future
//! - at most one login runs at a time; a second attempt is rejected

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use partnerdesk_core::PersistentStore;
use partnerdesk_events::{ChangeFeed, Subscription};

use crate::{AuthError, Authenticator, Credentials, Identity, Role};

/// Storage key of the persisted session record.
pub const SESSION_STORAGE_KEY: &str = "auth-storage";

const PERSISTED_VERSION: u32 = 0;

/// Immutable snapshot of the session, handed to views and the gate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    identity: Option<Identity>,
    loading: bool,
    last_error: Option<String>,
}

impl SessionState {
    /// Signed out, idle, no error.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            ..Self::default()
        }
    }

    pub fn with_loading(mut self, loading: bool) -> Self {
        self.loading = loading;
        self
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|identity| identity.role)
    }
}

/// On-disk shape of the session record.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    state: PersistedState,
    #[serde(default)]
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    user: Option<Identity>,
    is_authenticated: bool,
}

/// Why a persisted record was thrown away.
#[derive(Debug, Error)]
enum RestoreError {
    #[error("session record is not valid JSON for the expected shape: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported session record version {0}")]
    UnsupportedVersion(u32),

    #[error("session record flag disagrees with identity presence")]
    Inconsistent,
}

fn decode_session(bytes: &[u8]) -> Result<Option<Identity>, RestoreError> {
    let record: PersistedSession = serde_json::from_slice(bytes)?;
    if record.version != PERSISTED_VERSION {
        return Err(RestoreError::UnsupportedVersion(record.version));
    }
    match (record.state.user, record.state.is_authenticated) {
        (Some(identity), true) => Ok(Some(identity)),
        (None, false) => Ok(None),
        _ => Err(RestoreError::Inconsistent),
    }
}

fn encode_session(identity: &Identity) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&PersistedSession {
        state: PersistedState {
            user: Some(identity.clone()),
            is_authenticated: true,
        },
        version: PERSISTED_VERSION,
    })
}

#[derive(Debug, Default)]
struct Inner {
    state: SessionState,
    /// Bumped by every logout; an in-flight login started under an older
    /// epoch must not resurrect the session.
    epoch: u64,
}

pub struct SessionStore {
    inner: Mutex<Inner>,
    authenticator: Arc<dyn Authenticator>,
    storage: Arc<dyn PersistentStore>,
    changes: ChangeFeed<SessionState>,
}

impl SessionStore {
    /// Create an empty (signed out) session.
    ///
    /// Call [`SessionStore::restore_session`] once at startup to pick up a
    /// persisted session.
    pub fn new(authenticator: Arc<dyn Authenticator>, storage: Arc<dyn PersistentStore>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            authenticator,
            storage,
            changes: ChangeFeed::new(),
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn subscribe(&self) -> Subscription<SessionState> {
        self.changes.subscribe()
    }

    /// Sign in through the authority.
    ///
    /// Rejected with [`AuthError::LoginInProgress`] while another login or a
    /// restore is running. On failure the session is left signed out and the
    /// message is kept in `last_error`.
    pub async fn login(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        let epoch = self.begin_loading().ok_or(AuthError::LoginInProgress)?;
        let mut guard = LoadingGuard::new(self, epoch);

        tracing::info!(email = %credentials.email, "signing in");
        let outcome = self.authenticator.authenticate(credentials).await;

        match outcome {
            Ok(identity) => {
                self.persist(&identity).await;

                if self.epoch() != epoch {
                    tracing::info!(email = %credentials.email, "sign-in superseded by logout; discarding identity");
                    if !self.is_claimed() {
                        self.forget_persisted().await;
                    }
                    return Err(AuthError::Cancelled);
                }

                tracing::info!(user_id = %identity.id, role = %identity.role, "signed in");
                let issued = identity.clone();
                guard.finish(move |state| {
                    state.identity = Some(issued);
                    state.last_error = None;
                });
                Ok(identity)
            }
            Err(err) => {
                tracing::warn!(email = %credentials.email, error = %err, "sign-in failed");
                if self.epoch() != epoch {
                    return Err(AuthError::Cancelled);
                }
                self.forget_persisted().await;
                let message = err.to_string();
                guard.finish(move |state| {
                    state.identity = None;
                    state.last_error = Some(message);
                });
                Err(err)
            }
        }
    }

    /// Drop the session. Idempotent; never fails.
    pub async fn logout(&self) {
        self.update(|inner| {
            inner.epoch += 1;
            inner.state.identity = None;
            inner.state.loading = false;
            inner.state.last_error = None;
        });
        self.forget_persisted().await;
        tracing::info!("signed out");
    }

    /// Drop the session because the authority rejected our credentials on
    /// some later request.
    pub async fn expire(&self) {
        self.update(|inner| {
            inner.epoch += 1;
            inner.state.identity = None;
            inner.state.loading = false;
            inner.state.last_error = Some("session expired".to_string());
        });
        self.forget_persisted().await;
        tracing::warn!("session expired by authority");
    }

    /// Hydrate from persisted storage. Fails closed: any problem leaves the
    /// session signed out and never reaches the caller.
    pub async fn restore_session(&self) {
        let Some(epoch) = self.begin_loading() else {
            tracing::warn!("restore skipped: a sign-in is already in progress");
            return;
        };
        let mut guard = LoadingGuard::new(self, epoch);

        let restored = match self.storage.get(SESSION_STORAGE_KEY).await {
            Ok(Some(bytes)) => match decode_session(&bytes) {
                Ok(identity) => identity,
                Err(err) => {
                    tracing::warn!(error = %err, "discarding corrupt persisted session");
                    self.forget_persisted().await;
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "could not read persisted session; starting signed out");
                None
            }
        };

        let restored = restored.filter(|_| self.epoch() == epoch);
        if let Some(identity) = &restored {
            tracing::info!(user_id = %identity.id, role = %identity.role, "session restored");
        }
        guard.finish(move |state| state.identity = restored);
    }

    /// Clear the last error without touching the identity.
    pub fn clear_error(&self) {
        self.update(|inner| inner.state.last_error = None);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// A newer login is running or has already signed someone in.
    fn is_claimed(&self) -> bool {
        let inner = self.lock();
        inner.state.loading || inner.state.identity.is_some()
    }

    /// Apply a mutation and publish the resulting snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let (result, snapshot) = {
            let mut inner = self.lock();
            let result = f(&mut inner);
            (result, inner.state.clone())
        };
        self.changes.publish(snapshot);
        result
    }

    /// Flip `loading` on unless it already is. Returns the epoch the
    /// operation runs under.
    fn begin_loading(&self) -> Option<u64> {
        self.update(|inner| {
            if inner.state.loading {
                return None;
            }
            inner.state.loading = true;
            inner.state.last_error = None;
            Some(inner.epoch)
        })
    }

    async fn persist(&self, identity: &Identity) {
        let bytes = match encode_session(identity) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "could not encode session for persistence");
                return;
            }
        };
        if let Err(err) = self.storage.set(SESSION_STORAGE_KEY, bytes).await {
            tracing::warn!(error = %err, "could not persist session; it will not survive a restart");
        }
    }

    async fn forget_persisted(&self) {
        if let Err(err) = self.storage.remove(SESSION_STORAGE_KEY).await {
            tracing::warn!(error = %err, "could not remove persisted session");
        }
    }
}

/// Clears `loading` when dropped unless [`LoadingGuard::finish`] already did.
///
/// Covers the case where the caller abandons a login future mid-flight.
/// Once a logout has moved the epoch on, the guard no longer owns the flag:
/// logout cleared it and a newer login may have set it again.
struct LoadingGuard<'a> {
    store: &'a SessionStore,
    epoch: u64,
    armed: bool,
}

impl<'a> LoadingGuard<'a> {
    fn new(store: &'a SessionStore, epoch: u64) -> Self {
        Self {
            store,
            epoch,
            armed: true,
        }
    }

    fn finish(&mut self, f: impl FnOnce(&mut SessionState)) {
        self.armed = false;
        let epoch = self.epoch;
        self.store.update(|inner| {
            if inner.epoch != epoch {
                return;
            }
            f(&mut inner.state);
            inner.state.loading = false;
        });
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let epoch = self.epoch;
            self.store.update(|inner| {
                if inner.epoch == epoch {
                    inner.state.loading = false;
                }
            });
        }
    }
}
