//! Session store — credential state, write-through persistence, lifecycle.
//!
//! ARCHITECTURE
//! ============
//! The session phase is a sum type: `Anonymous`, `Authenticating` (login
//! call outstanding), or `Authenticated` holding the access token and the
//! cached principal. `loading` and `is_authenticated` are derived views of
//! the phase, so the loading-while-authenticated combination cannot be
//! represented. The refresh token sits beside the phase because it is a
//! minting credential, valid with or without a live access token.
//!
//! Every credential mutation is mirrored to the [`Storage`] adapter under
//! the keys `token`, `refreshToken`, and `userData` before the mutator
//! returns. `logout` and `init` never fail; their storage traffic is
//! best-effort and logged.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::ops;
use crate::storage::{Storage, StorageError, StorageValue};
use crate::types::{LoginData, TokenPair, UserPatch, UserRecord, merge_user_fields};

pub(crate) const KEY_TOKEN: &str = "token";
pub(crate) const KEY_REFRESH_TOKEN: &str = "refreshToken";
pub(crate) const KEY_USER_DATA: &str = "userData";

// =============================================================================
// PHASE
// =============================================================================

/// Lifecycle phase of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// No live credential.
    Anonymous,
    /// A login call is outstanding.
    Authenticating,
    /// Holding a bearer credential; `user` hydrates lazily.
    Authenticated {
        access_token: String,
        user: Option<UserRecord>,
    },
}

/// Collaborator hook for forced session termination. The UI layer registers
/// one to route the user back to its login entry point.
pub trait SessionObserver: Send + Sync {
    fn session_expired(&self);
}

// =============================================================================
// SHARED CREDENTIAL CELL
// =============================================================================

struct SessionState {
    phase: SessionPhase,
    refresh_token: Option<String>,
    error: Option<String>,
}

/// Credential state + persistence, shared between the store and the request
/// pipeline. All locking is internal and never held across an await.
pub(crate) struct SessionCell {
    state: RwLock<SessionState>,
    storage: Box<dyn Storage>,
}

impl SessionCell {
    pub(crate) fn new(storage: Box<dyn Storage>) -> Self {
        Self {
            state: RwLock::new(SessionState {
                phase: SessionPhase::Anonymous,
                refresh_token: None,
                error: None,
            }),
            storage,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // -- accessors ------------------------------------------------------------

    pub(crate) fn access_token(&self) -> Option<String> {
        match &self.read().phase {
            SessionPhase::Authenticated { access_token, .. } => Some(access_token.clone()),
            _ => None,
        }
    }

    pub(crate) fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    pub(crate) fn user(&self) -> Option<UserRecord> {
        match &self.read().phase {
            SessionPhase::Authenticated { user, .. } => user.clone(),
            _ => None,
        }
    }

    pub(crate) fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.read().phase.clone()
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        matches!(self.read().phase, SessionPhase::Authenticated { .. })
    }

    pub(crate) fn loading(&self) -> bool {
        matches!(self.read().phase, SessionPhase::Authenticating)
    }

    // -- storage helpers ------------------------------------------------------

    fn read_text(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(Some(value)) => match value.as_text() {
                Some(text) => Some(text.to_owned()),
                None => {
                    tracing::warn!(key, "stored entry has unexpected kind; ignoring");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "storage read failed; treating as absent");
                None
            }
        }
    }

    fn read_stored_user(&self) -> Option<UserRecord> {
        let value = match self.storage.get(KEY_USER_DATA) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "stored user data unreadable; treating as absent");
                return None;
            }
        };
        let json = value.as_json()?.clone();
        match serde_json::from_value(json) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "stored user data does not decode; treating as absent");
                None
            }
        }
    }

    fn persist_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        let json = serde_json::to_value(user).map_err(|e| StorageError::Encode(e.to_string()))?;
        self.storage.set(KEY_USER_DATA, StorageValue::json(json))
    }

    fn remove_best_effort(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            tracing::warn!(key, error = %e, "failed to clear persisted entry");
        }
    }

    // -- mutators (write-through) ---------------------------------------------

    pub(crate) fn set_token(&self, token: Option<&str>) -> Result<(), StorageError> {
        match token {
            Some(token) => self.storage.set(KEY_TOKEN, StorageValue::text(token))?,
            None => self.storage.remove(KEY_TOKEN)?,
        }
        let mut state = self.write();
        state.phase = match token {
            Some(token) => {
                let user = match std::mem::replace(&mut state.phase, SessionPhase::Anonymous) {
                    SessionPhase::Authenticated { user, .. } => user,
                    _ => None,
                };
                SessionPhase::Authenticated { access_token: token.to_owned(), user }
            }
            None => SessionPhase::Anonymous,
        };
        Ok(())
    }

    pub(crate) fn set_refresh_token(&self, token: Option<&str>) -> Result<(), StorageError> {
        match token {
            Some(token) => self.storage.set(KEY_REFRESH_TOKEN, StorageValue::text(token))?,
            None => self.storage.remove(KEY_REFRESH_TOKEN)?,
        }
        self.write().refresh_token = token.map(str::to_owned);
        Ok(())
    }

    pub(crate) fn set_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        self.persist_user(user)?;
        self.adopt_user(user.clone());
        Ok(())
    }

    pub(crate) fn set_error(&self, error: Option<String>) {
        self.write().error = error;
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        let mut state = self.write();
        match (&state.phase, loading) {
            (SessionPhase::Anonymous, true) => state.phase = SessionPhase::Authenticating,
            (SessionPhase::Authenticating, false) => state.phase = SessionPhase::Anonymous,
            _ => {}
        }
    }

    /// Cache the principal in memory. Only an authenticated session has a
    /// seat for it; in other phases the stored copy is the cache.
    pub(crate) fn adopt_user(&self, user: UserRecord) {
        let mut state = self.write();
        if let SessionPhase::Authenticated { user: seat, .. } = &mut state.phase {
            *seat = Some(user);
        }
    }

    // -- lifecycle transitions ------------------------------------------------

    /// Enter `Authenticating`, clearing the last error. Returns the prior
    /// phase so a failed login can restore it exactly.
    pub(crate) fn begin_login(&self) -> SessionPhase {
        let mut state = self.write();
        state.error = None;
        std::mem::replace(&mut state.phase, SessionPhase::Authenticating)
    }

    /// Roll back a failed login: prior phase restored, error recorded.
    /// Credentials in storage were never touched.
    pub(crate) fn abort_login(&self, prior: SessionPhase, error: String) {
        let mut state = self.write();
        state.phase = prior;
        state.error = Some(error);
    }

    /// Commit a successful login: persist all three keys, then enter
    /// `Authenticated`.
    pub(crate) fn install_login(&self, data: &LoginData) -> Result<(), StorageError> {
        self.storage.set(KEY_TOKEN, StorageValue::text(&data.access))?;
        self.storage.set(KEY_REFRESH_TOKEN, StorageValue::text(&data.refresh))?;
        self.persist_user(&data.user)?;

        let mut state = self.write();
        state.phase = SessionPhase::Authenticated {
            access_token: data.access.clone(),
            user: Some(data.user.clone()),
        };
        state.refresh_token = Some(data.refresh.clone());
        state.error = None;
        Ok(())
    }

    /// Install a refreshed token pair, keeping any cached principal.
    pub(crate) fn install_tokens(&self, pair: &TokenPair) -> Result<(), StorageError> {
        self.storage.set(KEY_TOKEN, StorageValue::text(&pair.access))?;
        self.storage.set(KEY_REFRESH_TOKEN, StorageValue::text(&pair.refresh))?;

        let mut state = self.write();
        let user = match std::mem::replace(&mut state.phase, SessionPhase::Anonymous) {
            SessionPhase::Authenticated { user, .. } => user,
            _ => None,
        };
        state.phase = SessionPhase::Authenticated { access_token: pair.access.clone(), user };
        state.refresh_token = Some(pair.refresh.clone());
        Ok(())
    }

    /// Local-only session teardown. Never fails; storage traffic is
    /// best-effort.
    pub(crate) fn force_logout(&self) {
        {
            let mut state = self.write();
            state.phase = SessionPhase::Anonymous;
            state.refresh_token = None;
            state.error = None;
        }
        self.remove_best_effort(KEY_USER_DATA);
        self.remove_best_effort(KEY_TOKEN);
        self.remove_best_effort(KEY_REFRESH_TOKEN);
    }

    /// Restore state from storage. No network, no error path: anything
    /// missing or unreadable yields `Anonymous`.
    pub(crate) fn init_from_storage(&self) {
        let token = self.read_text(KEY_TOKEN);
        let refresh_token = self.read_text(KEY_REFRESH_TOKEN);
        let user = self.read_stored_user();

        let mut state = self.write();
        state.refresh_token = refresh_token;
        state.error = None;
        state.phase = match token {
            Some(access_token) => SessionPhase::Authenticated { access_token, user },
            None => SessionPhase::Anonymous,
        };
    }

    /// Stored principal, only when its identity fields are complete.
    pub(crate) fn cached_user(&self) -> Option<UserRecord> {
        self.read_stored_user().filter(UserRecord::is_complete)
    }

    /// Base object for a profile merge: the in-memory principal when
    /// authenticated, else whatever the store has, else null.
    fn merge_base(&self) -> Value {
        if let Some(user) = self.user() {
            return serde_json::to_value(user).unwrap_or(Value::Null);
        }
        match self.storage.get(KEY_USER_DATA) {
            Ok(Some(value)) => value.as_json().cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Public surface of the session subsystem. Cheap to clone; all clones
/// share one credential cell and one request pipeline.
#[derive(Clone)]
pub struct SessionStore {
    client: Arc<ApiClient>,
    cell: Arc<SessionCell>,
}

impl SessionStore {
    /// Bind a store to its request pipeline. The pipeline is a constructed
    /// dependency so tests can substitute the transport underneath it.
    #[must_use]
    pub fn new(client: Arc<ApiClient>) -> Self {
        let cell = Arc::clone(client.session_cell());
        Self { client, cell }
    }

    /// Register the hook fired when the session is forcibly terminated.
    pub fn set_observer(&self, observer: Arc<dyn SessionObserver>) {
        self.client.set_observer(observer);
    }

    // -- observable state -----------------------------------------------------

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.cell.phase()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.cell.is_authenticated()
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.cell.loading()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.cell.access_token()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.cell.refresh_token()
    }

    #[must_use]
    pub fn user(&self) -> Option<UserRecord> {
        self.cell.user()
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.cell.error()
    }

    // -- mutators -------------------------------------------------------------

    /// Set or clear the access token (write-through).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the persisted mirror cannot be written.
    pub fn set_token(&self, token: Option<&str>) -> Result<(), StorageError> {
        self.cell.set_token(token)
    }

    /// Set or clear the refresh token (write-through).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the persisted mirror cannot be written.
    pub fn set_refresh_token(&self, token: Option<&str>) -> Result<(), StorageError> {
        self.cell.set_refresh_token(token)
    }

    /// Replace the cached principal (write-through).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the persisted mirror cannot be written.
    pub fn set_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        self.cell.set_user(user)
    }

    pub fn set_error(&self, error: Option<String>) {
        self.cell.set_error(error);
    }

    pub fn set_loading(&self, loading: bool) {
        self.cell.set_loading(loading);
    }

    // -- lifecycle operations -------------------------------------------------

    /// Restore the session from storage. No network; missing values yield
    /// an anonymous session.
    pub fn init(&self) {
        self.cell.init_from_storage();
    }

    /// Authenticate with username and password.
    ///
    /// On failure the prior credentials are untouched and the failure text
    /// is recorded in [`SessionStore::error`].
    ///
    /// # Errors
    ///
    /// Returns the login failure; credential state is exactly as before.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserRecord, ApiError> {
        let prior = self.cell.begin_login();
        match ops::login(&self.client, username, password).await {
            Ok(data) => {
                if let Err(e) = self.cell.install_login(&data) {
                    let err = ApiError::from(e);
                    self.cell.abort_login(prior, err.to_string());
                    return Err(err);
                }
                tracing::debug!(username, "login succeeded");
                Ok(data.user)
            }
            Err(e) => {
                tracing::warn!(username, error = %e, "login failed");
                self.cell.abort_login(prior, e.to_string());
                Err(e)
            }
        }
    }

    /// Clear the session locally. No network call; never fails.
    pub fn logout(&self) {
        self.cell.force_logout();
        tracing::debug!("session cleared");
    }

    /// Resolve the authenticated principal, storage-first.
    ///
    /// A complete stored record short-circuits the network entirely;
    /// otherwise the profile endpoint is hit and the result persisted.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure after recording it; the cached principal
    /// is left as it was.
    pub async fn fetch_user_data(&self) -> Result<UserRecord, ApiError> {
        if let Some(user) = self.cell.cached_user() {
            self.cell.adopt_user(user.clone());
            return Ok(user);
        }

        match ops::fetch_self(&self.client).await {
            Ok(user) => {
                self.cell.set_user(&user)?;
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "user data fetch failed");
                self.cell.set_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Send only the given fields, merge the server's answer into the
    /// cached principal, persist and return the merge.
    ///
    /// # Errors
    ///
    /// Returns the update failure after recording it.
    pub async fn update_user(&self, patch: &UserPatch) -> Result<UserRecord, ApiError> {
        let body = serde_json::to_value(patch).map_err(|e| ApiError::Parse(e.to_string()))?;
        match ops::update_self(&self.client, &body).await {
            Ok(returned) => {
                let merged_value = merge_user_fields(&self.cell.merge_base(), &returned);
                let merged: UserRecord =
                    serde_json::from_value(merged_value).map_err(|e| ApiError::Parse(e.to_string()))?;
                self.cell.set_user(&merged)?;
                Ok(merged)
            }
            Err(e) => {
                tracing::warn!(error = %e, "user update failed");
                self.cell.set_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Exchange the refresh token for a new pair. Any failure (including a
    /// missing refresh token) ends the session.
    ///
    /// # Errors
    ///
    /// Returns the refresh failure; the session has been logged out.
    pub async fn refresh_access_token(&self) -> Result<String, ApiError> {
        self.client.refresh_access_token().await
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
