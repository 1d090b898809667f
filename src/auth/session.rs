//! Session state machine.
//!
//! `SessionManager` owns the three-way authentication verdict and is the only
//! writer of it (together with the 401 interceptor in the API client, which
//! shares the same `StateCell`). The UI reads the state and the pending auth
//! error through watch channels and never handles auth errors itself:
//! `bootstrap`/`revalidate` absorb failures into state transitions, and
//! `login`/`register` absorb them into the pending error message.
//!
//! Transitions carry an epoch so that a forced sign-out (a 401 on any
//! in-flight request, a logout, or a server-negative revalidation) can never
//! be clobbered by a slower operation resolving to `Authenticated` afterwards.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::api::ApiClient;
use crate::auth::credentials::CredentialStore;
use crate::config::Config;
use crate::models::User;
use crate::retry::{retry, DEFAULT_ATTEMPTS};

/// Fallback when the server rejected the attempt without a usable message
const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please try again.";

/// Fallback for registration rejections without a usable message
const REGISTRATION_FAILED_MESSAGE: &str = "Registration failed. Please try again.";

/// Fallback when no response arrived at all
const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error. Please try again.";

/// The user-facing authentication verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initial state, no verdict yet. Entered only at process start.
    Loading,
    Authenticated,
    Unauthenticated,
}

/// Shared state cell behind the session manager and the 401 interceptor.
///
/// The epoch counts forced sign-outs. An operation that wants to end in
/// `Authenticated` captures the epoch when it starts and applies the
/// transition only if no forced sign-out happened in between.
#[derive(Debug)]
pub(crate) struct StateCell {
    state: watch::Sender<SessionState>,
    error: watch::Sender<Option<String>>,
    epoch: AtomicU64,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            state: watch::channel(SessionState::Loading).0,
            error: watch::channel(None).0,
            epoch: AtomicU64::new(0),
        }
    }

    pub(crate) fn snapshot(&self) -> SessionState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub(crate) fn error_snapshot(&self) -> Option<String> {
        self.error.borrow().clone()
    }

    pub(crate) fn subscribe_error(&self) -> watch::Receiver<Option<String>> {
        self.error.subscribe()
    }

    /// Epoch to capture at the start of an operation that may end in
    /// `Authenticated`.
    pub(crate) fn begin(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Complete a transition to `Authenticated`, unless a forced sign-out
    /// happened since `epoch` was captured. Returns whether it applied.
    pub(crate) fn authenticate_if_current(&self, epoch: u64) -> bool {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("stale authenticated transition dropped");
            return false;
        }
        self.transition(SessionState::Authenticated);
        true
    }

    /// Fail-closed transition for an operation's own failure path.
    pub(crate) fn set_unauthenticated(&self) {
        self.transition(SessionState::Unauthenticated);
    }

    /// Forced sign-out: bumps the epoch so in-flight operations cannot
    /// resurrect `Authenticated`. Used by the 401 interceptor, logout, and a
    /// server-negative revalidation.
    pub(crate) fn force_unauthenticated(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.transition(SessionState::Unauthenticated);
    }

    pub(crate) fn set_error(&self, message: String) {
        self.error.send_replace(Some(message));
    }

    pub(crate) fn clear_error(&self) {
        self.error.send_replace(None);
    }

    fn transition(&self, next: SessionState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(from = ?*state, to = ?next, "session state transition");
            *state = next;
            true
        });
    }
}

pub struct SessionManager {
    client: ApiClient,
    store: Arc<CredentialStore>,
    state: Arc<StateCell>,
    bootstrapped: AtomicBool,
}

impl SessionManager {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let store = Arc::new(CredentialStore::open(config.store_dir.clone()));
        Ok(Self::with_store(config.api_url.clone(), store)?)
    }

    /// Build against an explicit store, mainly for tests and custom setups.
    pub fn with_store(
        api_url: String,
        store: Arc<CredentialStore>,
    ) -> Result<Self, crate::api::ApiError> {
        let state = Arc::new(StateCell::new());
        let client = ApiClient::new(api_url, store.clone(), state.clone())?;
        Ok(Self {
            client,
            store,
            state,
            bootstrapped: AtomicBool::new(false),
        })
    }

    /// The shared API client; the CRUD screens issue their calls through it.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn state(&self) -> SessionState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The message attached to the most recent failed login/registration
    /// attempt, if any.
    pub fn pending_error(&self) -> Option<String> {
        self.state.error_snapshot()
    }

    pub fn subscribe_error(&self) -> watch::Receiver<Option<String>> {
        self.state.subscribe_error()
    }

    /// Resolve the initial verdict. Runs exactly once per process; later
    /// calls are no-ops.
    ///
    /// A stored token is trusted without an upfront probe - server-side
    /// invalidation is caught lazily by the 401 interceptor on the next real
    /// call. With no token, a retried `GET /me` probe decides, failing
    /// closed.
    pub async fn bootstrap(&self) {
        if self.bootstrapped.swap(true, Ordering::SeqCst) {
            debug!("bootstrap already ran, ignoring");
            return;
        }

        let epoch = self.state.begin();
        let stored = match self.store.access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "credential read failed at bootstrap, treating as absent");
                None
            }
        };

        if stored.is_some() {
            self.state.authenticate_if_current(epoch);
            return;
        }

        match retry(DEFAULT_ATTEMPTS, || self.client.me()).await {
            Ok(()) => {
                self.state.authenticate_if_current(epoch);
            }
            Err(e) => {
                debug!(error = %e, "session probe failed, starting unauthenticated");
                self.state.set_unauthenticated();
            }
        }
    }

    /// Exchange credentials for a token. Never fails toward the caller:
    /// the outcome is observable through the session state and the pending
    /// auth error only.
    pub async fn login(&self, email: &str, password: &str) {
        self.state.clear_error();
        let epoch = self.state.begin();

        match retry(DEFAULT_ATTEMPTS, || self.client.login(email, password)).await {
            Ok(resp) => {
                // The state flips only once the credential is durably stored.
                if let Err(e) = self.store.set_access_token(&resp.access_token).await {
                    error!(error = %e, "failed to persist credential");
                    self.state.set_error(UNKNOWN_ERROR_MESSAGE.to_string());
                    self.state.set_unauthenticated();
                    return;
                }
                if !self.state.authenticate_if_current(epoch) {
                    // A forced sign-out won the race; the token this login
                    // persisted must not outlive it.
                    if let Err(e) = self.store.clear_access_token().await {
                        warn!(error = %e, "failed to discard credential of stale login");
                    }
                }
            }
            Err(e) => {
                self.state.set_error(auth_error_message(&e, LOGIN_FAILED_MESSAGE));
                self.state.set_unauthenticated();
            }
        }
    }

    /// Create an account. Failures land in the pending auth error; a created
    /// account does not authenticate by itself.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Option<User> {
        self.state.clear_error();
        match self.client.register(name, email, password).await {
            Ok(user) => Some(user),
            Err(e) => {
                self.state
                    .set_error(auth_error_message(&e, REGISTRATION_FAILED_MESSAGE));
                None
            }
        }
    }

    /// Drop the credential and sign out. Storage failures are logged, never
    /// surfaced.
    pub async fn logout(&self) {
        if let Err(e) = self.store.clear_access_token().await {
            warn!(error = %e, "failed to clear stored credential on logout");
        }
        self.state.force_unauthenticated();
    }

    /// Re-confirm validity against `GET /auth/status`. A definitive negative
    /// verdict drops the credential; a transport failure fails closed but
    /// keeps the token so a flaky network does not force a re-login after
    /// restart.
    pub async fn revalidate(&self) {
        let epoch = self.state.begin();
        match self.client.auth_status().await {
            Ok(true) => {
                self.state.authenticate_if_current(epoch);
            }
            Ok(false) => {
                if let Err(e) = self.store.clear_access_token().await {
                    warn!(error = %e, "failed to clear invalidated credential");
                }
                self.state.force_unauthenticated();
            }
            Err(e) => {
                debug!(error = %e, "revalidation failed, failing closed");
                self.state.set_unauthenticated();
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn state_cell(&self) -> &Arc<StateCell> {
        &self.state
    }
}

/// Prefer the server's own message; distinguish "no response at all" from
/// "rejected without a message".
fn auth_error_message(err: &crate::api::ApiError, fallback: &str) -> String {
    match err.server_message() {
        Some(m) => m.to_string(),
        None if err.is_transient() => UNKNOWN_ERROR_MESSAGE.to_string(),
        None => fallback.to_string(),
    }
}
