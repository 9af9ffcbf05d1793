//! Caller-facing login facade.
//!
//! Wires the provider client, the correlation store and the poll orchestrator
//! together. The host web framework maps its routes and sessions onto these
//! methods; this type does no rendering, routing or session persistence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::poll::{spawn_poll, LoginStatus, PollHandle, PollTiming};
use crate::provider::{HttpIdentityProvider, IdentityProvider};
use crate::store::{AttemptOutcome, AttemptStore, AuthAttempt, InMemoryAttemptStore};

/// Returned by [`LoginService::start_login`]; render `qr_payload` for the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedLogin {
    pub qr_payload: String,
    pub correlation_id: String,
}

/// QR login service.
///
/// # Example
/// ```no_run
/// use swift_qr_auth::config::AuthConfig;
/// use swift_qr_auth::service::LoginService;
///
/// # async fn example() -> swift_qr_auth::error::Result<()> {
/// let service = LoginService::http(AuthConfig::from_env()?)?;
/// let started = service.start_login("browser-session-1").await?;
/// println!("scan: {}", started.qr_payload);
/// let status = service.wait_for_outcome("browser-session-1").await?;
/// let user = status.into_user("browser-session-1")?;
/// println!("redirect to {} with {:?}", service.success_redirect(), user.token);
/// # Ok(())
/// # }
/// ```
pub struct LoginService {
    config: AuthConfig,
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn AttemptStore>,
    polls: Mutex<HashMap<String, PollHandle>>,
}

impl LoginService {
    pub fn new(
        config: AuthConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn AttemptStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            provider,
            store,
            polls: Mutex::new(HashMap::new()),
        })
    }

    /// Service backed by the HTTP provider client and an in-memory store.
    pub fn http(config: AuthConfig) -> Result<Self> {
        let provider = Arc::new(HttpIdentityProvider::new(&config)?);
        Self::new(config, provider, Arc::new(InMemoryAttemptStore::new()))
    }

    /// Where the caller should send the browser after a successful login.
    pub fn success_redirect(&self) -> &str {
        &self.config.success_redirect
    }

    /// Request a QR challenge and start polling for it.
    ///
    /// Provider failures are returned as-is and leave no attempt behind. Any
    /// attempt already running for the session is superseded.
    pub async fn start_login(&self, session_id: &str) -> Result<StartedLogin> {
        let challenge = self
            .provider
            .initiate(&self.config.client_id, &self.config.callback_url)
            .await
            .map_err(|err| {
                tracing::warn!(session_id, error = %err, "QR challenge request failed");
                err
            })?;

        let previous = {
            let mut polls = self.lock_polls();
            polls.retain(|_, handle| !handle.is_settled());
            let attempt = self.store.begin(session_id, &challenge.correlation_id);
            let handle = spawn_poll(
                self.provider.clone(),
                self.store.clone(),
                &attempt,
                PollTiming::from(&self.config),
            );
            polls.insert(session_id.to_string(), handle)
        };
        if let Some(mut previous) = previous {
            previous.cancel();
        }

        tracing::info!(
            session_id,
            correlation_id = %challenge.correlation_id,
            "login attempt started"
        );
        Ok(StartedLogin {
            qr_payload: challenge.qr_payload,
            correlation_id: challenge.correlation_id,
        })
    }

    /// Current status of the session's attempt.
    ///
    /// Transient provider errors never surface here; the attempt reads as
    /// `Pending` until it reaches a terminal state.
    pub fn get_login_status(&self, session_id: &str) -> Result<LoginStatus> {
        let attempt = self.store.get(session_id)?;
        if attempt.is_terminal() {
            self.release_settled(session_id);
            return Ok(LoginStatus::from_attempt(&attempt));
        }
        if !self.lifetime_elapsed(&attempt) {
            return Ok(LoginStatus::Pending);
        }

        // The poll task should have expired it already; settle it here.
        let settled = match self.store.complete_attempt(
            session_id,
            &attempt.correlation_id,
            AttemptOutcome::Expired,
        ) {
            Ok(settled) => settled,
            Err(AuthError::AlreadyTerminal { .. } | AuthError::StaleAttempt { .. }) => {
                self.store.get(session_id)?
            }
            Err(err) => return Err(err),
        };
        if let Some(handle) = self.lock_polls().get_mut(session_id) {
            if handle.correlation_id() == settled.correlation_id {
                handle.cancel();
            }
        }
        Ok(LoginStatus::from_attempt(&settled))
    }

    /// The session's attempt record.
    pub fn attempt(&self, session_id: &str) -> Result<AuthAttempt> {
        self.store.get(session_id)
    }

    /// Receiver that changes once the session's current attempt finishes.
    ///
    /// Without a running poll task the receiver holds the stored status and
    /// never changes.
    pub fn subscribe(&self, session_id: &str) -> Result<watch::Receiver<LoginStatus>> {
        if let Some(handle) = self.lock_polls().get(session_id) {
            return Ok(handle.subscribe());
        }
        let (_, rx) = watch::channel(self.get_login_status(session_id)?);
        Ok(rx)
    }

    /// Wait until the session's current attempt reaches a terminal status.
    pub async fn wait_for_outcome(&self, session_id: &str) -> Result<LoginStatus> {
        let mut rx = self.subscribe(session_id)?;
        loop {
            let status = rx.borrow_and_update().clone();
            if status.is_terminal() {
                self.release_settled(session_id);
                return Ok(status);
            }
            if rx.changed().await.is_err() {
                // Task went away without publishing; trust the store.
                return self.get_login_status(session_id);
            }
        }
    }

    /// Stop polling for the session; the attempt finishes as expired.
    pub fn cancel(&self, session_id: &str) -> bool {
        self.lock_polls()
            .get_mut(session_id)
            .map(PollHandle::cancel)
            .unwrap_or(false)
    }

    /// Stop polling and drop the session's attempt (the caller consumed it).
    pub fn forget(&self, session_id: &str) -> Option<AuthAttempt> {
        drop(self.lock_polls().remove(session_id));
        self.store.forget(session_id)
    }

    /// Sessions whose poll task is still running; settled handles are released.
    pub fn active_logins(&self) -> usize {
        let mut polls = self.lock_polls();
        polls.retain(|_, handle| !handle.is_settled());
        polls.len()
    }

    fn release_settled(&self, session_id: &str) {
        let mut polls = self.lock_polls();
        if polls.get(session_id).is_some_and(PollHandle::is_settled) {
            polls.remove(session_id);
        }
    }

    /// Past the lifetime plus the answer window of a check due on the deadline.
    fn lifetime_elapsed(&self, attempt: &AuthAttempt) -> bool {
        chrono::Duration::from_std(self.config.attempt_lifetime + self.config.poll_interval)
            .map(|lifetime| Utc::now() - attempt.created_at >= lifetime)
            .unwrap_or(false)
    }

    fn lock_polls(&self) -> MutexGuard<'_, HashMap<String, PollHandle>> {
        self.polls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
