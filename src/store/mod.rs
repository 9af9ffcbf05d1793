//! Correlation store: one login attempt per browser session.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use strum::{Display, EnumString};

use crate::error::{AuthError, Result};
use crate::provider::AuthenticatedUser;

/// Lifecycle state of an [`AuthAttempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AttemptState {
    Pending,
    Succeeded,
    Failed,
    Expired,
}

impl AttemptState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Terminal result recorded on an attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Succeeded(AuthenticatedUser),
    Failed(String),
    Expired,
}

impl AttemptOutcome {
    pub fn state(&self) -> AttemptState {
        match self {
            Self::Succeeded(_) => AttemptState::Succeeded,
            Self::Failed(_) => AttemptState::Failed,
            Self::Expired => AttemptState::Expired,
        }
    }
}

/// A single QR login attempt, keyed by browser session.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthAttempt {
    pub correlation_id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub state: AttemptState,
    pub outcome: Option<AttemptOutcome>,
}

impl AuthAttempt {
    fn pending(session_id: &str, correlation_id: &str) -> Self {
        Self {
            correlation_id: correlation_id.to_string(),
            session_id: session_id.to_string(),
            created_at: Utc::now(),
            state: AttemptState::Pending,
            outcome: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to a terminal state. Repeating the recorded outcome is a no-op.
    fn transition(&mut self, outcome: AttemptOutcome) -> Result<()> {
        if self.state.is_terminal() {
            if self.outcome.as_ref() == Some(&outcome) {
                return Ok(());
            }
            return Err(AuthError::AlreadyTerminal {
                session_id: self.session_id.clone(),
                state: self.state,
            });
        }
        self.state = outcome.state();
        self.outcome = Some(outcome);
        Ok(())
    }
}

/// Storage abstraction for in-flight login attempts.
///
/// Every method is atomic per session: implementations must not let two
/// transitions for the same session interleave.
pub trait AttemptStore: Send + Sync {
    /// Start a new Pending attempt, replacing whatever the session had.
    fn begin(&self, session_id: &str, correlation_id: &str) -> AuthAttempt;

    fn get(&self, session_id: &str) -> Result<AuthAttempt>;

    /// Record a terminal outcome for the session's current attempt.
    fn complete(&self, session_id: &str, outcome: AttemptOutcome) -> Result<AuthAttempt>;

    /// Like [`AttemptStore::complete`], but only if the current attempt still
    /// carries `correlation_id`.
    fn complete_attempt(
        &self,
        session_id: &str,
        correlation_id: &str,
        outcome: AttemptOutcome,
    ) -> Result<AuthAttempt>;

    /// Drop the session's attempt.
    fn forget(&self, session_id: &str) -> Option<AuthAttempt>;
}

/// Process-local attempt store backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct InMemoryAttemptStore {
    attempts: Mutex<HashMap<String, AuthAttempt>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with a recorded attempt.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, AuthAttempt>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(
        &self,
        session_id: &str,
        correlation_id: Option<&str>,
        outcome: AttemptOutcome,
    ) -> Result<AuthAttempt> {
        let mut attempts = self.lock();
        let attempt = attempts
            .get_mut(session_id)
            .ok_or_else(|| AuthError::NotFound(session_id.to_string()))?;
        if let Some(correlation_id) = correlation_id {
            if attempt.correlation_id != correlation_id {
                return Err(AuthError::StaleAttempt {
                    session_id: session_id.to_string(),
                    correlation_id: correlation_id.to_string(),
                });
            }
        }
        attempt.transition(outcome)?;
        Ok(attempt.clone())
    }
}

impl AttemptStore for InMemoryAttemptStore {
    fn begin(&self, session_id: &str, correlation_id: &str) -> AuthAttempt {
        let attempt = AuthAttempt::pending(session_id, correlation_id);
        let previous = self
            .lock()
            .insert(session_id.to_string(), attempt.clone());
        if let Some(previous) = previous.filter(|p| !p.is_terminal()) {
            tracing::debug!(
                session_id,
                superseded = %previous.correlation_id,
                correlation_id,
                "pending attempt superseded"
            );
        }
        attempt
    }

    fn get(&self, session_id: &str) -> Result<AuthAttempt> {
        self.lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| AuthError::NotFound(session_id.to_string()))
    }

    fn complete(&self, session_id: &str, outcome: AttemptOutcome) -> Result<AuthAttempt> {
        self.update(session_id, None, outcome)
    }

    fn complete_attempt(
        &self,
        session_id: &str,
        correlation_id: &str,
        outcome: AttemptOutcome,
    ) -> Result<AuthAttempt> {
        self.update(session_id, Some(correlation_id), outcome)
    }

    fn forget(&self, session_id: &str) -> Option<AuthAttempt> {
        self.lock().remove(session_id)
    }
}
