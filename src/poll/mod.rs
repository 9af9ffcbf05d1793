//! Poll orchestration: a driven state machine per login attempt plus the
//! tokio task that advances it.

pub mod driver;
pub mod machine;

pub use driver::{spawn_poll, PollHandle, PollTiming};
pub use machine::{PollAction, PollMachine, PollPhase};

use crate::error::AuthError;
use crate::provider::AuthenticatedUser;
use crate::store::{AttemptOutcome, AttemptState, AuthAttempt};

/// Caller-visible status of a session's login attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginStatus {
    Pending,
    Authenticated(AuthenticatedUser),
    Failed(String),
    Expired,
}

impl LoginStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn from_attempt(attempt: &AuthAttempt) -> Self {
        match &attempt.outcome {
            Some(outcome) => outcome.clone().into(),
            // A terminal state always carries its outcome; this only guards
            // against a store that records the state alone.
            None if attempt.state == AttemptState::Expired => Self::Expired,
            None => Self::Pending,
        }
    }

    /// Resolve a terminal status into the authenticated user.
    pub fn into_user(self, session_id: &str) -> Result<AuthenticatedUser, AuthError> {
        match self {
            Self::Authenticated(user) => Ok(user),
            Self::Failed(reason) => Err(AuthError::LoginFailed(reason)),
            Self::Expired => Err(AuthError::Expired(session_id.to_string())),
            Self::Pending => Err(AuthError::LoginPending(session_id.to_string())),
        }
    }
}

impl From<AttemptOutcome> for LoginStatus {
    fn from(outcome: AttemptOutcome) -> Self {
        match outcome {
            AttemptOutcome::Succeeded(user) => Self::Authenticated(user),
            AttemptOutcome::Failed(reason) => Self::Failed(reason),
            AttemptOutcome::Expired => Self::Expired,
        }
    }
}
