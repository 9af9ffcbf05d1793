//! Identity-provider client: QR challenge issuance and status checks.

pub mod http;

pub use http::HttpIdentityProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AuthError;

/// One-time QR challenge returned by [`IdentityProvider::initiate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrChallenge {
    /// Payload to render as a QR code.
    pub qr_payload: String,
    /// Provider-issued token linking the QR code to this login attempt.
    pub correlation_id: String,
}

/// User data reported by the provider once the mobile device approved the login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Token handed back by the provider, if it sent one.
    pub token: Option<String>,
    /// Every other field of the success payload.
    pub profile: serde_json::Map<String, serde_json::Value>,
}

/// Why a status check did not report success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider rejected status check (status {status})")]
    Rejected { status: u16, body: String },
    #[error("malformed status response: {0}")]
    Malformed(String),
    /// Final failure reported by the provider itself.
    #[error("{0}")]
    Denied(String),
}

impl FailureReason {
    /// Transport and payload problems are retried on the next tick.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Denied(_))
    }
}

impl From<AuthError> for FailureReason {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::ProviderUnavailable(msg) => Self::Unavailable(msg),
            AuthError::ProviderRejected { status, body } => Self::Rejected { status, body },
            AuthError::MalformedResponse(msg) => Self::Malformed(msg),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Result of a single status check.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Pending,
    Authenticated(AuthenticatedUser),
    Failed(FailureReason),
}

/// Remote identity provider contract.
///
/// `check_status` never returns an error: every failure is folded into
/// [`PollOutcome::Failed`] so callers handle one type mid-poll.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn initiate(&self, client_id: &str, callback_url: &str)
        -> Result<QrChallenge, AuthError>;

    async fn check_status(&self, correlation_id: &str) -> PollOutcome;
}
