//! Error types for QR login.

use thiserror::Error;

use crate::store::AttemptState;

/// Primary error type for all login operations.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Identity provider rejected the request (status {status}): {body}")]
    ProviderRejected { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Login attempt for session {session_id} is already {state}")]
    AlreadyTerminal {
        session_id: String,
        state: AttemptState,
    },

    #[error("No login attempt for session {0}")]
    NotFound(String),

    #[error("Login attempt for session {0} expired")]
    Expired(String),

    #[error("Login attempt for session {0} is still pending")]
    LoginPending(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Attempt {correlation_id} for session {session_id} was superseded")]
    StaleAttempt {
        session_id: String,
        correlation_id: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Provider,
    Protocol,
    Attempt,
    Configuration,
}

impl AuthError {
    /// Create a rejection error from a response status and body.
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::ProviderRejected {
            status,
            body: body.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ProviderUnavailable(_) | Self::ProviderRejected { .. } => {
                ErrorCategory::Provider
            }
            Self::MalformedResponse(_) => ErrorCategory::Protocol,
            Self::AlreadyTerminal { .. }
            | Self::NotFound(_)
            | Self::Expired(_)
            | Self::LoginPending(_)
            | Self::LoginFailed(_)
            | Self::StaleAttempt { .. } => ErrorCategory::Attempt,
            Self::Configuration(_) | Self::Io(_) => ErrorCategory::Configuration,
        }
    }

    /// Whether this failure may clear up on its own if the call is repeated later.
    ///
    /// Polling absorbs transient failures; `initiate` never retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_)
                | Self::ProviderRejected { .. }
                | Self::MalformedResponse(_)
        )
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::ProviderUnavailable(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::MalformedResponse(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Configuration(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AuthError>;
