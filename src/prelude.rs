//! Convenience re-exports.

pub use crate::config::{AuthConfig, AuthSettings, ProviderCredentials};
pub use crate::error::{AuthError, Result};
pub use crate::poll::LoginStatus;
pub use crate::provider::{
    AuthenticatedUser, FailureReason, HttpIdentityProvider, IdentityProvider, PollOutcome,
    QrChallenge,
};
pub use crate::service::{LoginService, StartedLogin};
pub use crate::store::{
    AttemptOutcome, AttemptState, AttemptStore, AuthAttempt, InMemoryAttemptStore,
};
