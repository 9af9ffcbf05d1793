#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use swift_qr_auth::config::AuthConfig;
use swift_qr_auth::error::AuthError;
use swift_qr_auth::provider::{AuthenticatedUser, IdentityProvider, PollOutcome, QrChallenge};
use swift_qr_auth::service::LoginService;
use swift_qr_auth::store::{AttemptOutcome, AttemptStore, AuthAttempt, InMemoryAttemptStore};

pub const INTERVAL: Duration = Duration::from_secs(5);

pub fn config(lifetime: Duration) -> AuthConfig {
    AuthConfig::builder()
        .client_id("test-client")
        .client_secret("test-secret")
        .callback_url("https://app.test/swift-auth/callback")
        .auth_url("https://id.test/auth")
        .polling_url("https://id.test/poll")
        .poll_interval(INTERVAL)
        .attempt_lifetime(lifetime)
        .build()
}

pub fn challenge(qr: &str, id: &str) -> QrChallenge {
    QrChallenge {
        qr_payload: qr.to_string(),
        correlation_id: id.to_string(),
    }
}

pub fn user(token: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        token: Some(token.to_string()),
        profile: Default::default(),
    }
}

/// Provider stub answering from scripts and recording every status check.
///
/// Status scripts are per correlation id; an exhausted script answers `Pending`.
#[derive(Default)]
pub struct ScriptedProvider {
    challenges: Mutex<VecDeque<Result<QrChallenge, AuthError>>>,
    statuses: Mutex<HashMap<String, VecDeque<PollOutcome>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<HashMap<String, u32>>,
    in_flight: Mutex<HashSet<String>>,
    overlaps: AtomicU32,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_challenge(&self, result: Result<QrChallenge, AuthError>) -> &Self {
        self.challenges
            .lock()
            .expect("challenges lock poisoned")
            .push_back(result);
        self
    }

    pub fn script(&self, correlation_id: &str, outcomes: Vec<PollOutcome>) -> &Self {
        self.statuses
            .lock()
            .expect("statuses lock poisoned")
            .insert(correlation_id.to_string(), outcomes.into());
        self
    }

    /// Make every status check for `correlation_id` take `delay`.
    pub fn delay(&self, correlation_id: &str, delay: Duration) -> &Self {
        self.delays
            .lock()
            .expect("delays lock poisoned")
            .insert(correlation_id.to_string(), delay);
        self
    }

    pub fn calls(&self, correlation_id: &str) -> u32 {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .get(correlation_id)
            .copied()
            .unwrap_or(0)
    }

    /// Status checks that started while another for the same id was in flight.
    pub fn overlaps(&self) -> u32 {
        self.overlaps.load(Ordering::SeqCst)
    }
}

struct InFlight<'a> {
    provider: &'a ScriptedProvider,
    correlation_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.provider
            .in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .remove(&self.correlation_id);
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    async fn initiate(
        &self,
        _client_id: &str,
        _callback_url: &str,
    ) -> Result<QrChallenge, AuthError> {
        self.challenges
            .lock()
            .expect("challenges lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::ProviderUnavailable("no scripted challenge".into())))
    }

    async fn check_status(&self, correlation_id: &str) -> PollOutcome {
        let fresh = self
            .in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .insert(correlation_id.to_string());
        if !fresh {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let _guard = InFlight {
            provider: self,
            correlation_id: correlation_id.to_string(),
        };
        *self
            .calls
            .lock()
            .expect("calls lock poisoned")
            .entry(correlation_id.to_string())
            .or_default() += 1;

        let delay = self
            .delays
            .lock()
            .expect("delays lock poisoned")
            .get(correlation_id)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.statuses
            .lock()
            .expect("statuses lock poisoned")
            .get_mut(correlation_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(PollOutcome::Pending)
    }
}

/// In-memory store whose reads report attempts as created `age` earlier.
pub struct BackdatedStore {
    inner: InMemoryAttemptStore,
    age: Mutex<chrono::Duration>,
}

impl BackdatedStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryAttemptStore::new(),
            age: Mutex::new(chrono::Duration::zero()),
        }
    }

    pub fn set_age(&self, age: Duration) {
        *self.age.lock().expect("age lock poisoned") =
            chrono::Duration::from_std(age).expect("age fits chrono");
    }

    fn backdate(&self, mut attempt: AuthAttempt) -> AuthAttempt {
        let age = *self.age.lock().expect("age lock poisoned");
        attempt.created_at = attempt.created_at - age;
        attempt
    }
}

impl AttemptStore for BackdatedStore {
    fn begin(&self, session_id: &str, correlation_id: &str) -> AuthAttempt {
        self.inner.begin(session_id, correlation_id)
    }

    fn get(&self, session_id: &str) -> Result<AuthAttempt, AuthError> {
        self.inner.get(session_id).map(|attempt| self.backdate(attempt))
    }

    fn complete(&self, session_id: &str, outcome: AttemptOutcome) -> Result<AuthAttempt, AuthError> {
        self.inner.complete(session_id, outcome)
    }

    fn complete_attempt(
        &self,
        session_id: &str,
        correlation_id: &str,
        outcome: AttemptOutcome,
    ) -> Result<AuthAttempt, AuthError> {
        self.inner.complete_attempt(session_id, correlation_id, outcome)
    }

    fn forget(&self, session_id: &str) -> Option<AuthAttempt> {
        self.inner.forget(session_id)
    }
}

pub fn service_with_store(
    provider: Arc<ScriptedProvider>,
    store: Arc<dyn AttemptStore>,
    lifetime: Duration,
) -> LoginService {
    LoginService::new(config(lifetime), provider, store).expect("valid test config")
}

pub fn service(provider: Arc<ScriptedProvider>, lifetime: Duration) -> LoginService {
    service_with_store(provider, Arc::new(InMemoryAttemptStore::new()), lifetime)
}
