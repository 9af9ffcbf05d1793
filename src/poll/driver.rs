//! Tokio scheduler for [`PollMachine`]: one lightweight task per attempt.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};

use super::machine::{PollAction, PollMachine};
use super::LoginStatus;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::provider::{FailureReason, IdentityProvider, PollOutcome};
use crate::store::{AttemptOutcome, AttemptStore, AuthAttempt};

/// Poll cadence and lifetime bound for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    pub interval: Duration,
    pub lifetime: Duration,
}

impl From<&AuthConfig> for PollTiming {
    fn from(config: &AuthConfig) -> Self {
        Self {
            interval: config.poll_interval,
            lifetime: config.attempt_lifetime,
        }
    }
}

/// Handle for an attempt's poll task.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct PollHandle {
    correlation_id: String,
    cancel_tx: Option<oneshot::Sender<()>>,
    status_rx: watch::Receiver<LoginStatus>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Ask the task to stop; the attempt finishes as expired.
    ///
    /// Returns `false` if the signal was already sent or the task has exited.
    pub fn cancel(&mut self) -> bool {
        if let Some(tx) = self.cancel_tx.take() {
            return tx.send(()).is_ok();
        }
        false
    }

    /// Receiver that yields the terminal [`LoginStatus`] once the attempt finishes.
    pub fn subscribe(&self) -> watch::Receiver<LoginStatus> {
        self.status_rx.clone()
    }

    /// The task published its terminal status or exited; the handle can go.
    pub fn is_settled(&self) -> bool {
        self.task.is_finished() || self.status_rx.borrow().is_terminal()
    }
}

/// Spawn the poll task for a freshly begun attempt.
pub fn spawn_poll<P>(
    provider: Arc<P>,
    store: Arc<dyn AttemptStore>,
    attempt: &AuthAttempt,
    timing: PollTiming,
) -> PollHandle
where
    P: IdentityProvider + ?Sized + 'static,
{
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let (status_tx, status_rx) = watch::channel(LoginStatus::Pending);
    let task = PollTask {
        provider,
        store,
        session_id: attempt.session_id.clone(),
        correlation_id: attempt.correlation_id.clone(),
        timing,
    };
    let task = tokio::spawn(task.run(cancel_rx, status_tx));
    PollHandle {
        correlation_id: attempt.correlation_id.clone(),
        cancel_tx: Some(cancel_tx),
        status_rx,
        task,
    }
}

struct PollTask<P: ?Sized> {
    provider: Arc<P>,
    store: Arc<dyn AttemptStore>,
    session_id: String,
    correlation_id: String,
    timing: PollTiming,
}

impl<P> PollTask<P>
where
    P: IdentityProvider + ?Sized + 'static,
{
    async fn run(
        self,
        mut cancel_rx: oneshot::Receiver<()>,
        status_tx: watch::Sender<LoginStatus>,
    ) {
        let started = Instant::now();
        let mut machine = PollMachine::new(started, self.timing.interval, self.timing.lifetime);
        let mut action = machine.start(started);

        // A closed cancel channel (handle dropped) counts as cancellation.
        let outcome = loop {
            action = match action {
                PollAction::Wait { until } => {
                    tokio::select! {
                        biased;
                        _ = &mut cancel_rx => machine.supersede(),
                        _ = time::sleep_until(until) => machine.on_timer(Instant::now()),
                    }
                }
                PollAction::CheckStatus => {
                    let check_deadline = machine.check_deadline();
                    tokio::select! {
                        biased;
                        _ = &mut cancel_rx => machine.supersede(),
                        _ = time::sleep_until(check_deadline) => machine.on_timer(Instant::now()),
                        outcome = self.provider.check_status(&self.correlation_id) => {
                            self.log_response(&outcome, machine.polls());
                            machine.on_response(outcome, Instant::now())
                        }
                    }
                }
                // The in-flight check was dropped by the select above; count
                // it as a transient failure.
                PollAction::AwaitResponse => machine.on_response(
                    PollOutcome::Failed(FailureReason::Unavailable(
                        "status check abandoned".to_string(),
                    )),
                    Instant::now(),
                ),
                PollAction::Finish(outcome) => break outcome,
                PollAction::Done => return,
            };
        };

        let status = self.record(outcome, machine.polls());
        let _ = status_tx.send(status);
    }

    fn log_response(&self, outcome: &PollOutcome, polls: u32) {
        match outcome {
            PollOutcome::Failed(reason) if reason.is_transient() => tracing::warn!(
                session_id = %self.session_id,
                correlation_id = %self.correlation_id,
                polls,
                error = %reason,
                "status check failed, retrying on next tick"
            ),
            _ => tracing::debug!(
                session_id = %self.session_id,
                correlation_id = %self.correlation_id,
                polls,
                ?outcome,
                "status check answered"
            ),
        }
    }

    /// Write the terminal outcome, guarded by correlation id, and return the
    /// status subscribers should see.
    fn record(&self, outcome: AttemptOutcome, polls: u32) -> LoginStatus {
        let fallback = LoginStatus::from(outcome.clone());
        match self
            .store
            .complete_attempt(&self.session_id, &self.correlation_id, outcome)
        {
            Ok(attempt) => {
                tracing::info!(
                    session_id = %self.session_id,
                    correlation_id = %self.correlation_id,
                    state = %attempt.state,
                    polls,
                    "login attempt finished"
                );
                LoginStatus::from_attempt(&attempt)
            }
            Err(AuthError::AlreadyTerminal { state, .. }) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    correlation_id = %self.correlation_id,
                    %state,
                    "attempt was already settled"
                );
                self.store
                    .get(&self.session_id)
                    .map(|attempt| LoginStatus::from_attempt(&attempt))
                    .unwrap_or(fallback)
            }
            Err(err) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    correlation_id = %self.correlation_id,
                    error = %err,
                    "discarding result of replaced attempt"
                );
                fallback
            }
        }
    }
}
