//! Per-attempt polling state machine.
//!
//! The machine performs no I/O and reads no clock: the driver feeds it timer
//! and response events with the current instant and executes the returned
//! [`PollAction`].
//!
//! Checks run every `interval` from the start. A check due exactly on the
//! deadline still runs and gets one extra interval to answer; once the next
//! check would fall past the deadline, the attempt expires at the deadline.

use tokio::time::{Duration, Instant};

use crate::provider::PollOutcome;
use crate::store::AttemptOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Created, no status check issued yet.
    Init,
    /// Waiting for the next status check.
    Waiting { until: Instant },
    /// No further check fits in the lifetime; expires at the deadline.
    Expiring,
    /// A status check is in flight.
    Checking,
    Succeeded,
    Failed,
    Expired,
}

impl PollPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Expired)
    }
}

/// What the driver must do next.
#[derive(Debug, Clone, PartialEq)]
pub enum PollAction {
    /// Sleep until `until`, then report a timer event.
    Wait { until: Instant },
    /// Issue one status check and report its outcome, or a timer event at
    /// [`PollMachine::check_deadline`].
    CheckStatus,
    /// A check is already in flight; keep awaiting it.
    AwaitResponse,
    /// The attempt reached a terminal state.
    Finish(AttemptOutcome),
    /// The attempt already finished; the event was ignored.
    Done,
}

#[derive(Debug, Clone)]
pub struct PollMachine {
    interval: Duration,
    deadline: Instant,
    check_deadline: Instant,
    phase: PollPhase,
    polls: u32,
}

impl PollMachine {
    pub fn new(started_at: Instant, interval: Duration, lifetime: Duration) -> Self {
        let deadline = started_at + lifetime;
        Self {
            interval,
            deadline,
            check_deadline: deadline,
            phase: PollPhase::Init,
            polls: 0,
        }
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// When the in-flight check is abandoned: the deadline, or one interval
    /// past it for the check issued on the deadline.
    pub fn check_deadline(&self) -> Instant {
        self.check_deadline
    }

    /// Status checks issued so far.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Leave `Init`; the first check happens one interval later, giving the
    /// user time to scan the code.
    pub fn start(&mut self, now: Instant) -> PollAction {
        match self.phase {
            PollPhase::Init => self.schedule(now),
            phase if phase.is_terminal() => PollAction::Done,
            _ => self.pending_action(),
        }
    }

    /// A timer fired at `now`.
    pub fn on_timer(&mut self, now: Instant) -> PollAction {
        match self.phase {
            phase if phase.is_terminal() => PollAction::Done,
            PollPhase::Init if now >= self.deadline => self.finish(AttemptOutcome::Expired),
            PollPhase::Init => self.schedule(now),
            PollPhase::Waiting { until } if now >= until => {
                self.check_deadline = if until >= self.deadline {
                    self.deadline + self.interval
                } else {
                    self.deadline
                };
                self.phase = PollPhase::Checking;
                self.polls += 1;
                PollAction::CheckStatus
            }
            PollPhase::Expiring | PollPhase::Checking if now >= self.check_deadline => {
                self.finish(AttemptOutcome::Expired)
            }
            _ => self.pending_action(),
        }
    }

    /// The in-flight status check returned `outcome` at `now`.
    pub fn on_response(&mut self, outcome: PollOutcome, now: Instant) -> PollAction {
        if self.phase != PollPhase::Checking {
            return if self.phase.is_terminal() {
                PollAction::Done
            } else {
                self.pending_action()
            };
        }
        match outcome {
            PollOutcome::Authenticated(user) => self.finish(AttemptOutcome::Succeeded(user)),
            PollOutcome::Failed(reason) if !reason.is_transient() => {
                self.finish(AttemptOutcome::Failed(reason.to_string()))
            }
            PollOutcome::Pending | PollOutcome::Failed(_) => {
                if now >= self.deadline {
                    self.finish(AttemptOutcome::Expired)
                } else {
                    self.schedule(now)
                }
            }
        }
    }

    /// A newer attempt replaced this one, or the caller cancelled it.
    pub fn supersede(&mut self) -> PollAction {
        if self.phase.is_terminal() {
            return PollAction::Done;
        }
        self.finish(AttemptOutcome::Expired)
    }

    fn schedule(&mut self, now: Instant) -> PollAction {
        let next = now + self.interval;
        if next <= self.deadline {
            self.phase = PollPhase::Waiting { until: next };
        } else {
            self.phase = PollPhase::Expiring;
            self.check_deadline = self.deadline;
        }
        self.pending_action()
    }

    fn pending_action(&self) -> PollAction {
        match self.phase {
            PollPhase::Waiting { until } => PollAction::Wait { until },
            PollPhase::Expiring => PollAction::Wait {
                until: self.deadline,
            },
            PollPhase::Checking => PollAction::AwaitResponse,
            _ => PollAction::Done,
        }
    }

    fn finish(&mut self, outcome: AttemptOutcome) -> PollAction {
        self.phase = match &outcome {
            AttemptOutcome::Succeeded(_) => PollPhase::Succeeded,
            AttemptOutcome::Failed(_) => PollPhase::Failed,
            AttemptOutcome::Expired => PollPhase::Expired,
        };
        PollAction::Finish(outcome)
    }
}
