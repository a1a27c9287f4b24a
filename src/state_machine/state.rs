use std::time::Duration;

use super::job::{FailureKind, JobState, JobStatus, RetryPolicy};

/// Inputs that drive a job's state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Issue (or re-issue) the create call.
    Launch,
    /// The service accepted the create call.
    Created { artifact_id: String },
    /// The create call failed, already classified.
    Failed(FailureKind),
    /// Another job of the same kind tripped the quota breaker.
    KindBlocked { reason: String },
}

/// The result of applying an [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Moved to `Running`; carries the retry count of this launch.
    Launched { attempt: u32 },
    Succeeded,
    /// Moved to `RetryScheduled`; relaunch after `delay`.
    Retry { delay: Duration, reason: FailureKind },
    QuotaBlocked,
    PermanentlyFailed,
    /// The event does not apply in the current status; nothing changed.
    Rejected,
}

/// Drives a [`JobState`] through its lifecycle. Pure: no I/O, no clocks.
pub struct StateMachine;

impl StateMachine {
    /// Compute and apply the transition for `event`.
    ///
    /// - `Pending`/`RetryScheduled` + `Launch` moves to `Running`; relaunching
    ///   from `RetryScheduled` counts one retry.
    /// - `Running` + `Created` is terminal success.
    /// - `Running` + quota failure blocks immediately, regardless of attempt.
    /// - `Running` + transient failure schedules a retry while the policy
    ///   allows one, otherwise fails permanently.
    /// - `KindBlocked` forces any non-terminal job to `QuotaBlocked`.
    pub fn next(state: &mut JobState, event: Event, policy: &RetryPolicy) -> Transition {
        if state.status.is_terminal() {
            return Transition::Rejected;
        }

        let (status, transition) = match (&state.status, event) {
            (JobStatus::Pending, Event::Launch) => (JobStatus::Running, Transition::Launched { attempt: 0 }),
            (JobStatus::RetryScheduled { .. }, Event::Launch) => {
                state.attempt += 1;
                (
                    JobStatus::Running,
                    Transition::Launched {
                        attempt: state.attempt,
                    },
                )
            }
            (JobStatus::Running, Event::Created { artifact_id }) => {
                (JobStatus::Succeeded { artifact_id }, Transition::Succeeded)
            }
            (JobStatus::Running, Event::Failed(kind)) => {
                state.last_error = Some(kind.message().to_string());
                Self::handle_failure(state, kind, policy)
            }
            (_, Event::KindBlocked { reason }) => {
                if state.last_error.is_none() {
                    state.last_error = Some(reason);
                }
                (JobStatus::QuotaBlocked, Transition::QuotaBlocked)
            }
            _ => return Transition::Rejected,
        };

        let previous = std::mem::replace(&mut state.status, status);
        state.history.push(previous);
        transition
    }

    fn handle_failure(state: &JobState, kind: FailureKind, policy: &RetryPolicy) -> (JobStatus, Transition) {
        match kind {
            FailureKind::QuotaExhausted(_) => (JobStatus::QuotaBlocked, Transition::QuotaBlocked),
            FailureKind::Transient(_) if state.attempt < policy.max_retries() => {
                let delay = policy.delay_for_retry(state.attempt + 1);
                (
                    JobStatus::RetryScheduled { delay },
                    Transition::Retry { delay, reason: kind },
                )
            }
            FailureKind::Transient(_) => (JobStatus::PermanentlyFailed, Transition::PermanentlyFailed),
        }
    }
}
