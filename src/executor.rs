//! Concurrent launch of generation jobs with per-job retry and a
//! kind-level quota circuit breaker.
//!
//! Every job runs as its own future; the only state shared between them is
//! one [`KindBreaker`] per [`ArtifactKind`]. The first quota failure for a
//! kind trips that kind's breaker, which wakes any sibling sleeping in a
//! backoff and stops every sibling from issuing further create calls.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::quota::QuotaDetector;
use crate::service::GenerationService;
use crate::state_machine::{ArtifactKind, Event, FailureKind, JobSpec, JobState, RetryPolicy, StateMachine, Transition};

/// Quota circuit breaker for a single artifact kind. First writer wins.
#[derive(Default)]
pub struct KindBreaker {
    tripped: Mutex<Option<String>>,
    notify: Notify,
}

impl KindBreaker {
    /// Trip the breaker. Returns `true` only for the call that tripped it.
    pub fn trip(&self, reason: &str) -> bool {
        {
            let mut tripped = self.tripped.lock().unwrap_or_else(PoisonError::into_inner);
            if tripped.is_some() {
                return false;
            }
            *tripped = Some(reason.to_string());
        }
        self.notify.notify_waiters();
        true
    }

    /// The quota message that tripped the breaker, if any.
    pub fn reason(&self) -> Option<String> {
        self.tripped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sleep for `delay`, returning early if the breaker trips meanwhile.
    pub async fn backoff(&self, delay: Duration) {
        let notified = self.notify.notified();
        if self.reason().is_some() {
            return;
        }
        tokio::select! {
            _ = sleep(delay) => {}
            _ = notified => {}
        }
    }
}

/// One breaker per artifact kind; kinds never block each other.
pub struct KindBreakers {
    breakers: [KindBreaker; ArtifactKind::ALL.len()],
}

impl Default for KindBreakers {
    fn default() -> Self {
        Self {
            breakers: std::array::from_fn(|_| KindBreaker::default()),
        }
    }
}

impl KindBreakers {
    pub fn get(&self, kind: ArtifactKind) -> &KindBreaker {
        &self.breakers[kind.ordinal()]
    }

    /// Kinds whose breaker tripped, with the first quota message seen.
    pub fn tripped(&self) -> BTreeMap<ArtifactKind, String> {
        ArtifactKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).reason().map(|r| (kind, r)))
            .collect()
    }
}

/// Result of one launch wave.
#[derive(Debug, Clone, Default)]
pub struct FanOutOutcome {
    /// Final launch-level state per job id.
    pub states: BTreeMap<String, JobState>,
    pub quota_blocked_kinds: BTreeMap<ArtifactKind, String>,
}

/// Launches every job of a phase concurrently against the generation service.
pub struct FanOutExecutor<'a, G> {
    generation: &'a G,
    policy: RetryPolicy,
    detector: QuotaDetector,
}

impl<'a, G: GenerationService> FanOutExecutor<'a, G> {
    pub fn new(generation: &'a G, policy: RetryPolicy, detector: QuotaDetector) -> Self {
        Self {
            generation,
            policy,
            detector,
        }
    }

    /// Drive every job to a launch-level terminal status. No concurrency cap:
    /// the service's own rate limiting is the only backpressure.
    pub async fn execute(&self, target_id: &str, jobs: &[JobSpec]) -> FanOutOutcome {
        info!(jobs = jobs.len(), "Launching generation jobs");
        let breakers = KindBreakers::default();

        let states = join_all(jobs.iter().map(|spec| self.drive(target_id, spec, &breakers))).await;

        let outcome = FanOutOutcome {
            states: jobs.iter().map(|j| j.id.clone()).zip(states).collect(),
            quota_blocked_kinds: breakers.tripped(),
        };
        info!(
            succeeded = outcome.states.values().filter(|s| s.external_artifact_id().is_some()).count(),
            total = jobs.len(),
            "Launch wave settled"
        );
        outcome
    }

    async fn drive(&self, target_id: &str, spec: &JobSpec, breakers: &KindBreakers) -> JobState {
        let breaker = breakers.get(spec.kind);
        let mut state = JobState::new();

        loop {
            if let Some(reason) = breaker.reason() {
                StateMachine::next(&mut state, Event::KindBlocked { reason }, &self.policy);
                debug!(job_id = %spec.id, kind = %spec.kind, "Skipped: kind is quota-blocked");
                break;
            }

            if let Transition::Launched { attempt } = StateMachine::next(&mut state, Event::Launch, &self.policy) {
                debug!(job_id = %spec.id, kind = %spec.kind, attempt, "Creating artifact");
            }

            let event = match self.generation.create(target_id, spec.kind, &spec.focus_label).await {
                Ok(artifact_id) => Event::Created { artifact_id },
                Err(e) => self.failure_event(spec, breaker, &e.to_string()),
            };

            match StateMachine::next(&mut state, event, &self.policy) {
                Transition::Retry { delay, reason } => {
                    warn!(
                        job_id = %spec.id,
                        retry = state.attempt + 1,
                        max = self.policy.max_retries(),
                        delay_secs = delay.as_secs(),
                        "{reason}"
                    );
                    breaker.backoff(delay).await;
                }
                Transition::Succeeded => {
                    debug!(job_id = %spec.id, artifact_id = ?state.external_artifact_id(), "Creation accepted");
                    break;
                }
                Transition::PermanentlyFailed => {
                    warn!(job_id = %spec.id, attempts = state.launches(), "Giving up after retries");
                    break;
                }
                _ => break,
            }
        }

        state
    }

    /// Classify a create failure. A quota failure trips the kind's breaker;
    /// any failure after the breaker tripped ends the job as quota-blocked.
    fn failure_event(&self, spec: &JobSpec, breaker: &KindBreaker, message: &str) -> Event {
        match self.detector.classify(message) {
            FailureKind::QuotaExhausted(msg) => {
                if breaker.trip(&msg) {
                    warn!(kind = %spec.kind, job_id = %spec.id, "Quota exhausted; blocking remaining jobs of this kind");
                }
                Event::Failed(FailureKind::QuotaExhausted(msg))
            }
            transient => match breaker.reason() {
                Some(reason) => Event::KindBlocked { reason },
                None => Event::Failed(transient),
            },
        }
    }
}
