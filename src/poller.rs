//! Reconciliation of asynchronous generation against the service's status query.
//!
//! A launched job only means the service accepted the request. The poller
//! waits a fixed interval, asks for the status of every artifact, and stops
//! once nothing is outstanding or the poll budget is spent. Leftovers are
//! reported as incomplete, never relaunched: relaunching an accepted job
//! would create a duplicate.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::service::{ArtifactStatus, GenerationService};

/// Final generation status of a launched job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    Complete,
    /// The service reported the generation itself as failed.
    Failed,
    /// Still in flight when the poll budget ran out.
    Incomplete,
}

#[derive(Debug, Clone, Default)]
pub struct PollOutcome {
    /// Keyed by job id.
    pub completions: BTreeMap<String, Completion>,
    /// Status queries issued, including ones that errored.
    pub passes: u32,
}

pub struct CompletionPoller {
    attempts: u32,
    interval: Duration,
}

impl Default for CompletionPoller {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(60))
    }
}

impl CompletionPoller {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// `launched` maps job id to the artifact id the service returned.
    pub async fn poll<G: GenerationService>(
        &self,
        generation: &G,
        target_id: &str,
        launched: &BTreeMap<String, String>,
    ) -> PollOutcome {
        let mut outcome = PollOutcome::default();
        let mut outstanding: BTreeMap<&str, &str> = launched
            .iter()
            .map(|(job, artifact)| (job.as_str(), artifact.as_str()))
            .collect();

        while !outstanding.is_empty() && outcome.passes < self.attempts {
            sleep(self.interval).await;
            outcome.passes += 1;

            let statuses = match generation.status_of(target_id).await {
                Ok(statuses) => statuses,
                Err(e) => {
                    warn!(pass = outcome.passes, max = self.attempts, "Status query failed: {e}");
                    continue;
                }
            };

            outstanding.retain(|job_id, artifact_id| {
                let completion = match statuses.get(*artifact_id) {
                    Some(ArtifactStatus::Complete) => Completion::Complete,
                    Some(ArtifactStatus::Failed) => Completion::Failed,
                    Some(ArtifactStatus::Pending) | None => return true,
                };
                debug!(job_id = *job_id, artifact_id = *artifact_id, ?completion, "Generation settled");
                outcome.completions.insert(job_id.to_string(), completion);
                false
            });

            info!(
                pass = outcome.passes,
                max = self.attempts,
                outstanding = outstanding.len(),
                "Polled generation status"
            );
        }

        for job_id in outstanding.into_keys() {
            outcome.completions.insert(job_id.to_string(), Completion::Incomplete);
        }
        outcome
    }
}
