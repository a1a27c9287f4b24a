//! Scripted doubles for the external services, shared by module tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::service::{ArtifactStatus, GenerationService, QueryService, ServiceError};
use crate::state_machine::ArtifactKind;

pub fn api_error(message: &str) -> ServiceError {
    ServiceError::ApiError {
        status: 500,
        message: message.to_string(),
    }
}

/// Asserts `actual` is `expected_secs` within timer granularity.
pub fn assert_secs(actual: Duration, expected_secs: u64) {
    let expected = Duration::from_secs(expected_secs);
    let diff = actual.abs_diff(expected);
    assert!(diff <= Duration::from_millis(5), "expected ~{expected:?}, got {actual:?}");
}

pub struct ScriptedQuery {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedQuery {
    pub fn ok(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn err(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl QueryService for ScriptedQuery {
    async fn query(&self, _target_id: &str, prompt: &str) -> Result<String, ServiceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(api_error(message)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateCall {
    pub at: Instant,
    pub kind: ArtifactKind,
    pub focus: String,
}

/// Generation service whose create failures are scripted per focus label.
///
/// Unscripted creates succeed with ids `art-1`, `art-2`, ... in call order.
/// Status reports every artifact as pending for the first `pending_polls`
/// queries and complete afterwards, except ids marked stuck or failed.
#[derive(Default)]
pub struct ScriptedGeneration {
    failures: Mutex<HashMap<String, VecDeque<String>>>,
    kind_failures: Mutex<HashMap<ArtifactKind, String>>,
    latency: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<CreateCall>>,
    created: Mutex<Vec<String>>,
    pending_polls: u32,
    polls: Mutex<u32>,
    status_errors: Mutex<u32>,
    stuck: Mutex<HashSet<String>>,
    failed: Mutex<HashSet<String>>,
    renames: Mutex<Vec<(String, String)>>,
    rename_failures: Mutex<HashSet<String>>,
}

impl ScriptedGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pending_polls(pending_polls: u32) -> Self {
        Self {
            pending_polls,
            ..Self::default()
        }
    }

    /// The next `times` creates for `focus` fail with `message`.
    pub fn fail(&self, focus: &str, times: usize, message: &str) {
        let mut failures = self.failures.lock().unwrap();
        let queue = failures.entry(focus.to_string()).or_default();
        for _ in 0..times {
            queue.push_back(message.to_string());
        }
    }

    /// Every create of `kind` not otherwise scripted fails with `message`.
    pub fn fail_kind(&self, kind: ArtifactKind, message: &str) {
        self.kind_failures.lock().unwrap().insert(kind, message.to_string());
    }

    /// Creates for `focus` take `delay` before answering.
    pub fn delay(&self, focus: &str, delay: Duration) {
        self.latency.lock().unwrap().insert(focus.to_string(), delay);
    }

    pub fn fail_status_queries(&self, times: u32) {
        *self.status_errors.lock().unwrap() = times;
    }

    pub fn mark_stuck(&self, artifact_id: &str) {
        self.stuck.lock().unwrap().insert(artifact_id.to_string());
    }

    /// A stuck artifact completes from the next status query on.
    pub fn finish(&self, artifact_id: &str) {
        self.stuck.lock().unwrap().remove(artifact_id);
    }

    pub fn clear_kind_failure(&self, kind: ArtifactKind) {
        self.kind_failures.lock().unwrap().remove(&kind);
    }

    pub fn mark_failed(&self, artifact_id: &str) {
        self.failed.lock().unwrap().insert(artifact_id.to_string());
    }

    pub fn fail_rename(&self, artifact_id: &str) {
        self.rename_failures.lock().unwrap().insert(artifact_id.to_string());
    }

    pub fn calls(&self) -> Vec<CreateCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, focus: &str) -> Vec<CreateCall> {
        self.calls().into_iter().filter(|c| c.focus == focus).collect()
    }

    pub fn calls_of_kind(&self, kind: ArtifactKind) -> usize {
        self.calls().iter().filter(|c| c.kind == kind).count()
    }

    pub fn polls(&self) -> u32 {
        *self.polls.lock().unwrap()
    }

    pub fn renames(&self) -> Vec<(String, String)> {
        self.renames.lock().unwrap().clone()
    }
}

impl GenerationService for ScriptedGeneration {
    async fn create(
        &self,
        _target_id: &str,
        kind: ArtifactKind,
        focus_label: &str,
    ) -> Result<String, ServiceError> {
        self.calls.lock().unwrap().push(CreateCall {
            at: Instant::now(),
            kind,
            focus: focus_label.to_string(),
        });

        let latency = self.latency.lock().unwrap().get(focus_label).copied();
        if let Some(delay) = latency {
            sleep(delay).await;
        }

        let scripted = self
            .failures
            .lock()
            .unwrap()
            .get_mut(focus_label)
            .and_then(|q| q.pop_front());
        if let Some(message) = scripted {
            return Err(api_error(&message));
        }
        if let Some(message) = self.kind_failures.lock().unwrap().get(&kind) {
            return Err(api_error(message));
        }

        let mut created = self.created.lock().unwrap();
        let id = format!("art-{}", created.len() + 1);
        created.push(id.clone());
        Ok(id)
    }

    async fn status_of(&self, _target_id: &str) -> Result<HashMap<String, ArtifactStatus>, ServiceError> {
        {
            let mut errors = self.status_errors.lock().unwrap();
            if *errors > 0 {
                *errors -= 1;
                return Err(api_error("status backend unavailable"));
            }
        }

        let mut polls = self.polls.lock().unwrap();
        *polls += 1;
        let settled = *polls > self.pending_polls;
        let stuck = self.stuck.lock().unwrap();
        let failed = self.failed.lock().unwrap();

        Ok(self
            .created
            .lock()
            .unwrap()
            .iter()
            .map(|id| {
                let status = if failed.contains(id) {
                    ArtifactStatus::Failed
                } else if stuck.contains(id) || !settled {
                    ArtifactStatus::Pending
                } else {
                    ArtifactStatus::Complete
                };
                (id.clone(), status)
            })
            .collect())
    }

    async fn rename(&self, artifact_id: &str, new_title: &str) -> Result<(), ServiceError> {
        if self.rename_failures.lock().unwrap().contains(artifact_id) {
            return Err(api_error("rename rejected"));
        }
        self.renames
            .lock()
            .unwrap()
            .push((artifact_id.to_string(), new_title.to_string()));
        Ok(())
    }
}
