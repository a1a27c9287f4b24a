//! Final per-run report: every job in exactly one bucket, with the exact
//! parameters needed to resubmit anything that did not succeed.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CurriculaError;
use crate::orchestrator::OrchestrationRun;
use crate::poller::Completion;
use crate::sequencer::{RenameResult, VideoSlot, playlist_title};
use crate::state_machine::{ArtifactKind, JobSpec, JobState, JobStatus, Unit};

/// Terminal reporting bucket of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Succeeded,
    /// Accepted but still generating after the poll budget.
    Incomplete,
    /// Accepted, then reported failed by the service.
    GenerationFailed,
    QuotaBlocked,
    PermanentlyFailed,
}

/// Where a job ends up given its launch state and poll result.
pub fn bucket_for(state: &JobState, completion: Option<Completion>) -> Bucket {
    match (&state.status, completion) {
        (JobStatus::Succeeded { .. }, Some(Completion::Complete)) => Bucket::Succeeded,
        (JobStatus::Succeeded { .. }, Some(Completion::Failed)) => Bucket::GenerationFailed,
        (JobStatus::Succeeded { .. }, _) => Bucket::Incomplete,
        (JobStatus::QuotaBlocked, _) => Bucket::QuotaBlocked,
        _ => Bucket::PermanentlyFailed,
    }
}

/// Parameters for a manual resubmission of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resubmit {
    pub target_id: String,
    pub kind: ArtifactKind,
    /// Zero-based unit index of a per-unit job.
    pub unit_index: Option<usize>,
    pub focus_label: String,
}

impl Resubmit {
    pub fn command(&self) -> String {
        let unit = self
            .unit_index
            .map(|index| format!(" --unit {}", index + 1))
            .unwrap_or_default();
        format!(
            "curricula create --notebook {} --kind {}{unit} --focus {}",
            shell_quote(&self.target_id),
            self.kind.slug(),
            shell_quote(&self.focus_label)
        )
    }
}

fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':'))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLine {
    pub job_id: String,
    pub kind: ArtifactKind,
    pub unit_index: Option<usize>,
    pub focus_label: String,
    /// Create calls issued.
    pub launches: usize,
    pub artifact_id: Option<String>,
    pub last_error: Option<String>,
    /// Title the video gets in the playlist; `None` for other kinds.
    pub playlist_title: Option<String>,
    /// Statuses the job passed through, ending with its final one.
    pub trail: Vec<String>,
    /// Present for every bucket except `Succeeded` and `Incomplete`.
    pub resubmit: Option<Resubmit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub target_id: String,
    pub topic: String,
    pub generated_at: DateTime<Utc>,
    pub units: Vec<Unit>,
    pub succeeded: Vec<JobLine>,
    pub incomplete: Vec<JobLine>,
    pub generation_failed: Vec<JobLine>,
    pub quota_blocked: Vec<JobLine>,
    pub permanently_failed: Vec<JobLine>,
    /// Kind → first quota message that tripped its breaker.
    pub quota_blocked_kinds: BTreeMap<ArtifactKind, String>,
    pub poll_passes: u32,
    pub renames: Vec<RenameResult>,
}

impl RunReport {
    pub fn total_jobs(&self) -> usize {
        self.succeeded.len()
            + self.incomplete.len()
            + self.generation_failed.len()
            + self.quota_blocked.len()
            + self.permanently_failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.succeeded.len() == self.total_jobs() && self.renames.iter().all(|r| r.error.is_none())
    }

    /// Command to re-check jobs left incomplete.
    pub fn recheck_command(&self) -> String {
        format!("curricula status --notebook {}", shell_quote(&self.target_id))
    }

    /// Command that renames videos finished after the run, given the
    /// path the report was saved to.
    pub fn sequence_command(&self, report_path: &Path) -> String {
        format!(
            "curricula sequence --report {}",
            shell_quote(&report_path.display().to_string())
        )
    }

    /// Every job line, in bucket order.
    pub fn lines(&self) -> impl Iterator<Item = &JobLine> {
        self.succeeded
            .iter()
            .chain(&self.incomplete)
            .chain(&self.generation_failed)
            .chain(&self.quota_blocked)
            .chain(&self.permanently_failed)
    }

    /// Videos that do not carry their playlist title yet.
    pub fn unsequenced_videos(&self) -> Vec<&JobLine> {
        let renamed = |job_id: &str| {
            self.renames
                .iter()
                .any(|r| r.op.job_id == job_id && r.error.is_none())
        };
        self.lines()
            .filter(|line| line.playlist_title.is_some() && !renamed(&line.job_id))
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<(), CurriculaError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CurriculaError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Every non-succeeded, non-incomplete job's resubmission command.
    pub fn resubmit_commands(&self) -> Vec<String> {
        self.generation_failed
            .iter()
            .chain(&self.quota_blocked)
            .chain(&self.permanently_failed)
            .filter_map(|line| line.resubmit.as_ref().map(Resubmit::command))
            .collect()
    }
}

/// Pure aggregation of a finished run.
pub struct ReportBuilder;

impl ReportBuilder {
    pub fn build(
        run: &OrchestrationRun,
        completions: &BTreeMap<String, Completion>,
        poll_passes: u32,
        renames: Vec<RenameResult>,
    ) -> RunReport {
        let mut report = RunReport {
            run_id: run.run_id,
            target_id: run.target_id.clone(),
            topic: run.topic.clone(),
            generated_at: Utc::now(),
            units: run.units.clone(),
            succeeded: Vec::new(),
            incomplete: Vec::new(),
            generation_failed: Vec::new(),
            quota_blocked: Vec::new(),
            permanently_failed: Vec::new(),
            quota_blocked_kinds: run.quota_blocked_kinds.clone(),
            poll_passes,
            renames,
        };

        for spec in &run.jobs {
            let default_state = JobState::new();
            let state = run.states.get(&spec.id).unwrap_or(&default_state);
            let bucket = bucket_for(state, completions.get(&spec.id).copied());
            let line = Self::line(run, spec, state, bucket);
            match bucket {
                Bucket::Succeeded => report.succeeded.push(line),
                Bucket::Incomplete => report.incomplete.push(line),
                Bucket::GenerationFailed => report.generation_failed.push(line),
                Bucket::QuotaBlocked => report.quota_blocked.push(line),
                Bucket::PermanentlyFailed => report.permanently_failed.push(line),
            }
        }

        report
    }

    fn line(run: &OrchestrationRun, spec: &JobSpec, state: &JobState, bucket: Bucket) -> JobLine {
        let resubmit = match bucket {
            Bucket::Succeeded | Bucket::Incomplete => None,
            _ => Some(Resubmit {
                target_id: run.target_id.clone(),
                kind: spec.kind,
                unit_index: spec.unit_index,
                focus_label: spec.focus_label.clone(),
            }),
        };
        let playlist_title = VideoSlot::for_job(spec.kind, spec.unit_index)
            .and_then(|slot| playlist_title(&run.topic, &run.units, slot));
        JobLine {
            job_id: spec.id.clone(),
            kind: spec.kind,
            unit_index: spec.unit_index,
            focus_label: spec.focus_label.clone(),
            launches: state.launches(),
            artifact_id: state.external_artifact_id().map(str::to_string),
            last_error: state.last_error.clone(),
            playlist_title,
            trail: state
                .history
                .iter()
                .chain(std::iter::once(&state.status))
                .map(|s| s.label().to_string())
                .collect(),
            resubmit,
        }
    }
}
