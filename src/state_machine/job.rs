use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ordered learning sub-topic produced by decomposition.
///
/// `index` is the position in the decomposition reply and the only key used
/// for playlist sequencing later on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub index: usize,
    pub title: String,
    pub description: String,
}

/// Type of content requested from the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    SummarySlide,
    SummaryVideo,
    SummaryAudio,
    Report,
    MindMap,
    UnitInfographic,
    UnitVideo,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::SummarySlide,
        ArtifactKind::SummaryVideo,
        ArtifactKind::SummaryAudio,
        ArtifactKind::Report,
        ArtifactKind::MindMap,
        ArtifactKind::UnitInfographic,
        ArtifactKind::UnitVideo,
    ];

    /// Topic-level kinds, emitted once per run when summaries are enabled.
    pub const SUMMARY: [ArtifactKind; 5] = [
        ArtifactKind::SummarySlide,
        ArtifactKind::SummaryVideo,
        ArtifactKind::SummaryAudio,
        ArtifactKind::Report,
        ArtifactKind::MindMap,
    ];

    /// Kinds emitted once per unit.
    pub const PER_UNIT: [ArtifactKind; 2] = [ArtifactKind::UnitInfographic, ArtifactKind::UnitVideo];

    pub fn is_per_unit(self) -> bool {
        matches!(self, ArtifactKind::UnitInfographic | ArtifactKind::UnitVideo)
    }

    /// Position in [`ArtifactKind::ALL`].
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Medium name understood by the generation service. Unit and summary
    /// variants of the same medium differ only by focus label.
    pub fn service_kind(self) -> &'static str {
        match self {
            ArtifactKind::SummarySlide => "slide_deck",
            ArtifactKind::SummaryVideo | ArtifactKind::UnitVideo => "video",
            ArtifactKind::SummaryAudio => "audio",
            ArtifactKind::Report => "report",
            ArtifactKind::MindMap => "mind_map",
            ArtifactKind::UnitInfographic => "infographic",
        }
    }

    /// Short token used in job ids and on the command line.
    pub fn slug(self) -> &'static str {
        match self {
            ArtifactKind::SummarySlide => "summary-slide",
            ArtifactKind::SummaryVideo => "summary-video",
            ArtifactKind::SummaryAudio => "summary-audio",
            ArtifactKind::Report => "report",
            ArtifactKind::MindMap => "mind-map",
            ArtifactKind::UnitInfographic => "unit-infographic",
            ArtifactKind::UnitVideo => "unit-video",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// One independent generation request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: String,
    pub kind: ArtifactKind,
    /// Absent for summary-kind jobs.
    pub unit_index: Option<usize>,
    pub focus_label: String,
    pub created_at: DateTime<Utc>,
}

/// Distinguishes retryable failures from daily quota exhaustion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Network hiccup, 5xx, rate limiting: worth another attempt.
    Transient(String),
    /// Service-side daily creation limit for this kind.
    QuotaExhausted(String),
}

impl FailureKind {
    pub fn message(&self) -> &str {
        match self {
            FailureKind::Transient(msg) | FailureKind::QuotaExhausted(msg) => msg,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient(msg) => write!(f, "Transient failure: {msg}"),
            FailureKind::QuotaExhausted(msg) => write!(f, "Quota exhausted: {msg}"),
        }
    }
}

/// Lifecycle status of a single job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    RetryScheduled { delay: Duration },
    Succeeded { artifact_id: String },
    QuotaBlocked,
    PermanentlyFailed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded { .. } | JobStatus::QuotaBlocked | JobStatus::PermanentlyFailed
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::RetryScheduled { .. } => "RETRY_SCHEDULED",
            JobStatus::Succeeded { .. } => "SUCCEEDED",
            JobStatus::QuotaBlocked => "QUOTA_BLOCKED",
            JobStatus::PermanentlyFailed => "PERMANENTLY_FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Escalating backoff schedule. Its length is the retry ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: vec![
                Duration::from_secs(30),
                Duration::from_secs(60),
                Duration::from_secs(120),
            ],
        }
    }
}

impl RetryPolicy {
    pub fn from_secs(secs: &[u64]) -> Self {
        Self {
            backoff: secs.iter().copied().map(Duration::from_secs).collect(),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.backoff.len() as u32
    }

    /// Delay before retry number `retry` (1-based). Values past the end of
    /// the schedule reuse the last entry.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let idx = (retry.max(1) as usize - 1).min(self.backoff.len().saturating_sub(1));
        self.backoff.get(idx).copied().unwrap_or_default()
    }
}

/// Mutable record attached 1:1 to a [`JobSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobState {
    /// Retries performed so far; 0 on the first launch.
    pub attempt: u32,
    pub status: JobStatus,
    pub last_error: Option<String>,
    pub history: Vec<JobStatus>,
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

impl JobState {
    pub fn new() -> Self {
        Self {
            attempt: 0,
            status: JobStatus::Pending,
            last_error: None,
            history: Vec::new(),
        }
    }

    pub fn external_artifact_id(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Succeeded { artifact_id } => Some(artifact_id),
            _ => None,
        }
    }

    /// Number of create calls issued for this job.
    pub fn launches(&self) -> usize {
        self.history
            .iter()
            .chain(std::iter::once(&self.status))
            .filter(|s| matches!(s, JobStatus::Running))
            .count()
    }
}
