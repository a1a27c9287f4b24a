use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::config::CurriculaConfig;
use crate::decompose::UnitDecomposer;
use crate::error::CurriculaError;
use crate::executor::{FanOutExecutor, FanOutOutcome};
use crate::jobs::{build_jobs, job_id};
use crate::poller::{Completion, CompletionPoller};
use crate::quota::QuotaDetector;
use crate::report::{ReportBuilder, RunReport};
use crate::sequencer::{CompletedVideo, RenameResult, Sequencer, VideoSlot};
use crate::service::{ArtifactStatus, GenerationService, QueryService};
use crate::state_machine::{ArtifactKind, JobSpec, JobState, RetryPolicy, Unit};

/// What to orchestrate.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub target_id: String,
    pub topic: String,
    pub source_count: usize,
    pub include_summary: bool,
}

/// Tunables shared by every phase.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub retry_policy: RetryPolicy,
    pub quota_detector: QuotaDetector,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            quota_detector: QuotaDetector::default(),
            poll_attempts: 3,
            poll_interval: Duration::from_secs(60),
        }
    }
}

impl From<&CurriculaConfig> for OrchestratorSettings {
    fn from(config: &CurriculaConfig) -> Self {
        Self {
            retry_policy: config.retry_policy(),
            quota_detector: config.quota_detector(),
            poll_attempts: config.poll_attempts,
            poll_interval: config.poll_interval(),
        }
    }
}

/// Top-level aggregate for one run. Units are fixed once decomposition
/// completes; only job states change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationRun {
    pub run_id: Uuid,
    pub target_id: String,
    pub topic: String,
    pub units: Vec<Unit>,
    pub jobs: Vec<JobSpec>,
    pub states: BTreeMap<String, JobState>,
    pub quota_blocked_kinds: BTreeMap<ArtifactKind, String>,
}

impl OrchestrationRun {
    pub fn new(target_id: String, topic: String, units: Vec<Unit>, jobs: Vec<JobSpec>) -> Self {
        let states = jobs.iter().map(|j| (j.id.clone(), JobState::new())).collect();
        Self {
            run_id: Uuid::new_v4(),
            target_id,
            topic,
            units,
            jobs,
            states,
            quota_blocked_kinds: BTreeMap::new(),
        }
    }

    /// Job id → artifact id for every job whose creation was accepted.
    pub fn launched(&self) -> BTreeMap<String, String> {
        self.states
            .iter()
            .filter_map(|(id, state)| state.external_artifact_id().map(|a| (id.clone(), a.to_string())))
            .collect()
    }

    /// Videos that finished generating, with their playlist slot.
    pub fn completed_videos(&self, completions: &BTreeMap<String, Completion>) -> Vec<CompletedVideo> {
        self.jobs
            .iter()
            .filter(|spec| completions.get(&spec.id) == Some(&Completion::Complete))
            .filter_map(|spec| {
                let slot = VideoSlot::for_job(spec.kind, spec.unit_index)?;
                let artifact_id = self.states.get(&spec.id)?.external_artifact_id()?.to_string();
                Some(CompletedVideo {
                    job_id: spec.id.clone(),
                    artifact_id,
                    slot,
                })
            })
            .collect()
    }
}

/// Runs the strict two-phase pipeline: decompose, build, launch, poll,
/// sequence, report. Each phase sees only the previous phase's output.
pub struct Orchestrator<'a, Q, G> {
    query: &'a Q,
    generation: &'a G,
    settings: OrchestratorSettings,
}

impl<'a, Q: QueryService, G: GenerationService> Orchestrator<'a, Q, G> {
    pub fn new(query: &'a Q, generation: &'a G, settings: OrchestratorSettings) -> Self {
        Self {
            query,
            generation,
            settings,
        }
    }

    /// Decompose and build the job set without contacting the generation service.
    pub async fn plan(&self, request: &RunRequest) -> Result<OrchestrationRun, CurriculaError> {
        let units = UnitDecomposer::new(self.query)
            .decompose(&request.target_id, &request.topic, request.source_count)
            .await?;
        let jobs = build_jobs(&request.topic, &units, request.include_summary, Utc::now());
        info!(units = units.len(), jobs = jobs.len(), "Built job set");
        Ok(OrchestrationRun::new(
            request.target_id.clone(),
            request.topic.clone(),
            units,
            jobs,
        ))
    }

    /// Only decomposition failure aborts; job-level failures end up in the report.
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport, CurriculaError> {
        let mut run = self.plan(request).await?;
        let span = info_span!("run", run_id = %run.run_id, target = %run.target_id);
        let report = self.drive(&mut run).instrument(span).await;
        Ok(report)
    }

    async fn drive(&self, run: &mut OrchestrationRun) -> RunReport {
        let launch = self.executor().execute(&run.target_id, &run.jobs).await;
        run.states = launch.states;
        run.quota_blocked_kinds = launch.quota_blocked_kinds;

        let poller = CompletionPoller::new(self.settings.poll_attempts, self.settings.poll_interval);
        let polled = poller.poll(self.generation, &run.target_id, &run.launched()).await;

        let sequencer = Sequencer::new(&run.topic, &run.units);
        let ops = sequencer.sequence(&run.completed_videos(&polled.completions));
        let renames = sequencer.apply(self.generation, ops).await;

        let report = ReportBuilder::build(run, &polled.completions, polled.passes, renames);
        info!(
            succeeded = report.succeeded.len(),
            incomplete = report.incomplete.len(),
            quota_blocked = report.quota_blocked.len(),
            failed = report.permanently_failed.len() + report.generation_failed.len(),
            "Run finished"
        );
        report
    }

    /// Renames the videos of an earlier run that have completed since.
    ///
    /// `replacements` maps a playlist number (`0` for the overview) to the
    /// artifact id of a resubmitted video, taking the place of the one in
    /// the report. Titles depend only on the slot, so videos renamed before
    /// get the same title again.
    pub async fn resequence(
        &self,
        report: &RunReport,
        replacements: &BTreeMap<usize, String>,
    ) -> Result<Vec<RenameResult>, CurriculaError> {
        let statuses = self.generation.status_of(&report.target_id).await?;

        let mut videos = Vec::new();
        for line in report.lines() {
            let Some(slot) = VideoSlot::for_job(line.kind, line.unit_index) else {
                continue;
            };
            let Some(artifact_id) = replacements.get(&slot.number()).or(line.artifact_id.as_ref()) else {
                continue;
            };
            match statuses.get(artifact_id) {
                Some(ArtifactStatus::Complete) => videos.push(CompletedVideo {
                    job_id: line.job_id.clone(),
                    artifact_id: artifact_id.clone(),
                    slot,
                }),
                status => info!(job_id = %line.job_id, artifact_id = %artifact_id, ?status, "Video not complete yet"),
            }
        }
        for number in replacements.keys() {
            if !report.lines().any(|line| {
                VideoSlot::for_job(line.kind, line.unit_index).map(VideoSlot::number) == Some(*number)
            }) {
                warn!(number = *number, "No video in the report has this playlist number");
            }
        }

        let sequencer = Sequencer::new(&report.topic, &report.units);
        let ops = sequencer.sequence(&videos);
        info!(run_id = %report.run_id, videos = ops.len(), "Re-sequencing completed videos");
        Ok(sequencer.apply(self.generation, ops).await)
    }

    /// Manual resubmission of a single artifact, with the same retry and
    /// quota handling as a full run. `unit_index` is kept for per-unit kinds
    /// only.
    pub async fn submit(
        &self,
        target_id: &str,
        kind: ArtifactKind,
        unit_index: Option<usize>,
        focus_label: &str,
    ) -> FanOutOutcome {
        let unit_index = unit_index.filter(|_| kind.is_per_unit());
        let spec = JobSpec {
            id: job_id(kind, unit_index),
            kind,
            unit_index,
            focus_label: focus_label.to_string(),
            created_at: Utc::now(),
        };
        self.executor().execute(target_id, std::slice::from_ref(&spec)).await
    }

    fn executor(&self) -> FanOutExecutor<'a, G> {
        FanOutExecutor::new(
            self.generation,
            self.settings.retry_policy.clone(),
            self.settings.quota_detector.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::JobStatus;
    use crate::testing::{ScriptedGeneration, ScriptedQuery};
    use tokio::time::Instant;

    const FIVE_UNITS: &str = "Here is the breakdown:\n\
        1. Openings - How games begin\n\
        2. Tactics - Forks, pins and skewers\n\
        3. Strategy - Pawn structure and plans\n\
        4. Endgames - Converting an advantage\n\
        5. Practice - Analysing your own games";

    fn request(include_summary: bool) -> RunRequest {
        RunRequest {
            target_id: "nb-chess".into(),
            topic: "Chess".into(),
            source_count: 7,
            include_summary,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_succeeds_and_sequences_videos() {
        let query = ScriptedQuery::ok(FIVE_UNITS);
        let generation = ScriptedGeneration::new();
        let orchestrator = Orchestrator::new(&query, &generation, OrchestratorSettings::default());

        let start = Instant::now();
        let report = orchestrator.run(&request(true)).await.unwrap();

        assert!(query.prompts()[0].contains("between 4 and 5"));
        assert_eq!(report.units.len(), 5);
        assert_eq!(report.total_jobs(), 15);
        assert_eq!(report.succeeded.len(), 15);
        assert_eq!(generation.calls().len(), 15);
        assert_eq!(report.poll_passes, 1);
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert!(report.is_clean());

        let titles: Vec<String> = generation.renames().into_iter().map(|(_, t)| t).collect();
        assert_eq!(
            titles,
            vec![
                "00 - Chess Overview",
                "01 - Openings",
                "02 - Tactics",
                "03 - Strategy",
                "04 - Endgames",
                "05 - Practice",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn decomposition_failure_launches_nothing() {
        let query = ScriptedQuery::ok("Sorry, the sources do not cover this topic.");
        let generation = ScriptedGeneration::new();
        let orchestrator = Orchestrator::new(&query, &generation, OrchestratorSettings::default());

        let err = orchestrator.run(&request(true)).await.unwrap_err();

        assert!(matches!(err, CurriculaError::DecompositionFailed(_)));
        assert!(generation.calls().is_empty());
        assert_eq!(generation.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_on_unit_videos_is_reported_per_kind() {
        let query = ScriptedQuery::ok(FIVE_UNITS);
        let generation = ScriptedGeneration::new();
        generation.fail_kind(
            ArtifactKind::UnitVideo,
            "You have reached your daily limit. Please try again later.",
        );
        let orchestrator = Orchestrator::new(&query, &generation, OrchestratorSettings::default());

        let report = orchestrator.run(&request(true)).await.unwrap();

        assert_eq!(generation.calls_of_kind(ArtifactKind::UnitVideo), 1);
        assert_eq!(report.quota_blocked.len(), 5);
        assert!(report.quota_blocked.iter().all(|l| l.kind == ArtifactKind::UnitVideo));
        assert!(report.quota_blocked_kinds.contains_key(&ArtifactKind::UnitVideo));
        assert_eq!(report.succeeded.len(), 10);
        assert_eq!(report.resubmit_commands().len(), 5);

        // Only the summary video completed, and it keeps its fixed slot.
        let titles: Vec<String> = generation.renames().into_iter().map(|(_, t)| t).collect();
        assert_eq!(titles, vec!["00 - Chess Overview"]);
    }

    #[tokio::test(start_paused = true)]
    async fn plan_does_not_touch_generation() {
        let query = ScriptedQuery::ok(FIVE_UNITS);
        let generation = ScriptedGeneration::new();
        let orchestrator = Orchestrator::new(&query, &generation, OrchestratorSettings::default());

        let run = orchestrator.plan(&request(false)).await.unwrap();

        assert_eq!(run.jobs.len(), 10);
        assert!(run.states.values().all(|s| s.status == JobStatus::Pending));
        assert!(generation.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn submit_retries_a_single_artifact() {
        let query = ScriptedQuery::ok(FIVE_UNITS);
        let generation = ScriptedGeneration::new();
        generation.fail("Unit 2 of 5: Tactics.", 1, "connection reset by peer");
        let orchestrator = Orchestrator::new(&query, &generation, OrchestratorSettings::default());

        let outcome = orchestrator
            .submit("nb-chess", ArtifactKind::UnitInfographic, Some(1), "Unit 2 of 5: Tactics.")
            .await;

        let state = &outcome.states["unit-infographic-02"];
        assert_eq!(state.external_artifact_id(), Some("art-1"));
        assert_eq!(state.launches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_drops_unit_for_summary_kinds() {
        let query = ScriptedQuery::ok(FIVE_UNITS);
        let generation = ScriptedGeneration::new();
        let orchestrator = Orchestrator::new(&query, &generation, OrchestratorSettings::default());

        let outcome = orchestrator.submit("nb-chess", ArtifactKind::MindMap, Some(3), "Chess Overview.").await;

        assert!(outcome.states.contains_key("mind-map"));
    }

    #[tokio::test(start_paused = true)]
    async fn late_video_is_renamed_on_resequence() {
        let query = ScriptedQuery::ok(FIVE_UNITS);
        let generation = ScriptedGeneration::new();
        // Creates resolve in job order: unit 3's video is the sixth artifact.
        generation.mark_stuck("art-6");
        let orchestrator = Orchestrator::new(&query, &generation, OrchestratorSettings::default());

        let report = orchestrator.run(&request(true)).await.unwrap();

        let late = report.incomplete.iter().find(|l| l.job_id == "unit-video-03").unwrap();
        assert_eq!(late.artifact_id.as_deref(), Some("art-6"));
        assert_eq!(late.playlist_title.as_deref(), Some("03 - Strategy"));
        assert_eq!(report.unsequenced_videos().len(), 1);
        assert!(!generation.renames().iter().any(|(id, _)| id == "art-6"));

        generation.finish("art-6");
        let renames = orchestrator.resequence(&report, &BTreeMap::new()).await.unwrap();

        let titles: Vec<&str> = renames.iter().map(|r| r.op.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "00 - Chess Overview",
                "01 - Openings",
                "02 - Tactics",
                "03 - Strategy",
                "04 - Endgames",
                "05 - Practice",
            ]
        );
        assert_eq!(renames[3].op.artifact_id, "art-6");
        assert!(renames.iter().all(|r| r.error.is_none()));

        // Everything earlier keeps the title it already had.
        let first_pass: Vec<(String, String)> = generation.renames().into_iter().take(5).collect();
        for (artifact_id, title) in first_pass {
            assert!(renames.iter().any(|r| r.op.artifact_id == artifact_id && r.op.title == title));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn resubmitted_video_takes_its_slot() {
        let query = ScriptedQuery::ok(FIVE_UNITS);
        let generation = ScriptedGeneration::new();
        generation.fail_kind(ArtifactKind::UnitVideo, "Please try again later.");
        let orchestrator = Orchestrator::new(&query, &generation, OrchestratorSettings::default());
        let report = orchestrator.run(&request(false)).await.unwrap();
        assert_eq!(report.quota_blocked.len(), 5);

        generation.clear_kind_failure(ArtifactKind::UnitVideo);
        let outcome = orchestrator
            .submit("nb-chess", ArtifactKind::UnitVideo, Some(1), "Unit 2 of 5: Tactics.")
            .await;
        let artifact_id = outcome.states["unit-video-02"].external_artifact_id().unwrap().to_string();

        let replacements = BTreeMap::from([(2, artifact_id.clone())]);
        let renames = orchestrator.resequence(&report, &replacements).await.unwrap();

        assert_eq!(renames.len(), 1);
        assert_eq!(renames[0].op.artifact_id, artifact_id);
        assert_eq!(renames[0].op.title, "02 - Tactics");
    }

    #[tokio::test(start_paused = true)]
    async fn resequence_surfaces_status_query_errors() {
        let query = ScriptedQuery::ok(FIVE_UNITS);
        let generation = ScriptedGeneration::new();
        let orchestrator = Orchestrator::new(&query, &generation, OrchestratorSettings::default());
        let report = orchestrator.run(&request(false)).await.unwrap();

        generation.fail_status_queries(1);
        let err = orchestrator.resequence(&report, &BTreeMap::new()).await.unwrap_err();

        assert!(matches!(err, CurriculaError::Service(_)));
    }
}
