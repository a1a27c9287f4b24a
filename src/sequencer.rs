//! Playlist ordering for completed videos.
//!
//! Numbering comes from the unit index, not from how many videos made it:
//! a missing unit leaves a gap, so re-running after a late unit completes
//! gives every video the same title it would have had originally.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::jobs::overview_title;
use crate::service::GenerationService;
use crate::state_machine::{ArtifactKind, Unit};

/// Where a completed video sits in the playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VideoSlot {
    /// The topic-level overview, always `00`.
    Summary,
    Unit(usize),
}

impl VideoSlot {
    /// Slot of a job, or `None` for kinds that are not videos.
    pub fn for_job(kind: ArtifactKind, unit_index: Option<usize>) -> Option<Self> {
        match (kind, unit_index) {
            (ArtifactKind::SummaryVideo, _) => Some(VideoSlot::Summary),
            (ArtifactKind::UnitVideo, Some(index)) => Some(VideoSlot::Unit(index)),
            _ => None,
        }
    }

    /// Playlist number: `0` for the overview, `index + 1` for a unit.
    pub fn number(self) -> usize {
        match self {
            VideoSlot::Summary => 0,
            VideoSlot::Unit(index) => index + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedVideo {
    pub job_id: String,
    pub artifact_id: String,
    pub slot: VideoSlot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOp {
    pub job_id: String,
    pub artifact_id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameResult {
    pub op: RenameOp,
    /// Service error text when the rename call failed.
    pub error: Option<String>,
}

/// `"00 - <topic> Overview"`, then `"NN - <unit title>"` with `NN = index + 1`.
pub fn playlist_title(topic: &str, units: &[Unit], slot: VideoSlot) -> Option<String> {
    match slot {
        VideoSlot::Summary => Some(format!("00 - {}", overview_title(topic))),
        VideoSlot::Unit(index) => units
            .get(index)
            .map(|unit| format!("{:02} - {}", index + 1, unit.title)),
    }
}

pub struct Sequencer<'a> {
    topic: &'a str,
    units: &'a [Unit],
}

impl<'a> Sequencer<'a> {
    pub fn new(topic: &'a str, units: &'a [Unit]) -> Self {
        Self { topic, units }
    }

    /// Rename operations in playlist order. Pure.
    pub fn sequence(&self, videos: &[CompletedVideo]) -> Vec<RenameOp> {
        let mut ordered: Vec<&CompletedVideo> = videos.iter().collect();
        ordered.sort_by_key(|v| v.slot);

        ordered
            .into_iter()
            .filter_map(|video| {
                let Some(title) = playlist_title(self.topic, self.units, video.slot) else {
                    warn!(job_id = %video.job_id, slot = ?video.slot, "Video refers to an unknown unit; not renamed");
                    return None;
                };
                Some(RenameOp {
                    job_id: video.job_id.clone(),
                    artifact_id: video.artifact_id.clone(),
                    title,
                })
            })
            .collect()
    }

    /// Issue one rename per operation. Failures are recorded, not fatal.
    pub async fn apply<G: GenerationService>(&self, generation: &G, ops: Vec<RenameOp>) -> Vec<RenameResult> {
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            let error = match generation.rename(&op.artifact_id, &op.title).await {
                Ok(()) => {
                    info!(artifact_id = %op.artifact_id, title = %op.title, "Renamed video");
                    None
                }
                Err(e) => {
                    warn!(artifact_id = %op.artifact_id, title = %op.title, "Rename failed: {e}");
                    Some(e.to_string())
                }
            };
            results.push(RenameResult { op, error });
        }
        results
    }
}
