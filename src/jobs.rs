//! Expansion of a topic and its units into independent generation jobs.

use chrono::{DateTime, Utc};

use crate::state_machine::{ArtifactKind, JobSpec, Unit};

/// Title of the topic-level summary video, also used as its playlist entry.
pub fn overview_title(topic: &str) -> String {
    format!("{topic} Overview")
}

/// Deterministic job id: one per (kind, unit) pair.
pub fn job_id(kind: ArtifactKind, unit_index: Option<usize>) -> String {
    match unit_index {
        Some(i) => format!("{}-{:02}", kind.slug(), i + 1),
        None => kind.slug().to_string(),
    }
}

/// Focus label sent to the generation service for a per-unit job.
pub fn unit_focus(kind: ArtifactKind, unit: &Unit, unit_count: usize) -> String {
    let number = unit.index + 1;
    let header = if unit.description.is_empty() {
        format!("Unit {number} of {unit_count}: {}.", unit.title)
    } else {
        format!("Unit {number} of {unit_count}: {}. {}", unit.title, unit.description)
    };
    let ask = match kind {
        ArtifactKind::UnitInfographic => "One-page visual summary of this unit only.",
        _ => "Short explainer video covering this unit only.",
    };
    format!("{header} {ask}")
}

/// Focus label for a topic-level job; lists every unit in learning order.
pub fn summary_focus(kind: ArtifactKind, topic: &str, units: &[Unit]) -> String {
    let outline = units
        .iter()
        .map(|u| format!("{}) {}", u.index + 1, u.title))
        .collect::<Vec<_>>()
        .join("; ");
    let ask = match kind {
        ArtifactKind::SummarySlide => "Slide deck walking through every unit in order.",
        ArtifactKind::SummaryVideo => "Overview video introducing the whole series.",
        ArtifactKind::SummaryAudio => "Audio overview discussing how the units connect.",
        ArtifactKind::Report => "Written study guide covering every unit.",
        _ => "Mind map showing how the units relate.",
    };
    format!("{}. Units in order: {outline}. {ask}", overview_title(topic))
}

/// Builds the full job set for a run. Pure: the same input always yields the
/// same jobs in the same order, per-unit jobs first.
pub fn build_jobs(
    topic: &str,
    units: &[Unit],
    include_summary: bool,
    created_at: DateTime<Utc>,
) -> Vec<JobSpec> {
    let mut jobs = Vec::with_capacity(units.len() * ArtifactKind::PER_UNIT.len() + ArtifactKind::SUMMARY.len());

    for unit in units {
        for kind in ArtifactKind::PER_UNIT {
            jobs.push(JobSpec {
                id: job_id(kind, Some(unit.index)),
                kind,
                unit_index: Some(unit.index),
                focus_label: unit_focus(kind, unit, units.len()),
                created_at,
            });
        }
    }

    if include_summary {
        for kind in ArtifactKind::SUMMARY {
            jobs.push(JobSpec {
                id: job_id(kind, None),
                kind,
                unit_index: None,
                focus_label: summary_focus(kind, topic, units),
                created_at,
            });
        }
    }

    jobs
}
