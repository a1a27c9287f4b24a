mod cli;
mod config;
mod decompose;
mod error;
mod executor;
mod jobs;
mod orchestrator;
mod poller;
mod quota;
mod report;
mod sequencer;
mod service;
mod state_machine;
#[cfg(test)]
mod testing;
mod ui;

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cli::{Cli, Command};
use config::CurriculaConfig;
use orchestrator::{Orchestrator, OrchestratorSettings, RunRequest};
use report::RunReport;
use service::StudioClient;
use state_machine::ArtifactKind;
use ui::RunProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => CurriculaConfig::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => CurriculaConfig::load().context("failed to load curricula.toml")?,
    };
    if config.api_key.is_empty() {
        warn!("No API key configured; requests are sent unauthenticated");
    }

    let client = StudioClient::new(
        config.api_key.clone(),
        config.base_url.clone(),
        config.request_timeout(),
    )
    .context("failed to build HTTP client")?;
    let orchestrator = Orchestrator::new(&client, &client, OrchestratorSettings::from(&config));

    match cli.command {
        Command::Run {
            topic,
            notebook,
            sources,
            no_summary,
            json,
            save,
        } => {
            let request = RunRequest {
                target_id: notebook,
                topic,
                source_count: sources,
                include_summary: config.include_summary && !no_summary,
            };
            let progress = RunProgress::start(&format!("Generating curriculum for \"{}\"", request.topic));
            let result = orchestrator.run(&request).await;
            progress.finish();
            let report = result.context("run aborted")?;

            if let Some(path) = &save {
                report
                    .save(path)
                    .with_context(|| format!("failed to save report to {}", path.display()))?;
                info!(path = %path.display(), "Saved report");
            }
            if json {
                ui::print_report_json(&report)?;
            } else {
                ui::print_report(&report, save.as_deref());
            }
        }
        Command::Plan {
            topic,
            notebook,
            sources,
            no_summary,
        } => {
            let request = RunRequest {
                target_id: notebook,
                topic,
                source_count: sources,
                include_summary: config.include_summary && !no_summary,
            };
            let run = orchestrator.plan(&request).await.context("planning failed")?;
            ui::print_plan(&run);
        }
        Command::Create {
            notebook,
            kind,
            unit,
            focus,
        } => {
            let kind = ArtifactKind::from(kind);
            if unit.is_some() && !kind.is_per_unit() {
                bail!("--unit applies only to per-unit kinds, not {kind}");
            }
            let unit_index = unit.map(|n| n as usize - 1);
            let outcome = orchestrator.submit(&notebook, kind, unit_index, &focus).await;
            let Some(state) = outcome.states.values().next() else {
                bail!("no job was launched");
            };
            match state.external_artifact_id() {
                Some(artifact_id) => {
                    info!(%kind, artifact_id, "Artifact accepted");
                    println!("{artifact_id}");
                    if let (ArtifactKind::UnitVideo, Some(n)) = (kind, unit) {
                        eprintln!(
                            "Once it finishes, place it in the playlist with: \
                             curricula sequence --report <saved report> --video {n}={artifact_id}"
                        );
                    }
                }
                None => bail!(
                    "{kind} was not accepted ({}): {}",
                    state.status,
                    state.last_error.as_deref().unwrap_or("no error recorded")
                ),
            }
        }
        Command::Sequence { report, videos } => {
            let saved = RunReport::load(&report)
                .with_context(|| format!("failed to read report {}", report.display()))?;
            let replacements: BTreeMap<usize, String> = videos.into_iter().collect();
            let renames = orchestrator
                .resequence(&saved, &replacements)
                .await
                .context("re-sequencing failed")?;
            ui::print_renames(&renames);
        }
        Command::Status { notebook } => {
            let artifacts = client
                .list_artifacts(&notebook)
                .await
                .with_context(|| format!("failed to list artifacts for {notebook}"))?;
            ui::print_status(&notebook, &artifacts);
        }
    }

    Ok(())
}

/// Logs go to stderr so `run --json` output stays parseable. `RUST_LOG` wins
/// over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "curricula=debug" } else { "curricula=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
