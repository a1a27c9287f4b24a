//! Interface de terminal do curricula — spinner e saída colorida.
//!
//! Usa `indicatif` para o spinner enquanto a execução roda e `console` para
//! estilizar o relatório final, o plano e a listagem de status.

use std::path::Path;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::CurriculaError;
use crate::orchestrator::OrchestrationRun;
use crate::report::{JobLine, RunReport};
use crate::sequencer::RenameResult;
use crate::service::ArtifactStatus;
use crate::service::types::ArtifactSummary;

/// Spinner exibido enquanto uma execução está em andamento.
pub struct RunProgress {
    pb: ProgressBar,
}

impl RunProgress {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

/// Estilos compartilhados pela saída do terminal.
struct Palette {
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
    bold: Style,
}

impl Palette {
    fn new() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
            bold: Style::new().bold(),
        }
    }
}

/// Imprime o relatório final agrupado por resultado. `saved` é o caminho
/// onde o relatório foi gravado, se foi.
pub fn print_report(report: &RunReport, saved: Option<&Path>) {
    let p = Palette::new();
    println!();
    println!(
        "{} {} ({})",
        p.bold.apply_to("─── Run Report ───"),
        report.topic,
        p.dim.apply_to(report.run_id)
    );
    println!("  notebook: {}  poll passes: {}", report.target_id, report.poll_passes);
    println!();
    println!("{}", p.bold.apply_to("Units"));
    for unit in &report.units {
        println!("  {:02}. {}", unit.index + 1, unit.title);
    }

    print_bucket(&p.green, "✓", "Succeeded", &report.succeeded);
    print_bucket(&p.yellow, "…", "Still generating", &report.incomplete);
    print_bucket(&p.red, "✗", "Generation failed", &report.generation_failed);
    print_bucket(&p.yellow, "⊘", "Quota blocked", &report.quota_blocked);
    print_bucket(&p.red, "✗", "Permanently failed", &report.permanently_failed);

    if !report.quota_blocked_kinds.is_empty() {
        println!();
        println!("{}", p.yellow.apply_to("Quota exhausted for:"));
        for (kind, reason) in &report.quota_blocked_kinds {
            println!("  {kind}: {reason}");
        }
    }

    if !report.renames.is_empty() {
        println!();
        println!("{}", p.bold.apply_to("Playlist"));
        print_rename_lines(&p, &report.renames);
    }

    let unsequenced = report.unsequenced_videos();
    if !unsequenced.is_empty() {
        println!();
        println!("{}", p.yellow.apply_to("Videos not yet in the playlist:"));
        for line in &unsequenced {
            println!("  {:<22} {}", line.job_id, line.playlist_title.as_deref().unwrap_or_default());
        }
        println!("Once they finish, rename them with:");
        match saved {
            Some(path) => println!("  {}", report.sequence_command(path)),
            None => println!("  curricula sequence --report <file saved with run --save>"),
        }
    }

    if !report.incomplete.is_empty() {
        println!();
        println!("Re-check later with:");
        println!("  {}", report.recheck_command());
    }

    let commands = report.resubmit_commands();
    if !commands.is_empty() {
        println!();
        println!("Resubmit with:");
        for command in commands {
            println!("  {command}");
        }
    }

    println!();
    if report.is_clean() {
        println!("{} All {} artifacts generated", p.green.apply_to("✓"), report.total_jobs());
    } else {
        println!(
            "{} {}/{} artifacts generated",
            p.yellow.apply_to("!"),
            report.succeeded.len(),
            report.total_jobs()
        );
    }
}

fn print_bucket(style: &Style, mark: &str, heading: &str, lines: &[JobLine]) {
    if lines.is_empty() {
        return;
    }
    println!();
    println!("{} ({})", style.apply_to(heading), lines.len());
    for line in lines {
        let detail = line
            .last_error
            .as_deref()
            .or(line.artifact_id.as_deref())
            .unwrap_or_default();
        println!("  {} {:<22} {detail}", style.apply_to(mark), line.job_id);
    }
}

/// Resultado de `sequence`.
pub fn print_renames(renames: &[RenameResult]) {
    let p = Palette::new();
    println!("{}", p.bold.apply_to("─── Playlist ───"));
    if renames.is_empty() {
        println!("  (no completed videos)");
        return;
    }
    print_rename_lines(&p, renames);
}

fn print_rename_lines(p: &Palette, renames: &[RenameResult]) {
    for rename in renames {
        match &rename.error {
            None => println!("  {} {}", p.green.apply_to("✓"), rename.op.title),
            Some(e) => println!("  {} {} ({e})", p.red.apply_to("✗"), rename.op.title),
        }
    }
}

/// Relatório como JSON, para `run --json`.
pub fn print_report_json(report: &RunReport) -> Result<(), CurriculaError> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Imprime as unidades e os jobs de um plano sem executá-lo.
pub fn print_plan(run: &OrchestrationRun) {
    let p = Palette::new();
    println!("{} {}", p.bold.apply_to("─── Plan ───"), run.topic);
    for unit in &run.units {
        println!("  {:02}. {}", unit.index + 1, p.bold.apply_to(&unit.title));
        if !unit.description.is_empty() {
            println!("      {}", p.dim.apply_to(&unit.description));
        }
    }
    println!();
    println!("{} jobs", run.jobs.len());
    for job in &run.jobs {
        println!("  {:<22} {}", job.id, p.dim.apply_to(&job.focus_label));
    }
}

pub fn print_status(target_id: &str, artifacts: &[ArtifactSummary]) {
    let p = Palette::new();
    println!("{} {target_id}", p.bold.apply_to("─── Artifacts ───"));
    if artifacts.is_empty() {
        println!("  (none)");
        return;
    }
    for artifact in artifacts {
        let (style, label) = match artifact.status {
            ArtifactStatus::Complete => (&p.green, "complete"),
            ArtifactStatus::Pending => (&p.yellow, "pending"),
            ArtifactStatus::Failed => (&p.red, "failed"),
        };
        println!(
            "  {:<10} {:<24} {}",
            style.apply_to(label),
            artifact.id,
            artifact.title.as_deref().unwrap_or_default()
        );
    }
}
