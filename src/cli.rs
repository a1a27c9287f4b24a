//! Interface de linha de comando do curricula baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, plan, create,
//! sequence, status) e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::state_machine::ArtifactKind;

/// curricula — gera um currículo de artefatos de estudo a partir de um notebook.
#[derive(Debug, Parser)]
#[command(name = "curricula", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho alternativo para o arquivo de configuração TOML.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Tipo de artefato aceito pela CLI, mapeado para [`ArtifactKind`] internamente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    SummarySlide,
    SummaryVideo,
    SummaryAudio,
    Report,
    MindMap,
    UnitInfographic,
    UnitVideo,
}

impl From<KindArg> for ArtifactKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::SummarySlide => ArtifactKind::SummarySlide,
            KindArg::SummaryVideo => ArtifactKind::SummaryVideo,
            KindArg::SummaryAudio => ArtifactKind::SummaryAudio,
            KindArg::Report => ArtifactKind::Report,
            KindArg::MindMap => ArtifactKind::MindMap,
            KindArg::UnitInfographic => ArtifactKind::UnitInfographic,
            KindArg::UnitVideo => ArtifactKind::UnitVideo,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decompõe o tópico, gera todos os artefatos e imprime o relatório.
    Run {
        /// Tópico a ser estudado.
        topic: String,

        /// Identificador do notebook que contém as fontes.
        #[arg(long)]
        notebook: String,

        /// Número de fontes no notebook (define quantas unidades pedir).
        #[arg(long, default_value_t = 5)]
        sources: usize,

        /// Pula os cinco artefatos de resumo do tópico.
        #[arg(long, default_value_t = false)]
        no_summary: bool,

        /// Imprime o relatório final em JSON.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Grava o relatório em JSON neste caminho, para uso posterior por `sequence`.
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Mostra as unidades e os jobs que seriam lançados, sem gerar nada.
    Plan {
        topic: String,

        #[arg(long)]
        notebook: String,

        #[arg(long, default_value_t = 5)]
        sources: usize,

        #[arg(long, default_value_t = false)]
        no_summary: bool,
    },

    /// Reenvia um único artefato (usado pelos comandos do relatório).
    Create {
        #[arg(long)]
        notebook: String,

        #[arg(long, value_enum)]
        kind: KindArg,

        /// Número da unidade (a partir de 1) para tipos por unidade.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        unit: Option<u32>,

        /// Rótulo de foco exatamente como aparece no relatório.
        #[arg(long)]
        focus: String,
    },

    /// Renomeia na ordem da playlist os vídeos que terminaram depois da execução.
    Sequence {
        /// Relatório gravado com `run --save`.
        #[arg(long)]
        report: PathBuf,

        /// Vídeo reenviado que ocupa uma posição da playlist, como `3=<artifact id>`
        /// (`0` é o vídeo de resumo). Pode ser repetido.
        #[arg(long = "video", value_parser = parse_video_replacement)]
        videos: Vec<(usize, String)>,
    },

    /// Lista o status de geração dos artefatos de um notebook.
    Status {
        #[arg(long)]
        notebook: String,
    },
}

/// Interpreta `N=<artifact id>`.
fn parse_video_replacement(value: &str) -> Result<(usize, String), String> {
    let (number, artifact_id) = value
        .split_once('=')
        .ok_or_else(|| format!("expected N=<artifact id>, got `{value}`"))?;
    let number = number
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid playlist number `{number}`: {e}"))?;
    let artifact_id = artifact_id.trim();
    if artifact_id.is_empty() {
        return Err("artifact id must not be empty".into());
    }
    Ok((number, artifact_id.to_string()))
}
