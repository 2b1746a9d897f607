// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagewerk — PDF page rendering, annotation authoring and bake engine
//
// Entry point. Initialises logging and runs one command-line operation:
// inspect a document, render a page with its annotations, or replay an
// editing script and bake the result into a new PDF.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pagewerk_bridge::{platform_bridge, FileSystemSource};
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::human_errors::humanize_error;
use pagewerk_core::AppConfig;
use pagewerk_document::bake::hash_bytes;
use pagewerk_document::PdfSource;
use pagewerk_editor::{BakeService, EditorCommand, EditorEvent, EditorSession};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "pagewerk", version, about = "Render, annotate and bake PDF documents")]
struct Cli {
    /// JSON settings file; defaults apply to anything it leaves out.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print page count and page sizes as JSON.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render one page, with any scripted annotations, to a PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Editing commands (JSON array) applied before painting.
        #[arg(long, value_name = "JSON")]
        script: Option<PathBuf>,
        #[arg(long, value_name = "PNG")]
        out: PathBuf,
    },
    /// Replay an editing script and bake the annotations into a new PDF.
    Annotate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "JSON")]
        script: PathBuf,
        #[arg(long, value_name = "PDF")]
        out: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    sha256: String,
    page_count: usize,
    pages: Vec<PageOutput>,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    width: f64,
    height: f64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let human = humanize_error(&err);
            eprintln!("error: {}\n{}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Info { file } => {
            let json = serde_json::to_string_pretty(&info(&file)?)?;
            println!("{json}");
        }
        Commands::Render {
            file,
            page,
            script,
            out,
        } => render(config, &file, page, script.as_deref(), &out)?,
        Commands::Annotate { file, script, out } => {
            let report = annotate(config, &file, &script, &out).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn info(file: &Path) -> Result<InfoOutput> {
    let source = PdfSource::open(file)?;
    let pages = (0..source.page_count())
        .map(|index| {
            source.page_size(index).map(|size| PageOutput {
                width: size.width,
                height: size.height,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(InfoOutput {
        path: file.display().to_string(),
        sha256: hash_bytes(source.bytes()),
        page_count: source.page_count(),
        pages,
    })
}

fn render(config: AppConfig, file: &Path, page: usize, script: Option<&Path>, out: &Path) -> Result<()> {
    let index = page.checked_sub(1).ok_or_else(|| {
        PagewerkError::Config("--page is 1-based and must be at least 1".into())
    })?;
    let mut commands = vec![EditorCommand::GoToPage { index }];
    if let Some(script) = script {
        commands.extend(load_script(script)?);
    }

    let mut session = open_session(config, file)?;
    let events = session.dispatch(commands);
    report_failures(&events)?;

    let painted = session.paint().ok_or(PagewerkError::NoDocument)?;
    painted
        .save(out)
        .map_err(|err| PagewerkError::ImageError(format!("cannot write {}: {}", out.display(), err)))?;
    info!(out = %out.display(), "page rendered");
    Ok(())
}

async fn annotate(
    config: AppConfig,
    file: &Path,
    script: &Path,
    out: &Path,
) -> Result<pagewerk_document::BakeReport> {
    let commands = load_script(script)?;
    let service = BakeService::new(config.bake.clone());

    let mut session = open_session(config, file)?;
    let events = session.dispatch(commands);
    report_failures(&events)?;

    // A box the script never filled goes to the platform for content.
    if session.controller().awaiting_content() {
        let pending: Vec<EditorEvent> = events
            .iter()
            .rev()
            .find(|e| {
                matches!(
                    e,
                    EditorEvent::TextRectSelected { .. } | EditorEvent::SignatureRectSelected { .. }
                )
            })
            .cloned()
            .into_iter()
            .collect();
        let bridge = platform_bridge();
        for event in session.resolve_with(bridge.as_ref(), &pending) {
            if let EditorEvent::Failed { error } = event {
                warn!(message = %error.message, "unfilled box discarded");
            }
        }
    }

    // Bake from the bytes the session opened, so `--out` may name the input.
    let snapshot = session.bake_snapshot().ok_or(PagewerkError::NoDocument)?;
    info!(count = snapshot.annotations.len(), "baking annotations");
    service
        .bake_bytes(snapshot.original, snapshot.annotations, out.to_path_buf())
        .await
}

fn open_session(config: AppConfig, file: &Path) -> Result<EditorSession> {
    let mut session = EditorSession::new(config)?;
    session.open_from(&FileSystemSource::new(), &file.to_string_lossy())?;
    Ok(session)
}

fn load_script(path: &Path) -> Result<Vec<EditorCommand>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Scripts are not interactive: the first failed command aborts the run.
fn report_failures(events: &[EditorEvent]) -> Result<()> {
    for event in events {
        if let EditorEvent::Failed { error } = event {
            return Err(PagewerkError::Config(format!(
                "script command failed: {} {}",
                error.message, error.suggestion
            )));
        }
    }
    Ok(())
}
