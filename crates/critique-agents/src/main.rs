use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use coordination::render_markdown;
use critique_agents::{AnalysisConfig, Pipeline};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Critique a research paper and judge the best follow-up hypothesis", long_about = None)]
struct Args {
    /// Paper text file. Reads stdin when omitted or `-`.
    paper: Option<PathBuf>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the model name
    #[arg(long)]
    model: Option<String>,

    /// Override the max concurrent requests
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Override the debate rounds per criticism
    #[arg(long)]
    rounds: Option<u32>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Stream progress events to stderr as JSON lines
    #[arg(long, default_value_t = false)]
    events: bool,
}

fn read_paper(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(p) if p.as_os_str() != "-" => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read paper {}", p.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read paper from stdin")?;
            Ok(text)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = AnalysisConfig::load(args.config.as_deref())?;
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(n) = args.max_in_flight {
        config.max_in_flight = n;
    }
    if let Some(rounds) = args.rounds {
        config.debate_rounds = rounds;
    }

    let paper = read_paper(args.paper.as_ref())?;
    let mut pipeline = Pipeline::from_config(&config)?;

    let event_printer = if args.events {
        let (tx, mut rx) = mpsc::unbounded_channel();
        pipeline = pipeline.with_events(tx);
        Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => eprintln!("{line}"),
                    Err(e) => warn!(error = %e, "Failed to serialize event"),
                }
            }
        }))
    } else {
        None
    };

    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling analysis");
            cancel.cancel();
        }
    });

    let result = pipeline.analyze(&paper).await;
    drop(pipeline);
    if let Some(handle) = event_printer {
        let _ = handle.await;
    }
    let report = result?;

    let rendered = match args.format {
        OutputFormat::Markdown => render_markdown(&report),
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
    };
    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{rendered}"),
    }

    if report.is_degraded() {
        warn!(level = %report.overall_level(), "Report is degraded");
    }
    Ok(())
}
