//! Pictura worker CLI.
//!
//! Configuration comes from the environment (and `.env`); see `PipelineConfig`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pictura_core::PipelineConfig;
use pictura_processing::parse_indented_report;
use pictura_worker::{init_tracing, parse_event_lines, run_events, WorkerContext};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

#[derive(Parser)]
#[command(name = "pictura-worker", about = "Pictura image-processing worker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process newline-delimited JSON upload events
    Process {
        /// File to read events from (defaults to stdin)
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// Parse a saved `identify -verbose` report and print it as JSON
    ParseReport {
        /// Path to the report
        file: PathBuf,
    },
    /// Delete an image, its derivatives and every record derived from it
    Purge {
        /// Bucket holding the image
        #[arg(long)]
        bucket: String,
        /// Image identifier (the image's folder)
        #[arg(long)]
        image_id: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn read_events(source: Option<PathBuf>) -> anyhow::Result<String> {
    match source {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read events from {}", path.display())),
        None => {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("Failed to read events from stdin")?;
            Ok(input)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("Failed to load configuration")?;
    init_tracing(&config.log_format)?;

    match cli.command {
        Commands::Process { events } => {
            config.validate().context("Invalid configuration")?;
            let max_concurrent = config.max_concurrent_events;

            let input = read_events(events).await?;
            let batch = parse_event_lines(&input);
            for invalid in &batch.invalid {
                tracing::error!(line = invalid.line, error = %invalid.error, "Skipping malformed event");
            }

            let context = WorkerContext::connect(config).await?;
            let pipeline = Arc::new(context.pipeline()?);
            let mut summary = run_events(pipeline, batch.events, max_concurrent).await;
            summary.failed += batch.invalid.len();

            print_json(&summary)?;
            if !summary.is_success() {
                anyhow::bail!("{} event(s) failed", summary.failed);
            }
        }
        Commands::ParseReport { file } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let tree = parse_indented_report(&text)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            print_json(&tree)?;
        }
        Commands::Purge { bucket, image_id } => {
            let context = WorkerContext::connect(config).await?;
            let report = context
                .purger()
                .purge(&bucket, &image_id)
                .await
                .with_context(|| format!("Failed to purge image {}", image_id))?;
            print_json(&report)?;
        }
    }

    Ok(())
}
