use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use medpal_lib::pipeline::handoff::ScanHandoff;
use medpal_lib::{init_tracing, ImagePayload, PipelineOutcome, ScanConfig, ScanProcessor};

const EXIT_SCAN_FAILED: i32 = 2;

/// Scan a medication label image and print the extracted record.
#[derive(Debug, Parser)]
#[command(name = "medpal-scan")]
#[command(about = "Read a medication label: OCR, structured extraction, validation")]
#[command(version)]
struct Cli {
    /// Label photo (JPEG or PNG).
    image: PathBuf,

    /// Write a pipeline report JSON to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Minimum processing time in milliseconds (overrides MEDPAL_MIN_DISPLAY_MS).
    #[arg(long)]
    min_display_ms: Option<u64>,

    /// Hard timeout in milliseconds (overrides MEDPAL_HARD_TIMEOUT_MS).
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print the handoff as JSON instead of text.
    #[arg(long)]
    json: bool,
}

/// Saved with `--output`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PipelineReport<'a> {
    timestamp: chrono::DateTime<chrono::Utc>,
    image_path: &'a str,
    processing_time_ms: u64,
    outcome: &'a PipelineOutcome,
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(outcome) if matches!(outcome, PipelineOutcome::Failure(_)) => {
            process::exit(EXIT_SCAN_FAILED)
        }
        Ok(_) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {error:#}");
            process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<PipelineOutcome> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to load .env");
        }
    }
    init_tracing();

    let mut config = ScanConfig::from_env().context("invalid environment configuration")?;
    if let Some(ms) = cli.min_display_ms {
        config.min_display = Duration::from_millis(ms);
    }
    if let Some(ms) = cli.timeout_ms {
        config.hard_timeout = Duration::from_millis(ms);
    }
    tracing::debug!(config = ?config, "Configuration loaded");

    let processor = ScanProcessor::from_config(&config).context("failed to build scan pipeline")?;

    let bytes = tokio::fs::read(&cli.image)
        .await
        .with_context(|| format!("failed to read image {}", cli.image.display()))?;
    let image_path = cli.image.display().to_string();
    let image = ImagePayload::new(bytes)?.with_uri(image_path.clone());

    let start = Instant::now();
    let outcome = processor.scan(image).await?;
    let elapsed = start.elapsed();

    let handoff = ScanHandoff::from_outcome(outcome.clone(), Some(&image_path));
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&handoff)?);
    } else {
        print_handoff(&handoff, elapsed);
    }

    if let Some(path) = &cli.output {
        let report = PipelineReport {
            timestamp: chrono::Utc::now(),
            image_path: &image_path,
            processing_time_ms: elapsed.as_millis() as u64,
            outcome: &outcome,
        };
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("failed to write report {}", path.display()))?;
        tracing::info!(path = %path.display(), "Pipeline report saved");
    }

    Ok(outcome)
}

fn print_handoff(handoff: &ScanHandoff, elapsed: Duration) {
    match handoff {
        ScanHandoff::Confirm(form) => {
            println!("Confirm medication ({} ms)", elapsed.as_millis());
            for (field, value) in form.to_fields() {
                println!("  {field:<20} {value}");
            }
        }
        ScanHandoff::Failed(notice) => {
            println!("{}: {}", notice.title, notice.message);
            println!("  [{}]", notice.action);
        }
    }
}
