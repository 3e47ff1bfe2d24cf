use std::path::PathBuf;

use capture::{CancellationToken, CaptureCommand, CaptureReport, Phase};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use ocr::TesseractConfig;
use phylo_cli::{CaptureJob, JobOutcome};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaKind {
    /// Job file accepted by `run`
    Job,
    /// Report written as `<stem>.json`
    Report,
    /// Commands understood by the capture manager
    Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a phylogeny from a single image
    Capture {
        /// Path to the input image
        #[arg(short, long)]
        image: PathBuf,
        /// Output directory for the report files
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Root position as `x,y`
        #[arg(long, value_parser = parse_root)]
        root: Option<[i32; 2]>,
        /// Phase to stop at
        #[arg(long, default_value = "phylogeny")]
        goal: Phase,
        /// Recognize leaf labels with tesseract
        #[arg(long)]
        ocr: bool,
        /// Tesseract language
        #[arg(long, default_value = "eng")]
        lang: String,
        /// Also write a debug overlay PNG
        #[arg(long)]
        overlay: bool,
        /// Douglas-Peucker tolerance for GeoJSON lines
        #[arg(long)]
        simplify: Option<f64>,
    },
    /// Run a job file (.toml or .json)
    Run {
        #[arg(short, long)]
        job: PathBuf,
    },
    /// Print a JSON schema
    Schema {
        #[arg(value_enum, default_value = "job")]
        kind: SchemaKind,
    },
    /// Write a job file template
    InitJob {
        /// Path to the input image
        #[arg(short, long)]
        image: PathBuf,
        /// Output directory the job will write to
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Where to save the job file
        #[arg(short, long, default_value = "job.toml")]
        job: PathBuf,
    },
}

fn parse_root(value: &str) -> std::result::Result<[i32; 2], String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{value}`"))?;
    let x = x.trim().parse().map_err(|e| format!("invalid x: {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("invalid y: {e}"))?;
    Ok([x, y])
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Capture {
            image,
            output_dir,
            root,
            goal,
            ocr,
            lang,
            overlay,
            simplify,
        } => {
            let mut job = CaptureJob::new(image.to_string_lossy(), output_dir.to_string_lossy());
            job.root = root;
            job.goal = goal;
            job.outputs.overlay = overlay;
            job.outputs.simplify = simplify;
            if ocr {
                job.ocr = Some(TesseractConfig {
                    lang,
                    ..TesseractConfig::default()
                });
            }
            run_job(job).await?;
        }
        Commands::Run { job } => {
            let job = CaptureJob::from_file(&job)?;
            run_job(job).await?;
        }
        Commands::Schema { kind } => {
            let schema = match kind {
                SchemaKind::Job => CaptureJob::schema(),
                SchemaKind::Report => CaptureReport::schema(),
                SchemaKind::Commands => CaptureCommand::schema(),
            };
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Commands::InitJob { image, output_dir, job } => {
            let mut template = CaptureJob::new(image.to_string_lossy(), output_dir.to_string_lossy());
            template.ocr = Some(TesseractConfig::default());
            template.to_file(&job)?;
            info!("Job template saved to: {:?}", job);
        }
    }

    Ok(())
}

async fn run_job(job: CaptureJob) -> Result<()> {
    if job.ocr.is_some() && !ocr::is_available() {
        return Err(eyre!("tesseract was not found on PATH; drop the ocr settings or install it"));
    }

    let token = CancellationToken::new();
    let worker_token = token.clone();
    let mut handle = tokio::task::spawn_blocking(move || job.execute(&worker_token));

    let outcome = tokio::select! {
        joined = &mut handle => joined?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupt received, cancelling capture");
            token.cancel();
            handle.await?
        }
    };
    report(outcome?);
    Ok(())
}

fn report(outcome: JobOutcome) {
    let JobOutcome { report, written } = outcome;
    info!(
        phase = %report.phase,
        words = report.words.len(),
        segments = report.segments.len(),
        "Capture finished"
    );
    if let Some(graph) = &report.graph {
        let labelled = graph.nodes().iter().filter(|n| n.label.is_some()).count();
        info!(nodes = graph.node_count(), edges = graph.edge_count(), labelled, "Phylogeny assembled");
    }
    for path in written {
        info!("Wrote {:?}", path);
    }
}
