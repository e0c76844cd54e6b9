//! Episode Ingestion CLI
//!
//! Reads every run of a ray-tracing simulation and commits its episodes.
//!
//! Usage:
//!   ingest-episodes results/ --database episode.db \
//!                   --report results/ingest_report.json

use anyhow::Result;
use clap::Parser;
use episode_ingest::{IngestError, IngestReport, Ingestion, RunLayout, RunLocator};
use episode_store::{MemorySession, Session, SqliteSession};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "ingest-episodes",
    about = "Ingest ray-tracing simulation runs into an episode database"
)]
struct Args {
    /// Directory holding run00000, run00001, ...
    results_dir: PathBuf,

    /// SQLite database file
    #[arg(short, long, default_value = "episode.db")]
    database: PathBuf,

    /// Runs were generated with detailed 3D models
    #[arg(long)]
    detailed_models: bool,

    /// Paths file name inside the study directory
    #[arg(long)]
    paths_file_name: Option<String>,

    /// Study directory inside each run
    #[arg(long)]
    study_dir: Option<String>,

    /// Write a JSON ingestion report
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Validate and assemble without writing the database
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn layout(args: &Args) -> RunLayout {
    let mut layout = RunLayout::new();
    if args.detailed_models {
        layout = layout.detailed_models();
    }
    if let Some(name) = &args.paths_file_name {
        layout = layout.paths_file_name(name.clone());
    }
    if let Some(dir) = &args.study_dir {
        layout = layout.study_dir(dir.clone());
    }
    layout
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("Ray-tracing Episode Ingestion");
    info!("{}", "=".repeat(60));

    let session: Box<dyn Session> = if args.dry_run {
        info!("Dry run: nothing is written to {:?}", args.database);
        Box::new(MemorySession::new())
    } else {
        info!("Database: {:?}", args.database);
        Box::new(SqliteSession::open(&args.database)?)
    };

    let layout = layout(&args);
    info!("Object file: {}", layout.object_file_name);
    let locator = RunLocator::new(&args.results_dir, layout);

    let mut ingestion = Ingestion::new(locator, session);
    let report = match ingestion.run() {
        Ok(report) => report,
        Err(e) => {
            if let IngestError::MissingCompanionFile { .. } = e {
                error!("Did you ask the ray tracer to generate the impulse response (cir) file?");
            }
            let partial = ingestion.report();
            warn!(
                "{} episode(s) committed before the failure",
                partial.episodes.len()
            );
            return Err(e.into());
        }
    };

    print_summary(&report);

    if let Some(path) = &args.report {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &report)?;
        info!("Wrote report to {:?}", path);
    }

    Ok(())
}

fn print_summary(report: &IngestReport) {
    info!("{}", "=".repeat(60));
    info!("Processed {} scenes (RT simulations)", report.runs_processed);
    info!("  Episodes committed: {}", report.episodes.len());
    info!("  Scenes committed:   {}", report.total_scenes());
    info!("  Receivers:          {}", report.total_receivers);
    info!("  Rays:               {}", report.total_rays);
    for (i, episode) in report.episodes.iter().enumerate() {
        info!(
            "  Episode {}: {} scenes from {:?} (time={} ms, Ts={} s)",
            i,
            episode.scenes,
            episode.insite_path,
            episode.simulation_time_begin,
            episode.sampling_time
        );
    }
    info!("{}", "=".repeat(60));
}
