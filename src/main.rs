mod error;

use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use imgbatch_config::Config;
use imgbatch_history::{Database, EntryId, HistoryEntry, Repository};
use imgbatch_pipeline::intake::IntakeRecord;
use imgbatch_pipeline::{Intake, IntakeOptions, UndoEngine};
use imgbatch_storage::FsHandle;
use imgbatch_storage::backend::{DryRunFileSystem, LocalFileSystem};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imgbatch", version, about = "Batch image intake, processing history and undo")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate images and read their metadata
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List recorded batch runs, newest first
    History,
    /// Restore the originals overwritten by a batch run
    Undo {
        id: i64,
        /// Report what would be restored without touching any file
        #[arg(long)]
        dry_run: bool,
    },
    /// Forget every recorded batch run (backup files are kept)
    ClearHistory,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let fs: FsHandle = Arc::new(LocalFileSystem::default());
    match cli.command {
        Command::Ingest { paths } => ingest(&config, fs, paths).await,
        Command::History => {
            let db = open(&config).await?;
            let entries = Repository::from(&db).list().await.or_raise(|| ErrorKind::History);
            db.close().await;
            print_history(&entries?);
            Ok(())
        },
        Command::Undo { id, dry_run } => {
            let db = open(&config).await?;
            let (fs, history): (FsHandle, _) = match dry_run {
                true => (Arc::new(DryRunFileSystem::new(fs)), Repository::new(db.pool().clone(), true)),
                false => (fs, Repository::from(&db)),
            };
            let report = UndoEngine::new(fs, history).undo(EntryId(id), None).await.or_raise(|| ErrorKind::Undo);
            db.close().await;
            let report = report?;
            let verb = if dry_run { "Would restore" } else { "Restored" };
            for path in &report.restored {
                println!("{verb} {}", path.display());
            }
            println!("{verb} {} file(s) from entry {}", report.restored.len(), report.entry);
            Ok(())
        },
        Command::ClearHistory => {
            let db = open(&config).await?;
            let removed = Repository::from(&db).clear().await.or_raise(|| ErrorKind::History);
            db.close().await;
            println!("Removed {} history entries", removed?);
            Ok(())
        },
    }
}

async fn open(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database.parent() {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Database)?;
    }
    Database::connect(&config.database).await.or_raise(|| ErrorKind::Database)
}

async fn ingest(config: &Config, fs: FsHandle, paths: Vec<PathBuf>) -> Result<()> {
    let paths = paths
        .into_iter()
        .map(|p| std::path::absolute(&p).or_raise(|| ErrorKind::Path))
        .collect::<Result<Vec<_>>>()?;
    let intake = Intake::new(fs, IntakeOptions::from(config));
    let summary = intake
        .ingest(paths, |records| records.iter().for_each(print_record), |progress| {
            tracing::debug!(current = progress.current, total = progress.total, "Intake progress");
        })
        .await
        .or_raise(|| ErrorKind::Intake)?;
    println!("Accepted {} of {} file(s)", summary.accepted, summary.total);
    Ok(())
}

fn print_record(record: &IntakeRecord) {
    let dimensions = match record.dimensions {
        Some(d) => format!("{}x{}", d.width, d.height),
        None => "?x?".to_string(),
    };
    println!("{}\t{} bytes\t{}", record.path.display(), record.size, dimensions);
}

fn print_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("No history");
        return;
    }
    for entry in entries {
        let when = entry.timestamp.format(&Rfc3339).unwrap_or_else(|_| entry.timestamp.to_string());
        let format = entry.output_format.map(|f| format!(" -> {f}")).unwrap_or_default();
        let undo = if entry.can_undo() { "undoable" } else { "-" };
        println!(
            "{}\t{when}\t{}{format}\t{}/{} ok, {} failed\t{} -> {} bytes\t{undo}",
            entry.id,
            entry.operation_mode,
            entry.success_count,
            entry.files_processed,
            entry.failed_count,
            entry.total_size_before,
            entry.total_size_after,
        );
    }
}
