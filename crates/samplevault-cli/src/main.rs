mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use samplevault_core::engine::ResumeStats;
use samplevault_core::{
    AppConfig, BackgroundJobs, FolderStatus, JobHandle, JobOutcome, ReconcileReport, ScanEngine,
    ScanStats,
};
use tokio::{signal, time};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match samplevault_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return Ok(());
    };

    if let Err(err) = run(command, config).await {
        error!("Error: {:#}", err);
        process::exit(1);
    }

    Ok(())
}

async fn run(command: Commands, config: AppConfig) -> anyhow::Result<()> {
    if let Commands::PrintConfig = command {
        println!("Configuration: {:#?}", config);
        return Ok(());
    }

    let engine = Arc::new(ScanEngine::open(config).context("opening the catalog")?);
    let jobs = BackgroundJobs::new(Arc::clone(&engine));

    match command {
        Commands::Scan { paths } => {
            let roots = if paths.is_empty() {
                engine
                    .config()
                    .root_paths
                    .iter()
                    .map(PathBuf::from)
                    .collect()
            } else {
                paths
            };
            if roots.is_empty() {
                bail!("no folders given and no root_paths configured");
            }
            report(&follow(jobs.spawn_scan(roots)).await?);
        }
        Commands::Reconcile => report(&follow(jobs.spawn_reconcile()).await?),
        Commands::Resume => report(&follow(jobs.spawn_resume()).await?),
        Commands::Daemon => run_daemon(&jobs, engine.config().reconcile_interval_secs).await?,
        Commands::Stats => {
            let db = engine.catalog().connect()?;
            let stats = db.catalog_stats()?;
            info!(
                "{} files, {} locations ({} missing), {} orphaned files, {} folders",
                format!("{}", stats.files).green(),
                format!("{}", stats.locations).green(),
                format!("{}", stats.missing_locations).yellow(),
                format!("{}", stats.orphaned_files).red(),
                format!("{}", stats.folders).cyan(),
            );
        }
        Commands::Folders => {
            let db = engine.catalog().connect()?;
            for folder in db.list_folders()? {
                let status = match folder.status {
                    FolderStatus::Active => folder.status.as_str().green(),
                    FolderStatus::Error => folder.status.as_str().red(),
                    _ => folder.status.as_str().yellow(),
                };
                let scanned = folder
                    .last_scanned
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{:<10} {:>7} files  last scanned {}  {}",
                    status, folder.file_count, scanned, folder.path
                );
            }
        }
        Commands::RemoveFolder { path } => {
            let db = engine.catalog().connect()?;
            if engine.catalog().write(&db, |db| Ok(db.remove_folder(&path)?))? {
                info!("Stopped tracking {}", path);
            } else {
                warn!("No tracked folder at {}", path);
            }
        }
        Commands::DeleteFile { id } => {
            let db = engine.catalog().connect()?;
            if engine.catalog().write(&db, |db| Ok(db.delete_file(id)?))? {
                info!("Deleted file {} and its locations", id);
            } else {
                warn!("No file with id {}", id);
            }
        }
        Commands::TruncateDb => {
            match prompt_confirm(
                "Are you SURE you want to COMPLETELY DELETE the catalog?",
                Some(false),
            ) {
                Ok(true) => {
                    let db = engine.catalog().connect()?;
                    engine.catalog().write(&db, |db| Ok(db.clear_all()?))?;
                    println!("All tables truncated");
                }
                _ => process::exit(0),
            }
        }
        Commands::PrintConfig => {}
    }

    Ok(())
}

/// Startup recovery, then a reconcile every `interval_secs` until Ctrl-C.
async fn run_daemon(jobs: &BackgroundJobs, interval_secs: u64) -> anyhow::Result<()> {
    report(&follow(jobs.spawn_resume()).await?);

    if interval_secs == 0 {
        info!("Scheduled reconcile disabled; waiting for Ctrl-C");
        signal::ctrl_c().await?;
        return Ok(());
    }

    let mut ticker = time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match follow(jobs.spawn_reconcile()).await {
                    Ok(outcome) => report(&outcome),
                    Err(err) => error!("Scheduled reconcile failed: {:#}", err),
                }
            }
            _ = signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }
    Ok(())
}

/// Render a job's progress until it finishes, then return its outcome.
async fn follow(mut handle: JobHandle) -> anyhow::Result<JobOutcome> {
    let reporter = CliReporter::new();
    while let Some(update) = handle.progress().recv().await {
        reporter.update(&update);
    }
    reporter.finish();
    let kind = handle.kind().to_string();
    handle.wait().await.with_context(|| format!("{} failed", kind))
}

fn report(outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Scan(stats) => report_scan(stats),
        JobOutcome::Reconcile(report) => report_reconcile(report),
        JobOutcome::Resume(stats) => report_resume(stats),
    }
}

fn report_scan(stats: &ScanStats) {
    info!(
        "{} files seen: {} added, {} skipped, {} errors",
        stats.total,
        format!("{}", stats.added).green(),
        format!("{}", stats.skipped).cyan(),
        format!("{}", stats.errors).red(),
    );
}

fn report_reconcile(report: &ReconcileReport) {
    info!(
        "{} files, {} locations: {} valid, {} missing, {} orphaned files",
        report.total_files,
        report.total_locations,
        format!("{}", report.valid_locations).green(),
        format!("{}", report.missing_locations).yellow(),
        format!("{}", report.orphaned_files).red(),
    );
    for missing in &report.missing_details {
        let marker = if missing.was_primary { " (primary)" } else { "" };
        warn!("Missing: {}{}", missing.path, marker);
    }
}

fn report_resume(stats: &ResumeStats) {
    info!(
        "Resumed {} folders: {} added, {} errors",
        stats.resumed,
        format!("{}", stats.completed).green(),
        format!("{}", stats.errors).red(),
    );
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
