use crate::config::{self, AppConfig};
use crate::error::Error;
use crate::ingest::{IngestionPipeline, ScanStats};
use crate::lifecycle::{self, FolderStatus};
use crate::progress::ProgressReporter;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::scanner::DiscoveryWalker;
use crate::storage::{Catalog, Database};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

/// Outcome of re-submitting roots left behind by an interrupted run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeStats {
    /// Roots found in a non-`active` state.
    pub resumed: usize,
    /// Locations added while re-scanning them.
    pub completed: usize,
    pub errors: usize,
}

/// Entry point for scans, reconciliation and startup recovery.
///
/// Every run opens its own catalog connection, so one engine can be shared
/// between threads.
pub struct ScanEngine {
    catalog: Catalog,
    config: AppConfig,
}

impl ScanEngine {
    pub fn new(catalog: Catalog, config: AppConfig) -> Self {
        Self { catalog, config }
    }

    /// Open the catalog named by `config.database_path`.
    pub fn open(config: AppConfig) -> Result<Self, Error> {
        let catalog = Catalog::open(&config.database_path)?;
        Ok(Self::new(catalog, config))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Register `roots` as `pending` and return them normalised: absolute,
    /// deduplicated, with nested roots folded into their ancestor.
    pub fn submit_roots(&self, roots: &[PathBuf]) -> Result<Vec<PathBuf>, Error> {
        let normalized = config::non_overlapping_directories(
            roots.iter().map(|root| normalize_root(root)).collect(),
        );
        let db = self.catalog.connect()?;
        self.catalog.write(&db, |db| {
            for root in &normalized {
                let key = root.to_string_lossy();
                db.register_folder(&key)?;
                lifecycle::transition(db, &key, FolderStatus::Pending)?;
            }
            Ok(())
        })?;
        Ok(normalized)
    }

    /// Discover and ingest every audio file under `roots`.
    ///
    /// Per-file failures are counted in the returned stats. A failure that
    /// aborts the run leaves every submitted root in `error`.
    pub fn scan(
        &self,
        roots: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanStats, Error> {
        let roots = self.submit_roots(roots)?;
        info!("Processing directories: {:?}", roots);
        let start = Instant::now();

        let db = self.catalog.connect()?;
        match self.run_scan(&db, &roots, reporter) {
            Ok(stats) => {
                info!("Scan finished in {:.2}s", start.elapsed().as_secs_f64());
                Ok(stats)
            }
            Err(e) => {
                error!("Scan failed: {}", e);
                self.fail_roots(&db, &roots);
                Err(e)
            }
        }
    }

    fn run_scan(
        &self,
        db: &Database,
        roots: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanStats, Error> {
        let walker = DiscoveryWalker::new(
            &self.catalog,
            db,
            self.config.normalized_extensions(),
            &self.config.ignore_patterns,
        );
        let discovery = walker.discover(roots, reporter)?;

        let pipeline = IngestionPipeline::new(&self.catalog, db, &self.config);
        pipeline.run(&discovery.candidates, &discovery.valid_roots, reporter)
    }

    fn fail_roots(&self, db: &Database, roots: &[PathBuf]) {
        let result = self.catalog.write(db, |db| {
            for root in roots {
                lifecycle::transition(db, &root.to_string_lossy(), FolderStatus::Error)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            error!("Could not mark scan roots as failed: {}", e);
        }
    }

    /// Check every known location against the filesystem.
    pub fn reconcile(&self, reporter: &dyn ProgressReporter) -> Result<ReconcileReport, Error> {
        let db = self.catalog.connect()?;
        let chunk_size = self.config.reconcile_progress_interval;
        Reconciler::new(&self.catalog, &db, chunk_size).run(reporter)
    }

    /// Re-scan each root whose last scan never reached `active`.
    ///
    /// Roots are retried one at a time; a root that fails again is counted
    /// in `errors` and left in `error` for the next start.
    pub fn resume_incomplete_scans(
        &self,
        reporter: &dyn ProgressReporter,
    ) -> Result<ResumeStats, Error> {
        let db = self.catalog.connect()?;
        let incomplete = db.incomplete_folders()?;
        let mut stats = ResumeStats {
            resumed: incomplete.len(),
            ..ResumeStats::default()
        };
        if incomplete.is_empty() {
            info!("No incomplete scans to resume");
            return Ok(stats);
        }
        info!("Resuming {} incomplete scans", incomplete.len());

        for folder in incomplete {
            info!("Resuming scan of {} (was {})", folder.path, folder.status);
            match self.scan(&[PathBuf::from(&folder.path)], reporter) {
                Ok(scan) => {
                    stats.completed += scan.added;
                    stats.errors += scan.errors;
                }
                Err(e) => {
                    warn!("Resumed scan of {} failed: {}", folder.path, e);
                    stats.errors += 1;
                }
            }
        }
        Ok(stats)
    }
}

fn normalize_root(root: &Path) -> PathBuf {
    fs::canonicalize(root).unwrap_or_else(|_| {
        if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(root))
                .unwrap_or_else(|_| root.to_path_buf())
        }
    })
}
