use crate::config::AppConfig;
use crate::error::Error;
use crate::hasher;
use crate::lifecycle::{self, FolderStatus};
use crate::metadata;
use crate::progress::{percent, Phase, ProgressReporter};
use crate::storage::{Catalog, Database, IngestOutcome, IngestRecord};
use chrono::Utc;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Aggregate result of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub total: usize,
    /// New locations recorded, whether or not their content was new.
    pub added: usize,
    /// Paths already known to the catalog.
    pub skipped: usize,
    pub errors: usize,
}

impl ScanStats {
    pub fn merge(&mut self, other: ScanStats) {
        self.total += other.total;
        self.added += other.added;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

/// One prepared candidate waiting to be written.
type Prepared<'p> = (&'p Path, Result<IngestRecord, Error>);

/// Turns discovered paths into catalog Files and Locations.
///
/// Candidates are hashed and read for tags on the rayon pool in steps of
/// `progress_interval`, keeping discovery order, with a progress event after
/// each full step. Prepared records are written `batch_size` at a time in one
/// transaction, each file inside its own savepoint so a bad file never takes
/// the batch down with it.
pub struct IngestionPipeline<'a> {
    catalog: &'a Catalog,
    db: &'a Database,
    config: &'a AppConfig,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(catalog: &'a Catalog, db: &'a Database, config: &'a AppConfig) -> Self {
        Self {
            catalog,
            db,
            config,
        }
    }

    pub fn run(
        &self,
        candidates: &[PathBuf],
        roots: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanStats, Error> {
        let total = candidates.len();
        let mut stats = ScanStats {
            total,
            ..ScanStats::default()
        };
        let mut known = self.db.known_location_paths()?;
        let batch_size = self.config.batch_size.max(1);
        let interval = self.config.progress_interval.max(1);
        let chunk_size = self.config.hash_chunk_size;
        let mut buffer: Vec<Prepared<'_>> = Vec::with_capacity(batch_size);
        let mut processed = 0;

        for step in candidates.chunks(interval) {
            let mut pending: Vec<(&Path, &str)> = Vec::with_capacity(step.len());
            for path in step {
                match path.to_str() {
                    Some(key) if known.contains(key) => stats.skipped += 1,
                    Some(key) => {
                        known.insert(key.to_string());
                        pending.push((path.as_path(), key));
                    }
                    None => {
                        error!("Skipping non UTF-8 path {}", path.display());
                        stats.errors += 1;
                    }
                }
            }

            let prepared: Vec<Prepared<'_>> = pending
                .par_iter()
                .map(|&(path, key)| (path, prepare(path, key, chunk_size)))
                .collect();
            buffer.extend(prepared);

            while buffer.len() >= batch_size {
                let batch: Vec<Prepared<'_>> = buffer.drain(..batch_size).collect();
                self.flush(batch, &mut stats)?;
            }

            processed += step.len();
            if step.len() == interval {
                reporter.on_progress(
                    Phase::Processing,
                    percent(processed, total),
                    &format!("Processed {}/{} files", processed, total),
                );
            }
        }
        self.flush(buffer, &mut stats)?;

        self.finalize_roots(roots)?;

        reporter.on_progress(
            Phase::Processing,
            100,
            &format!(
                "Complete: {} added, {} skipped, {} errors",
                stats.added, stats.skipped, stats.errors
            ),
        );
        info!(
            "Processing complete: total={} added={} skipped={} errors={}",
            stats.total, stats.added, stats.skipped, stats.errors
        );
        Ok(stats)
    }

    fn flush(&self, batch: Vec<Prepared<'_>>, stats: &mut ScanStats) -> Result<(), Error> {
        if batch.is_empty() {
            return Ok(());
        }
        let size = batch.len();
        let now = Utc::now();
        let (added, errors) = self.catalog.write(self.db, |db| {
            let mut added = 0;
            let mut errors = 0;
            for (path, record) in batch {
                let outcome = record
                    .and_then(|record| db.with_savepoint(|db| db.record_discovery(&record, now)));
                match outcome {
                    Ok(IngestOutcome::NewFile { file_id, .. }) => {
                        debug!("New file {} at {}", file_id, path.display());
                        added += 1;
                    }
                    Ok(IngestOutcome::NewLocation {
                        file_id,
                        is_primary,
                        ..
                    }) => {
                        debug!(
                            "New location for file {} at {} (primary: {})",
                            file_id,
                            path.display(),
                            is_primary
                        );
                        added += 1;
                    }
                    Err(e) => {
                        error!("Error processing {}: {}", path.display(), e);
                        errors += 1;
                    }
                }
            }
            Ok((added, errors))
        })?;
        stats.added += added;
        stats.errors += errors;
        debug!("Flushed batch of {} paths", size);
        Ok(())
    }

    /// Recount every valid root and mark it `active`.
    fn finalize_roots(&self, roots: &[PathBuf]) -> Result<(), Error> {
        let now = Utc::now();
        self.catalog.write(self.db, |db| {
            for root in roots {
                let key = root.to_string_lossy();
                if db.get_folder(&key)?.is_none() {
                    continue;
                }
                db.refresh_folder_stats(&key, now)?;
                lifecycle::advance(db, &key, FolderStatus::Active)?;
            }
            Ok(())
        })
    }
}

/// Stat, hash and read the tags of one file.
fn prepare(path: &Path, key: &str, chunk_size: usize) -> Result<IngestRecord, Error> {
    let size_bytes = fs::metadata(path)
        .map_err(|e| Error::unreadable(path, e))?
        .len();
    let content_hash = hasher::hash_file(path, chunk_size)?;
    let metadata = metadata::extract(path);

    let file_name = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let size_bytes = i64::try_from(size_bytes)
        .map_err(|e| Error::unreadable(path, io::Error::new(io::ErrorKind::InvalidData, e)))?;

    Ok(IngestRecord {
        path: key.to_string(),
        file_name,
        content_hash,
        format,
        size_bytes,
        metadata,
    })
}
