//! Re-verification of every known location against the filesystem.

use crate::error::Error;
use crate::progress::{percent, Phase, ProgressReporter};
use crate::storage::{Catalog, Database, Location, TrackedLocation};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, info, warn};

/// A location found missing during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingLocation {
    pub file_id: i64,
    pub content_hash: String,
    pub location_id: i64,
    pub path: String,
    pub was_primary: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub total_files: i64,
    pub total_locations: usize,
    pub valid_locations: usize,
    pub missing_locations: usize,
    /// Active files with no location verified on disk.
    pub orphaned_files: i64,
    pub missing_details: Vec<MissingLocation>,
}

pub struct Reconciler<'a> {
    catalog: &'a Catalog,
    db: &'a Database,
    chunk_size: usize,
}

impl<'a> Reconciler<'a> {
    /// `chunk_size` locations are committed per transaction and a progress
    /// event is emitted after each full chunk.
    pub fn new(catalog: &'a Catalog, db: &'a Database, chunk_size: usize) -> Self {
        Self {
            catalog,
            db,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<ReconcileReport, Error> {
        info!("Starting file reconciliation...");
        let tracked = self.db.tracked_locations()?;
        let total = tracked.len();
        info!("Found {} file locations to verify", total);

        let mut report = ReconcileReport {
            total_locations: total,
            ..ReconcileReport::default()
        };
        let mut processed = 0;

        for chunk in tracked.chunks(self.chunk_size) {
            let checks: Vec<(&TrackedLocation, bool)> = chunk
                .iter()
                .map(|t| (t, Path::new(&t.location.path).exists()))
                .collect();

            let now = Utc::now();
            self.catalog.write(self.db, |db| {
                for (tracked, exists) in &checks {
                    apply_check(db, tracked, *exists, now, &mut report)?;
                }
                Ok(())
            })?;

            processed += chunk.len();
            if chunk.len() == self.chunk_size {
                reporter.on_progress(
                    Phase::Reconciling,
                    percent(processed, total),
                    &format!("Checked {}/{} locations", processed, total),
                );
            }
        }

        report.orphaned_files = self.db.count_orphaned_files()?;
        report.total_files = self.db.count_active_files()?;

        info!(
            "Reconciliation complete: files={} locations={} valid={} missing={} orphaned={}",
            report.total_files,
            report.total_locations,
            report.valid_locations,
            report.missing_locations,
            report.orphaned_files
        );
        Ok(report)
    }
}

fn apply_check(
    db: &Database,
    tracked: &TrackedLocation,
    exists: bool,
    now: DateTime<Utc>,
    report: &mut ReconcileReport,
) -> Result<(), Error> {
    let location = &tracked.location;
    if exists {
        db.mark_location_verified(location.id, now)?;
        report.valid_locations += 1;
        return Ok(());
    }

    db.mark_location_missing(location.id)?;
    report.missing_locations += 1;
    report.missing_details.push(MissingLocation {
        file_id: location.file_id,
        content_hash: tracked.content_hash.clone(),
        location_id: location.id,
        path: location.path.clone(),
        was_primary: location.is_primary,
    });
    debug!("Missing file: {}", location.path);

    if location.is_primary {
        promote_alternate(db, location, now)?;
    }
    Ok(())
}

/// Hand the primary flag to the oldest other location still on disk.
fn promote_alternate(db: &Database, missing: &Location, now: DateTime<Utc>) -> Result<(), Error> {
    let alternate = db
        .alternate_locations(missing.file_id, missing.id)?
        .into_iter()
        .find(|alt| Path::new(&alt.path).exists());

    match alternate {
        Some(alt) => {
            db.promote_location(missing.id, alt.id)?;
            db.mark_location_verified(alt.id, now)?;
            info!(
                "Promoted location {} to primary for file {}",
                alt.id, missing.file_id
            );
        }
        None => warn!(
            "File {} has no location left on disk to promote",
            missing.file_id
        ),
    }
    Ok(())
}
