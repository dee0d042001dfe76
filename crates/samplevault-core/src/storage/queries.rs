use super::models::*;
use super::sqlite::Database;
use crate::error::Error;
use crate::lifecycle::FolderStatus;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Result};
use std::collections::HashSet;
use std::path::MAIN_SEPARATOR;
use tracing::debug;

impl Database {
    // ── Files ────────────────────────────────────────────────────

    pub fn find_file_by_hash(&self, content_hash: &str) -> Result<Option<FileRecord>> {
        self.connection()
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM files WHERE content_hash = ?1"),
                params![content_hash],
                FileRecord::from_row,
            )
            .optional()
    }

    pub fn get_file(&self, file_id: i64) -> Result<Option<FileRecord>> {
        self.connection()
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"),
                params![file_id],
                FileRecord::from_row,
            )
            .optional()
    }

    /// Explicit user deletion. Locations and metadata go with the file.
    pub fn delete_file(&self, file_id: i64) -> Result<bool> {
        let deleted = self
            .connection()
            .execute("DELETE FROM files WHERE id = ?1", params![file_id])?;
        Ok(deleted > 0)
    }

    pub fn count_active_files(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM files WHERE indexed = 1", [], |row| {
                row.get(0)
            })
    }

    /// Active files with no location currently verified on disk.
    pub fn count_orphaned_files(&self) -> Result<i64> {
        self.connection().query_row(
            "SELECT COUNT(*) FROM files f \
             WHERE f.indexed = 1 AND NOT EXISTS ( \
                 SELECT 1 FROM locations l \
                 WHERE l.file_id = f.id AND l.last_verified IS NOT NULL)",
            [],
            |row| row.get(0),
        )
    }

    // ── Metadata ─────────────────────────────────────────────────

    fn metadata_key_id(&self, key: &str) -> Result<i64> {
        self.connection().execute(
            "INSERT INTO metadata_keys (key) VALUES (?1) ON CONFLICT(key) DO NOTHING",
            params![key],
        )?;
        self.connection().query_row(
            "SELECT id FROM metadata_keys WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
    }

    /// Attach `key = value` to a file unless the file already has that key.
    pub fn insert_metadata(&self, file_id: i64, key: &str, value: &str) -> Result<bool> {
        let key_id = self.metadata_key_id(key)?;
        let inserted = self.connection().execute(
            "INSERT OR IGNORE INTO file_metadata (file_id, metadata_key_id, value) \
             VALUES (?1, ?2, ?3)",
            params![file_id, key_id, value],
        )?;
        Ok(inserted > 0)
    }

    pub fn metadata_for_file(&self, file_id: i64) -> Result<Vec<MetadataEntry>> {
        let mut stmt = self.connection().prepare_cached(
            "SELECT fm.file_id, mk.key, fm.value \
             FROM file_metadata fm JOIN metadata_keys mk ON mk.id = fm.metadata_key_id \
             WHERE fm.file_id = ?1 ORDER BY mk.key",
        )?;
        let entries = stmt
            .query_map(params![file_id], |row| {
                Ok(MetadataEntry {
                    file_id: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    // ── Locations ────────────────────────────────────────────────

    /// Every recorded location path, missing ones included.
    pub fn known_location_paths(&self) -> Result<HashSet<String>> {
        let mut stmt = self.connection().prepare("SELECT path FROM locations")?;
        let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<HashSet<String>>>()?;
        Ok(paths)
    }

    pub fn get_location_by_path(&self, path: &str) -> Result<Option<Location>> {
        self.connection()
            .query_row(
                &format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE path = ?1"),
                params![path],
                Location::from_row,
            )
            .optional()
    }

    pub fn get_location(&self, location_id: i64) -> Result<Option<Location>> {
        self.connection()
            .query_row(
                &format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1"),
                params![location_id],
                Location::from_row,
            )
            .optional()
    }

    /// Locations of a file, oldest discovery first.
    pub fn locations_for_file(&self, file_id: i64) -> Result<Vec<Location>> {
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE file_id = ?1 \
             ORDER BY discovered_at ASC, id ASC"
        ))?;
        let locations = stmt
            .query_map(params![file_id], Location::from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(locations)
    }

    fn has_verified_primary(&self, file_id: i64) -> Result<bool> {
        self.connection().query_row(
            "SELECT EXISTS (SELECT 1 FROM locations \
             WHERE file_id = ?1 AND is_primary = 1 AND last_verified IS NOT NULL)",
            params![file_id],
            |row| row.get(0),
        )
    }

    /// Record one newly discovered path.
    ///
    /// Resolves identity by content hash: unseen content creates the File
    /// (plus metadata), known content only gains a Location. The new Location
    /// is primary only when the File has no verified primary; stale
    /// (missing) primaries are demoted at the same time.
    ///
    /// Callers wrap this in a transaction; it must not be called outside one
    /// if File and Location are to land together.
    pub fn record_discovery(
        &self,
        record: &IngestRecord,
        now: DateTime<Utc>,
    ) -> std::result::Result<IngestOutcome, Error> {
        if let Some(existing) = self.get_location_by_path(&record.path)? {
            return Err(Error::LocationConflict {
                path: record.path.clone(),
                file_id: existing.file_id,
            });
        }

        let created = self.connection().execute(
            "INSERT INTO files \
             (content_hash, format, size_bytes, duration, sample_rate, bit_depth, \
              bit_rate, channels, created_at, indexed) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1) \
             ON CONFLICT(content_hash) DO NOTHING",
            params![
                record.content_hash,
                record.format,
                record.size_bytes,
                record.metadata.duration,
                record.metadata.sample_rate,
                record.metadata.bit_depth,
                record.metadata.bit_rate,
                record.metadata.channels,
                now,
            ],
        )? == 1;

        let file_id: i64 = if created {
            self.connection().last_insert_rowid()
        } else {
            self.connection().query_row(
                "SELECT id FROM files WHERE content_hash = ?1",
                params![record.content_hash],
                |row| row.get(0),
            )?
        };

        if created {
            for (key, value) in record.metadata.tag_entries() {
                self.insert_metadata(file_id, key, &value)?;
            }
        }

        let is_primary = !self.has_verified_primary(file_id)?;
        if is_primary {
            self.connection().execute(
                "UPDATE locations SET is_primary = 0 \
                 WHERE file_id = ?1 AND is_primary = 1 AND last_verified IS NULL",
                params![file_id],
            )?;
        }

        self.connection().execute(
            "INSERT INTO locations \
             (file_id, path, file_name, discovered_at, last_verified, is_primary) \
             VALUES (?1, ?2, ?3, ?4, ?4, ?5)",
            params![file_id, record.path, record.file_name, now, is_primary],
        )?;
        let location_id = self.connection().last_insert_rowid();

        Ok(if created {
            IngestOutcome::NewFile {
                file_id,
                location_id,
            }
        } else {
            IngestOutcome::NewLocation {
                file_id,
                location_id,
                is_primary,
            }
        })
    }

    /// Locations of active files in reconcile order: by file, primary first.
    pub fn tracked_locations(&self) -> Result<Vec<TrackedLocation>> {
        let mut stmt = self.connection().prepare(
            "SELECT l.id, l.file_id, l.path, l.file_name, l.discovered_at, \
                    l.last_verified, l.is_primary, f.content_hash \
             FROM locations l JOIN files f ON f.id = l.file_id \
             WHERE f.indexed = 1 \
             ORDER BY l.file_id ASC, l.is_primary DESC, l.id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TrackedLocation {
                    location: Location::from_row(row)?,
                    content_hash: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn mark_location_verified(&self, location_id: i64, now: DateTime<Utc>) -> Result<()> {
        self.connection().execute(
            "UPDATE locations SET last_verified = ?1 WHERE id = ?2",
            params![now, location_id],
        )?;
        Ok(())
    }

    pub fn mark_location_missing(&self, location_id: i64) -> Result<()> {
        self.connection().execute(
            "UPDATE locations SET last_verified = NULL WHERE id = ?1",
            params![location_id],
        )?;
        Ok(())
    }

    /// Other locations of `file_id`, oldest discovery first.
    pub fn alternate_locations(&self, file_id: i64, exclude_id: i64) -> Result<Vec<Location>> {
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations \
             WHERE file_id = ?1 AND id != ?2 \
             ORDER BY discovered_at ASC, id ASC"
        ))?;
        let locations = stmt
            .query_map(params![file_id, exclude_id], Location::from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(locations)
    }

    /// Move the primary flag from `demoted_id` to `promoted_id`.
    pub fn promote_location(&self, demoted_id: i64, promoted_id: i64) -> Result<()> {
        self.connection().execute(
            "UPDATE locations SET is_primary = 0 WHERE id = ?1",
            params![demoted_id],
        )?;
        self.connection().execute(
            "UPDATE locations SET is_primary = 1 WHERE id = ?1",
            params![promoted_id],
        )?;
        Ok(())
    }

    // ── Folders ──────────────────────────────────────────────────

    /// Track `path` as a scan root; an existing root keeps its state.
    pub fn register_folder(&self, path: &str) -> Result<FolderRoot> {
        self.connection().execute(
            "INSERT OR IGNORE INTO folders (path, status) VALUES (?1, ?2)",
            params![path, FolderStatus::Pending],
        )?;
        self.connection().query_row(
            &format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE path = ?1"),
            params![path],
            FolderRoot::from_row,
        )
    }

    pub fn get_folder(&self, path: &str) -> Result<Option<FolderRoot>> {
        self.connection()
            .query_row(
                &format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE path = ?1"),
                params![path],
                FolderRoot::from_row,
            )
            .optional()
    }

    pub fn list_folders(&self) -> Result<Vec<FolderRoot>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders ORDER BY last_scanned DESC, path ASC"
        ))?;
        let folders = stmt
            .query_map([], FolderRoot::from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(folders)
    }

    /// Roots whose last scan never reached `active`.
    pub fn incomplete_folders(&self) -> Result<Vec<FolderRoot>> {
        Ok(self
            .list_folders()?
            .into_iter()
            .filter(|folder| folder.status.needs_recovery())
            .collect())
    }

    pub fn set_folder_status(&self, path: &str, status: FolderStatus) -> Result<usize> {
        self.connection().execute(
            "UPDATE folders SET status = ?1 WHERE path = ?2",
            params![status, path],
        )
    }

    /// Recount distinct active files verified under `path` and stamp the scan time.
    pub fn refresh_folder_stats(&self, path: &str, now: DateTime<Utc>) -> Result<i64> {
        let prefix = if path.ends_with(MAIN_SEPARATOR) {
            path.to_string()
        } else {
            format!("{path}{MAIN_SEPARATOR}")
        };
        let file_count: i64 = self.connection().query_row(
            "SELECT COUNT(DISTINCT l.file_id) \
             FROM locations l JOIN files f ON f.id = l.file_id \
             WHERE f.indexed = 1 AND l.last_verified IS NOT NULL \
               AND (l.path = ?1 OR substr(l.path, 1, length(?2)) = ?2)",
            params![path, prefix],
            |row| row.get(0),
        )?;
        self.connection().execute(
            "UPDATE folders SET file_count = ?1, last_scanned = ?2 WHERE path = ?3",
            params![file_count, now, path],
        )?;
        debug!("Folder {} now holds {} files", path, file_count);
        Ok(file_count)
    }

    /// Stop tracking a root. Its files and locations stay in the catalog.
    pub fn remove_folder(&self, path: &str) -> Result<bool> {
        let removed = self
            .connection()
            .execute("DELETE FROM folders WHERE path = ?1", params![path])?;
        Ok(removed > 0)
    }

    // ── Summary ──────────────────────────────────────────────────

    pub fn catalog_stats(&self) -> Result<CatalogStats> {
        let (locations, missing_locations) = self.connection().query_row(
            "SELECT COUNT(*), COALESCE(SUM(last_verified IS NULL), 0) FROM locations",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let folders =
            self.connection()
                .query_row("SELECT COUNT(*) FROM folders", [], |row| row.get(0))?;
        Ok(CatalogStats {
            files: self.count_active_files()?,
            locations,
            missing_locations,
            orphaned_files: self.count_orphaned_files()?,
            folders,
        })
    }
}
