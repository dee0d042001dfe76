use crate::lifecycle::FolderStatus;
use crate::metadata::AudioMetadata;
use chrono::{DateTime, Utc};
use rusqlite::Row;

/// A logical file, identified by the digest of its bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: i64,
    pub content_hash: String,
    pub format: String,
    pub size_bytes: i64,
    pub duration: Option<f64>,
    pub sample_rate: Option<i64>,
    pub bit_depth: Option<i64>,
    pub bit_rate: Option<i64>,
    pub channels: Option<i64>,
    pub alias: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Soft-delete flag. Only indexed files take part in reconciliation.
    pub indexed: bool,
}

pub(crate) const FILE_COLUMNS: &str = "id, content_hash, format, size_bytes, duration, \
     sample_rate, bit_depth, bit_rate, channels, alias, created_at, indexed";

impl FileRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(FileRecord {
            id: row.get(0)?,
            content_hash: row.get(1)?,
            format: row.get(2)?,
            size_bytes: row.get(3)?,
            duration: row.get(4)?,
            sample_rate: row.get(5)?,
            bit_depth: row.get(6)?,
            bit_rate: row.get(7)?,
            channels: row.get(8)?,
            alias: row.get(9)?,
            created_at: row.get(10)?,
            indexed: row.get(11)?,
        })
    }
}

/// One filesystem path known to hold (or to have held) a file's bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: i64,
    pub file_id: i64,
    pub path: String,
    pub file_name: String,
    pub discovered_at: DateTime<Utc>,
    /// `None` means the path was missing at the last reconcile.
    pub last_verified: Option<DateTime<Utc>>,
    pub is_primary: bool,
}

pub(crate) const LOCATION_COLUMNS: &str =
    "id, file_id, path, file_name, discovered_at, last_verified, is_primary";

impl Location {
    pub fn is_missing(&self) -> bool {
        self.last_verified.is_none()
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Location {
            id: row.get(0)?,
            file_id: row.get(1)?,
            path: row.get(2)?,
            file_name: row.get(3)?,
            discovered_at: row.get(4)?,
            last_verified: row.get(5)?,
            is_primary: row.get(6)?,
        })
    }
}

/// A location joined with the identity of the file it belongs to.
#[derive(Debug, Clone)]
pub struct TrackedLocation {
    pub location: Location,
    pub content_hash: String,
}

/// A user-designated scan root.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderRoot {
    pub id: i64,
    pub path: String,
    pub last_scanned: Option<DateTime<Utc>>,
    pub file_count: i64,
    pub status: FolderStatus,
}

pub(crate) const FOLDER_COLUMNS: &str = "id, path, last_scanned, file_count, status";

impl FolderRoot {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(FolderRoot {
            id: row.get(0)?,
            path: row.get(1)?,
            last_scanned: row.get(2)?,
            file_count: row.get(3)?,
            status: row.get(4)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub file_id: i64,
    pub key: String,
    pub value: String,
}

/// Everything the catalog needs to record one newly discovered path.
#[derive(Debug, Clone)]
pub struct IngestRecord {
    pub path: String,
    pub file_name: String,
    pub content_hash: String,
    pub format: String,
    pub size_bytes: i64,
    pub metadata: AudioMetadata,
}

/// What recording an [`IngestRecord`] did to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First sighting of this content: a File, its Location and metadata.
    NewFile { file_id: i64, location_id: i64 },
    /// Known content at a new path.
    NewLocation {
        file_id: i64,
        location_id: i64,
        is_primary: bool,
    },
}

impl IngestOutcome {
    pub fn file_id(&self) -> i64 {
        match self {
            IngestOutcome::NewFile { file_id, .. } | IngestOutcome::NewLocation { file_id, .. } => {
                *file_id
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub files: i64,
    pub locations: i64,
    pub missing_locations: i64,
    pub orphaned_files: i64,
    pub folders: i64,
}
