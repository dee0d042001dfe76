//! Per-root scan status state machine.
//!
//! `pending → scanning → processing → active`, with `error` reachable from any
//! state. Any state may return to `pending` when a root is re-submitted or
//! recovered after a crash.

use crate::error::Error;
use crate::storage::Database;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderStatus {
    Pending,
    Scanning,
    Processing,
    Active,
    Error,
}

impl FolderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolderStatus::Pending => "pending",
            FolderStatus::Scanning => "scanning",
            FolderStatus::Processing => "processing",
            FolderStatus::Active => "active",
            FolderStatus::Error => "error",
        }
    }

    pub fn can_transition_to(self, next: FolderStatus) -> bool {
        use FolderStatus::*;
        match (self, next) {
            (_, Pending) | (_, Error) => true,
            (Pending, Scanning) => true,
            (Scanning, Processing) => true,
            (Processing, Active) => true,
            (from, to) => from == to,
        }
    }

    /// Roots in any non-active state are treated as interrupted scans.
    pub fn needs_recovery(self) -> bool {
        self != FolderStatus::Active
    }
}

impl fmt::Display for FolderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("unknown folder status '{0}'")]
pub struct ParseStatusError(String);

impl FromStr for FolderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FolderStatus::Pending),
            "scanning" => Ok(FolderStatus::Scanning),
            "processing" => Ok(FolderStatus::Processing),
            "active" => Ok(FolderStatus::Active),
            "error" => Ok(FolderStatus::Error),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl ToSql for FolderStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for FolderStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Move the root at `path` to `next`, rejecting illegal transitions.
///
/// Returns `Ok(false)` when no root is registered under `path`.
pub fn transition(db: &Database, path: &str, next: FolderStatus) -> Result<bool, Error> {
    let Some(folder) = db.get_folder(path)? else {
        return Ok(false);
    };
    if !folder.status.can_transition_to(next) {
        return Err(Error::InvalidTransition {
            from: folder.status,
            to: next,
        });
    }
    db.set_folder_status(path, next)?;
    debug!("Folder {} {} -> {}", path, folder.status, next);
    Ok(true)
}

/// Like [`transition`], but an illegal move is logged and skipped.
///
/// Used by running scans: another scan re-submitting the same root may have
/// reset it to `pending` in the meantime.
pub fn advance(db: &Database, path: &str, next: FolderStatus) -> Result<bool, Error> {
    match transition(db, path, next) {
        Err(Error::InvalidTransition { from, to }) => {
            warn!("Folder {} left in {} (wanted {})", path, from, to);
            Ok(false)
        }
        other => other,
    }
}
