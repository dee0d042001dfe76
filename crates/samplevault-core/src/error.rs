use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::FolderStatus;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Unreadable file {}: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scan root {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: &'static str },

    #[error("Location {path} already belongs to file {file_id}")]
    LocationConflict { path: String, file_id: i64 },

    #[error("Illegal folder transition {from} -> {to}")]
    InvalidTransition { from: FolderStatus, to: FolderStatus },

    #[error("Catalog writer lock poisoned")]
    WriterPoisoned,

    #[error("Background job failed: {0}")]
    Job(String),
}

impl Error {
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::UnreadableFile {
            path: path.into(),
            source,
        }
    }
}
