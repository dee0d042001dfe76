use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "samplevault")]
#[command(about = "Content-addressed catalog for audio sample libraries", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan folders into the catalog (defaults to the configured root_paths)
    Scan {
        paths: Vec<PathBuf>,
    },
    /// Check every known location against the filesystem
    Reconcile,
    /// Re-scan folders whose last scan did not complete
    Resume,
    /// Resume incomplete scans, then reconcile on a schedule until Ctrl-C
    Daemon,
    /// Print catalog counts
    Stats,
    /// List tracked folders and their scan status
    Folders,
    /// Stop tracking a folder; its files stay in the catalog
    RemoveFolder {
        path: String,
    },
    /// Delete a file and all of its locations from the catalog
    DeleteFile {
        id: i64,
    },
    /// Print configuration values
    PrintConfig,
    /// Delete every row from every catalog table
    TruncateDb,
}
