pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod ingest;
pub mod jobs;
pub mod lifecycle;
pub mod metadata;
pub mod progress;
pub mod reconcile;
pub mod scanner;
pub mod storage;

pub use config::AppConfig;
pub use engine::{ResumeStats, ScanEngine};
pub use error::Error;
pub use ingest::ScanStats;
pub use jobs::{BackgroundJobs, JobHandle, JobOutcome, JobStatus};
pub use lifecycle::FolderStatus;
pub use progress::{Phase, ProgressReporter, ProgressUpdate, SilentReporter};
pub use reconcile::{MissingLocation, ReconcileReport};
pub use storage::Catalog;
