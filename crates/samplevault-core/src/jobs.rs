//! Fire-and-forget execution of scans, reconciles and recovery.
//!
//! Each job runs on Tokio's blocking pool and returns a [`JobHandle`]
//! immediately. Progress events arrive on an unbounded channel and the job
//! status is observable through a watch channel. Jobs cannot be cancelled.

use crate::engine::{ResumeStats, ScanEngine};
use crate::error::Error;
use crate::ingest::ScanStats;
use crate::progress::{Phase, ProgressReporter, ProgressUpdate};
use crate::reconcile::ReconcileReport;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed(String),
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    Scan(Vec<PathBuf>),
    Reconcile,
    Resume,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Scan(roots) => write!(f, "scan of {} roots", roots.len()),
            JobKind::Reconcile => f.write_str("reconcile"),
            JobKind::Resume => f.write_str("resume"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Scan(ScanStats),
    Reconcile(ReconcileReport),
    Resume(ResumeStats),
}

/// Forwards progress events into a job's channel. A dropped receiver is
/// not an error; the job keeps running.
struct ChannelReporter {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ProgressReporter for ChannelReporter {
    fn on_progress(&self, phase: Phase, percent: u8, message: &str) {
        let _ = self.tx.send(ProgressUpdate {
            phase,
            percent,
            message: message.to_string(),
        });
    }
}

/// Marks the job failed if it unwinds before reporting an outcome.
struct StatusGuard(watch::Sender<JobStatus>);

impl Drop for StatusGuard {
    fn drop(&mut self) {
        if !self.0.borrow().is_finished() {
            self.0.send_replace(JobStatus::Failed("job panicked".to_string()));
        }
    }
}

pub struct JobHandle {
    kind: JobKind,
    status: watch::Receiver<JobStatus>,
    progress: mpsc::UnboundedReceiver<ProgressUpdate>,
    task: JoinHandle<Result<JobOutcome, Error>>,
}

impl JobHandle {
    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// A receiver that sees every later status change.
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.clone()
    }

    pub fn progress(&mut self) -> &mut mpsc::UnboundedReceiver<ProgressUpdate> {
        &mut self.progress
    }

    /// Wait for the job and return its outcome.
    pub async fn wait(self) -> Result<JobOutcome, Error> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(Error::Job(e.to_string())),
        }
    }
}

/// Spawns engine work onto Tokio's blocking pool.
///
/// The `spawn_*` methods must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct BackgroundJobs {
    engine: Arc<ScanEngine>,
}

impl BackgroundJobs {
    pub fn new(engine: Arc<ScanEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<ScanEngine> {
        &self.engine
    }

    pub fn spawn_scan(&self, roots: Vec<PathBuf>) -> JobHandle {
        self.spawn(JobKind::Scan(roots))
    }

    pub fn spawn_reconcile(&self) -> JobHandle {
        self.spawn(JobKind::Reconcile)
    }

    pub fn spawn_resume(&self) -> JobHandle {
        self.spawn(JobKind::Resume)
    }

    fn spawn(&self, kind: JobKind) -> JobHandle {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(JobStatus::Queued);
        let engine = Arc::clone(&self.engine);
        let job = kind.clone();

        let task = tokio::task::spawn_blocking(move || {
            let guard = StatusGuard(status_tx);
            guard.0.send_replace(JobStatus::Running);
            info!("Started background {}", job);

            let reporter = ChannelReporter { tx: progress_tx };
            let result = match job {
                JobKind::Scan(roots) => engine.scan(&roots, &reporter).map(JobOutcome::Scan),
                JobKind::Reconcile => engine.reconcile(&reporter).map(JobOutcome::Reconcile),
                JobKind::Resume => engine
                    .resume_incomplete_scans(&reporter)
                    .map(JobOutcome::Resume),
            };

            match &result {
                Ok(_) => {
                    guard.0.send_replace(JobStatus::Completed);
                }
                Err(e) => {
                    error!("Background job failed: {}", e);
                    guard.0.send_replace(JobStatus::Failed(e.to_string()));
                }
            }
            result
        });

        JobHandle {
            kind,
            status: status_rx,
            progress: progress_rx,
            task,
        }
    }
}
