use std::fmt;

/// Pipeline phase a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Processing,
    Reconciling,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Scanning => "scanning",
            Phase::Processing => "processing",
            Phase::Reconciling => "reconciling",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(phase, percent, message)` progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub phase: Phase,
    pub percent: u8,
    pub message: String,
}

/// Trait for reporting scan and reconcile progress.
///
/// The CLI implements it with indicatif bars, background jobs forward into a
/// channel. Closures of the shape `Fn(Phase, u8, &str)` implement it too.
pub trait ProgressReporter: Send + Sync {
    fn on_progress(&self, _phase: Phase, _percent: u8, _message: &str) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

impl<F> ProgressReporter for F
where
    F: Fn(Phase, u8, &str) + Send + Sync,
{
    fn on_progress(&self, phase: Phase, percent: u8, message: &str) {
        self(phase, percent, message)
    }
}

/// Integer percentage of `done` out of `total`, clamped to 100.
pub(crate) fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_percent_bounds() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(0, 4), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(5, 4), 100);
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Mutex::new(Vec::new());
        let reporter = |phase: Phase, pct: u8, msg: &str| {
            seen.lock().unwrap().push((phase, pct, msg.to_string()));
        };
        reporter.on_progress(Phase::Scanning, 50, "Scanned 1/2 folders");
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen, vec![(Phase::Scanning, 50, "Scanned 1/2 folders".to_string())]);
    }
}
