use crate::error::Error;
use crate::lifecycle::{self, FolderStatus};
use crate::progress::{percent, Phase, ProgressReporter};
use crate::storage::{Catalog, Database};
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Result of walking a set of scan roots.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Matching files, in discovery order.
    pub candidates: Vec<PathBuf>,
    pub valid_roots: Vec<PathBuf>,
    pub invalid_roots: Vec<PathBuf>,
}

/// Recursive enumeration of audio files beneath scan roots.
///
/// Hidden directories (name starting with `.`) and paths matching an ignore
/// glob are pruned. Only regular files whose extension is on the allow-list
/// are returned; symlinks are not followed.
pub struct DiscoveryWalker<'a> {
    catalog: &'a Catalog,
    db: &'a Database,
    extensions: Vec<String>,
    ignore_patterns: Vec<Pattern>,
}

impl<'a> DiscoveryWalker<'a> {
    pub fn new(
        catalog: &'a Catalog,
        db: &'a Database,
        extensions: Vec<String>,
        ignore_globs: &[String],
    ) -> Self {
        let ignore_patterns = ignore_globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();
        Self {
            catalog,
            db,
            extensions,
            ignore_patterns,
        }
    }

    /// Walk every root, moving each valid one `scanning` → `processing`.
    /// Invalid roots are logged, marked `error` and skipped.
    pub fn discover(
        &self,
        roots: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<Discovery, Error> {
        let mut discovery = Discovery::default();
        let total_roots = roots.len();

        for (idx, root) in roots.iter().enumerate() {
            let key = root.to_string_lossy();

            if let Err(e) = check_root(root) {
                warn!("Skipping scan root: {}", e);
                self.set_status(&key, FolderStatus::Error)?;
                discovery.invalid_roots.push(root.clone());
                continue;
            }

            self.set_status(&key, FolderStatus::Scanning)?;
            let before = discovery.candidates.len();
            self.walk_root(root, &mut discovery.candidates);
            debug!(
                "{} audio files under {}",
                discovery.candidates.len() - before,
                root.display()
            );
            discovery.valid_roots.push(root.clone());

            reporter.on_progress(
                Phase::Scanning,
                percent(idx + 1, total_roots),
                &format!("Scanned {}/{} folders", idx + 1, total_roots),
            );
        }

        for root in &discovery.valid_roots {
            self.set_status(&root.to_string_lossy(), FolderStatus::Processing)?;
        }

        info!(
            "Found {} audio files across {} folders",
            discovery.candidates.len(),
            discovery.valid_roots.len()
        );
        Ok(discovery)
    }

    fn walk_root(&self, root: &Path, out: &mut Vec<PathBuf>) {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| self.should_descend(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    error!("Error walking {}: {}", root.display(), err);
                    continue;
                }
            };
            if entry.file_type().is_file() && self.is_audio(entry.path()) {
                out.push(entry.into_path());
            }
        }
    }

    fn should_descend(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        if entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with('.') {
            return false;
        }
        !self
            .ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(entry.path()))
    }

    fn is_audio(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| *allowed == ext))
    }

    fn set_status(&self, path: &str, status: FolderStatus) -> Result<(), Error> {
        self.catalog.write(self.db, |db| {
            lifecycle::advance(db, path, status)?;
            Ok(())
        })
    }
}

fn check_root(root: &Path) -> Result<(), Error> {
    let reason = if !root.exists() {
        "does not exist"
    } else if !root.is_dir() {
        "not a directory"
    } else {
        return Ok(());
    };
    Err(Error::InvalidRoot {
        path: root.to_path_buf(),
        reason,
    })
}
