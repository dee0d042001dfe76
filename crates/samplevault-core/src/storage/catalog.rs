use super::sqlite::Database;
use crate::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// Shared handle to the persistent catalog.
///
/// Constructed once at process start and cloned into every component. Each
/// component opens its own connection, but SQLite allows a single writer, so
/// every write transaction runs under the one writer lock held here.
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
    writer: Arc<Mutex<()>>,
}

impl Catalog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let db = Database::open(&path)?;
        let healthy = db.check_health();
        info!("Catalog opened at {} (healthy: {})", path.display(), healthy);
        Ok(Catalog {
            path,
            writer: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A fresh connection for one component or job.
    pub fn connect(&self) -> Result<Database, Error> {
        Ok(Database::connect(&self.path)?)
    }

    pub fn lock_writer(&self) -> Result<MutexGuard<'_, ()>, Error> {
        self.writer.lock().map_err(|_| Error::WriterPoisoned)
    }

    /// Run `f` as one write transaction on `db` under the writer lock.
    /// Nothing is committed if `f` fails.
    pub fn write<T>(
        &self,
        db: &Database,
        f: impl FnOnce(&Database) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let _guard = self.lock_writer()?;
        let tx = db.connection().unchecked_transaction()?;
        let value = f(db)?;
        tx.commit()?;
        Ok(value)
    }
}
