use rusqlite::{Connection, Result};
use std::path::Path;
use tracing::debug;

const SCHEMA_VERSION: i64 = 1;

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the catalog at `path` and bring the schema
    /// up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Self::connect(path)?;
        db.migrate_schema()?;
        Ok(db)
    }

    /// Open another connection to an already initialised catalog.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.configure_pragmas()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -64000;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode, 64MB cache)");
        Ok(())
    }

    /// Apply the schema when `user_version` is behind. The catalog is the
    /// only record of file identity, so existing tables are never dropped.
    fn migrate_schema(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version < SCHEMA_VERSION {
            debug!("Schema version {} < {}, applying schema", version, SCHEMA_VERSION);
            self.conn.execute_batch(include_str!("schema.sql"))?;
            self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a savepoint; its writes are rolled back alone on error.
    pub(crate) fn with_savepoint<T, E>(
        &self,
        f: impl FnOnce(&Self) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        self.conn.execute_batch("SAVEPOINT catalog_item")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("RELEASE catalog_item")?;
                Ok(value)
            }
            Err(e) => {
                self.conn
                    .execute_batch("ROLLBACK TO catalog_item; RELEASE catalog_item")?;
                Err(e)
            }
        }
    }

    pub fn check_health(&self) -> bool {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }

    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute_batch(
            "DELETE FROM file_metadata;
             DELETE FROM metadata_keys;
             DELETE FROM locations;
             DELETE FROM files;
             DELETE FROM folders;",
        )?;
        debug!("All catalog tables cleared");
        Ok(())
    }
}
