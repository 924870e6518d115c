/*!
 * SQLite connection handle.
 *
 * One connection is shared behind a mutex. Async callers hand a closure to
 * `execute_async` or `transaction_async`, which run it on tokio's blocking
 * pool so SQLite I/O never stalls a runtime worker.
 */

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::schema;
use crate::app_config::DatabaseConfig;

/// How long a write waits for another process holding the file lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable handle to the shared SQLite connection
#[derive(Clone)]
pub struct DatabaseConnection {
    location: PathBuf,
    inner: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl DatabaseConnection {
    /// Open the database named by the `database` config section
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::new(config.resolve_path()?)
    }

    /// Open (or create) a database file, creating its directory when needed
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create database directory: {}", dir.display()))?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL lets readers proceed while a job is writing translations
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        Self::prepare(conn, path)
    }

    /// Open a private in-memory database
    pub fn new_in_memory() -> Result<Self> {
        debug!("Opening in-memory database");
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;

        Self::prepare(conn, PathBuf::from(":memory:"))
    }

    fn prepare(mut conn: Connection, location: PathBuf) -> Result<Self> {
        schema::initialize_schema(&mut conn)?;
        Ok(Self {
            location,
            inner: Arc::new(Mutex::new(conn)),
        })
    }

    /// Location of the database, `:memory:` for in-memory databases
    pub fn path(&self) -> &Path {
        &self.location
    }

    fn lock(inner: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
        inner
            .lock()
            .map_err(|e| anyhow!("Database lock poisoned: {}", e))
    }

    /// Run `f` on the calling thread
    pub fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = Self::lock(&self.inner)?;
        f(&conn)
    }

    /// Run `f` on the blocking pool
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let conn = Self::lock(&inner)?;
            f(&conn)
        })
        .await
        .context("Database task panicked")?
    }

    /// Run `f` inside one transaction on the blocking pool
    ///
    /// Nothing `f` wrote is kept when it returns an error.
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut conn = Self::lock(&inner)?;
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
        .context("Database task panicked")?
    }

    /// Row counts of every table
    pub fn stats(&self) -> Result<DatabaseStats> {
        self.execute(|conn| {
            let stats = conn.query_row(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM pages),
                    (SELECT COUNT(*) FROM source_texts),
                    (SELECT COUNT(*) FROM translate_texts),
                    (SELECT COUNT(*) FROM translation_jobs)
                "#,
                [],
                |row| {
                    Ok(DatabaseStats {
                        page_count: row.get(0)?,
                        source_text_count: row.get(1)?,
                        translation_count: row.get(2)?,
                        job_count: row.get(3)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }
}

/// Row counts reported by `DatabaseConnection::stats`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub page_count: i64,
    pub source_text_count: i64,
    /// Translation candidates, all languages
    pub translation_count: i64,
    pub job_count: i64,
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} pages, {} source texts, {} translations, {} jobs",
            self.page_count, self.source_text_count, self.translation_count, self.job_count
        )
    }
}
