/*!
 * SQLite schema and its versioned migrations.
 *
 * The schema version is kept in `PRAGMA user_version`. Each entry of
 * `MIGRATIONS` upgrades the schema by one version and runs in its own
 * transaction, so a database is never left between two versions.
 */

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use rusqlite::Connection;

/// Schema upgrade steps; entry `i` moves the schema from version `i` to `i + 1`
const MIGRATIONS: &[&str] = &[
    // v1: pages, source texts, translation candidates and jobs.
    // source_texts.number is nullable so renumbering can clear stale values
    // before assigning new ones.
    r#"
    CREATE TABLE pages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        slug TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );

    CREATE TABLE source_texts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
        text_hash TEXT NOT NULL,
        number INTEGER,
        text TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(page_id, text_hash),
        UNIQUE(page_id, number)
    );

    CREATE TABLE translate_texts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_text_id INTEGER NOT NULL REFERENCES source_texts(id) ON DELETE CASCADE,
        target_language TEXT NOT NULL,
        text TEXT NOT NULL,
        point INTEGER NOT NULL DEFAULT 0,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX idx_translate_texts_source_lang
        ON translate_texts(source_text_id, target_language);

    CREATE TABLE translation_jobs (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
        target_language TEXT NOT NULL,
        ai_model TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        progress REAL NOT NULL DEFAULT 0,
        error TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        completed_at TEXT
    );
    CREATE INDEX idx_translation_jobs_user ON translation_jobs(user_id, created_at);
    CREATE INDEX idx_translation_jobs_status ON translation_jobs(status);
    "#,
];

/// Version a fully migrated database reports
pub const SCHEMA_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring the schema of `conn` up to `SCHEMA_VERSION`
pub fn initialize_schema(conn: &mut Connection) -> Result<()> {
    // Foreign keys are a per-connection setting
    conn.pragma_update(None, "foreign_keys", true)?;

    let current = schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(anyhow!(
            "Database schema v{} is newer than this build supports (v{})",
            current,
            SCHEMA_VERSION
        ));
    }
    if current == SCHEMA_VERSION {
        debug!("Database schema is up to date (v{})", current);
        return Ok(());
    }

    for (index, migration) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let target = index as u32 + 1;
        info!("Migrating database schema to v{}", target);

        let tx = conn.transaction()?;
        tx.execute_batch(migration)
            .with_context(|| format!("Failed to apply schema migration v{}", target))?;
        tx.pragma_update(None, "user_version", target)?;
        tx.commit()?;
    }

    Ok(())
}

/// Schema version stored in the database, 0 for a fresh file
pub fn schema_version(conn: &Connection) -> Result<u32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("Failed to read schema version")
}
