/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access.
 */

use anyhow::{Result, anyhow};
use log::{debug, warn};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use super::connection::DatabaseConnection;
use super::models::{
    JobStatus, PageRecord, SourceTextRecord, TranslateTextRecord, TranslationJobRecord,
};
use crate::translation::hashing::{HashedUnit, hash_text};

/// Error message stored on jobs failed by `mark_abandoned_jobs`
pub const ABANDONED_JOB_ERROR: &str = "Abandoned by a previous process";

/// Repository for database operations
#[derive(Clone, Debug)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Page Operations
    // =========================================================================

    /// Get the id of the page with the given slug, creating it when missing
    pub async fn get_or_create_page(&self, slug: &str) -> Result<i64> {
        let slug = slug.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT INTO pages (slug, created_at) VALUES (?1, ?2) ON CONFLICT(slug) DO NOTHING",
                    params![slug, chrono::Utc::now().to_rfc3339()],
                )?;

                let id: i64 =
                    conn.query_row("SELECT id FROM pages WHERE slug = ?1", [&slug], |row| {
                        row.get(0)
                    })?;
                Ok(id)
            })
            .await
    }

    /// Get a page by slug
    pub async fn get_page(&self, slug: &str) -> Result<Option<PageRecord>> {
        let slug = slug.to_string();

        self.db
            .execute_async(move |conn| {
                let page = conn
                    .query_row(
                        "SELECT id, slug, created_at FROM pages WHERE slug = ?1",
                        [&slug],
                        |row| {
                            Ok(PageRecord {
                                id: row.get(0)?,
                                slug: row.get(1)?,
                                created_at: row.get(2)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(page)
            })
            .await
    }

    // =========================================================================
    // Source Text Operations
    // =========================================================================

    /// Get the id of the source text for `text` on a page, creating it when missing
    ///
    /// The row's number is moved to `number`; any other row of the page that
    /// held that number loses it.
    pub async fn get_or_create_source_text(
        &self,
        text: &str,
        number: u32,
        page_id: i64,
    ) -> Result<i64> {
        let text = text.to_string();
        let text_hash = hash_text(&text);

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    "UPDATE source_texts SET number = NULL WHERE page_id = ?1 AND number = ?2 AND text_hash != ?3",
                    params![page_id, number, text_hash],
                )?;
                Self::upsert_source_text_sync(tx, page_id, &text_hash, number, &text)
            })
            .await
    }

    /// Persist every unit of an extraction pass and return the rows in unit order
    ///
    /// All numbers on the page are cleared first so that units which swapped
    /// numbers never collide on the `(page_id, number)` constraint.
    pub async fn sync_source_texts(
        &self,
        page_id: i64,
        units: Vec<HashedUnit>,
    ) -> Result<Vec<SourceTextRecord>> {
        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    "UPDATE source_texts SET number = NULL WHERE page_id = ?1",
                    [page_id],
                )?;

                let mut records = Vec::with_capacity(units.len());
                for unit in &units {
                    let id = Self::upsert_source_text_sync(
                        tx,
                        page_id,
                        &unit.text_hash,
                        unit.number,
                        &unit.text,
                    )?;
                    let record = Self::get_source_text_sync(tx, id)?
                        .ok_or_else(|| anyhow!("Source text {} vanished during sync", id))?;
                    records.push(record);
                }

                debug!(
                    "Synced {} source texts for page {}",
                    records.len(),
                    page_id
                );
                Ok(records)
            })
            .await
    }

    fn upsert_source_text_sync(
        conn: &Connection,
        page_id: i64,
        text_hash: &str,
        number: u32,
        text: &str,
    ) -> Result<i64> {
        conn.execute(
            r#"
            INSERT INTO source_texts (page_id, text_hash, number, text, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(page_id, text_hash) DO UPDATE SET number = excluded.number
            "#,
            params![
                page_id,
                text_hash,
                number,
                text,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM source_texts WHERE page_id = ?1 AND text_hash = ?2",
            params![page_id, text_hash],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn parse_source_text_row(row: &rusqlite::Row) -> rusqlite::Result<SourceTextRecord> {
        Ok(SourceTextRecord {
            id: row.get(0)?,
            page_id: row.get(1)?,
            text_hash: row.get(2)?,
            number: row.get(3)?,
            text: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn get_source_text_sync(conn: &Connection, id: i64) -> Result<Option<SourceTextRecord>> {
        let record = conn
            .query_row(
                "SELECT id, page_id, text_hash, number, text, created_at FROM source_texts WHERE id = ?1",
                [id],
                Self::parse_source_text_row,
            )
            .optional()?;
        Ok(record)
    }

    /// List the source texts of a page, numbered rows first in number order
    pub async fn list_source_texts(&self, page_id: i64) -> Result<Vec<SourceTextRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, page_id, text_hash, number, text, created_at
                    FROM source_texts WHERE page_id = ?1
                    ORDER BY number IS NULL, number, id
                    "#,
                )?;

                let records = stmt
                    .query_map([page_id], Self::parse_source_text_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
    }

    // =========================================================================
    // Translation Operations
    // =========================================================================

    /// Find the translation candidates for the given source texts, best first
    pub async fn find_translations(
        &self,
        source_text_ids: Vec<i64>,
        target_language: &str,
    ) -> Result<Vec<TranslateTextRecord>> {
        if source_text_ids.is_empty() {
            return Ok(Vec::new());
        }
        let target_language = target_language.to_string();

        self.db
            .execute_async(move |conn| {
                let placeholders = (0..source_text_ids.len())
                    .map(|i| format!("?{}", i + 2))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    r#"
                    SELECT id, source_text_id, target_language, text, point, user_id, created_at
                    FROM translate_texts
                    WHERE target_language = ?1 AND source_text_id IN ({})
                    ORDER BY point DESC, created_at DESC, id DESC
                    "#,
                    placeholders
                );

                let mut values: Vec<rusqlite::types::Value> =
                    Vec::with_capacity(source_text_ids.len() + 1);
                values.push(target_language.into());
                values.extend(source_text_ids.into_iter().map(rusqlite::types::Value::from));

                let mut stmt = conn.prepare(&sql)?;
                let records = stmt
                    .query_map(params_from_iter(values), |row| {
                        Ok(TranslateTextRecord {
                            id: row.get(0)?,
                            source_text_id: row.get(1)?,
                            target_language: row.get(2)?,
                            text: row.get(3)?,
                            point: row.get(4)?,
                            user_id: row.get(5)?,
                            created_at: row.get(6)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
    }

    /// Store a new translation candidate with zero points
    pub async fn save_translation(
        &self,
        source_text_id: i64,
        target_language: &str,
        text: &str,
        user_id: &str,
    ) -> Result<i64> {
        let target_language = target_language.to_string();
        let text = text.to_string();
        let user_id = user_id.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translate_texts (source_text_id, target_language, text, point, user_id, created_at)
                    VALUES (?1, ?2, ?3, 0, ?4, ?5)
                    "#,
                    params![
                        source_text_id,
                        target_language,
                        text,
                        user_id,
                        chrono::Utc::now().to_rfc3339()
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    // =========================================================================
    // Job Operations
    // =========================================================================

    /// Insert a new job record
    pub async fn create_job(&self, job: &TranslationJobRecord) -> Result<()> {
        let job = job.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translation_jobs (
                        id, user_id, page_id, target_language, ai_model, status,
                        progress, error, created_at, updated_at, completed_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
                    params![
                        job.id,
                        job.user_id,
                        job.page_id,
                        job.target_language,
                        job.ai_model,
                        job.status.to_string(),
                        job.progress,
                        job.error,
                        job.created_at,
                        job.updated_at,
                        job.completed_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Get a job by ID
    pub async fn get_job(&self, job_id: &str) -> Result<Option<TranslationJobRecord>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| Self::get_job_sync(conn, &job_id))
            .await
    }

    fn parse_job_row(row: &rusqlite::Row) -> rusqlite::Result<TranslationJobRecord> {
        Ok(TranslationJobRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            page_id: row.get(2)?,
            target_language: row.get(3)?,
            ai_model: row.get(4)?,
            status: row.get::<_, String>(5)?.parse().map_err(|e: anyhow::Error| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
            })?,
            progress: row.get(6)?,
            error: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            completed_at: row.get(10)?,
        })
    }

    fn get_job_sync(conn: &Connection, job_id: &str) -> Result<Option<TranslationJobRecord>> {
        let job = conn
            .query_row(
                r#"
                SELECT id, user_id, page_id, target_language, ai_model, status,
                       progress, error, created_at, updated_at, completed_at
                FROM translation_jobs WHERE id = ?1
                "#,
                [job_id],
                Self::parse_job_row,
            )
            .optional()?;
        Ok(job)
    }

    /// Update a job's status and progress
    ///
    /// Terminal jobs are never modified; updating one is an error.
    pub async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: f64,
        error: Option<String>,
    ) -> Result<()> {
        let job_id = job_id.to_string();
        let progress = progress.clamp(0.0, 100.0);

        self.db
            .execute_async(move |conn| {
                let now = chrono::Utc::now().to_rfc3339();
                let completed_at = status.is_terminal().then(|| now.clone());

                let updated = conn.execute(
                    r#"
                    UPDATE translation_jobs
                    SET status = ?1, progress = ?2, error = ?3, updated_at = ?4, completed_at = ?5
                    WHERE id = ?6 AND status NOT IN ('completed', 'failed')
                    "#,
                    params![status.to_string(), progress, error, now, completed_at, job_id],
                )?;

                if updated == 0 {
                    return match Self::get_job_sync(conn, &job_id)? {
                        Some(job) => Err(anyhow!("Job {} is already {}", job_id, job.status)),
                        None => Err(anyhow!("Job not found: {}", job_id)),
                    };
                }
                Ok(())
            })
            .await
    }

    /// List the jobs of a user, newest first
    pub async fn list_jobs_for_user(&self, user_id: &str) -> Result<Vec<TranslationJobRecord>> {
        let user_id = user_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, user_id, page_id, target_language, ai_model, status,
                           progress, error, created_at, updated_at, completed_at
                    FROM translation_jobs WHERE user_id = ?1
                    ORDER BY created_at DESC, rowid DESC
                    "#,
                )?;

                let jobs = stmt
                    .query_map([&user_id], Self::parse_job_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(jobs)
            })
            .await
    }

    /// Fail every job left pending or in progress by a process that is gone
    pub async fn mark_abandoned_jobs(&self) -> Result<usize> {
        let count = self
            .db
            .execute_async(|conn| {
                let now = chrono::Utc::now().to_rfc3339();
                let count = conn.execute(
                    r#"
                    UPDATE translation_jobs
                    SET status = 'failed', error = ?1, updated_at = ?2, completed_at = ?2
                    WHERE status IN ('pending', 'in_progress')
                    "#,
                    params![ABANDONED_JOB_ERROR, now],
                )?;
                Ok(count)
            })
            .await?;

        if count > 0 {
            warn!("Marked {} abandoned jobs as failed", count);
        }
        Ok(count)
    }
}
