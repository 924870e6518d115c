/*!
 * Persistence seam used by the job pipeline.
 *
 * Jobs only talk to storage through `TranslationStore`, which lets tests
 * wrap the SQLite repository with fault injection.
 */

use anyhow::Result;
use async_trait::async_trait;

use crate::database::{
    JobStatus, Repository, SourceTextRecord, TranslateTextRecord, TranslationJobRecord,
};
use crate::translation::hashing::HashedUnit;

/// Storage operations needed to run translation jobs
#[async_trait]
pub trait TranslationStore: Send + Sync {
    /// Get the id of a page by slug, creating it when missing
    async fn get_or_create_page(&self, slug: &str) -> Result<i64>;

    /// Get the id of a source text, creating it when missing
    async fn get_or_create_source_text(&self, text: &str, number: u32, page_id: i64)
    -> Result<i64>;

    /// Persist an extraction pass, returning one row per unit in unit order
    async fn sync_source_texts(
        &self,
        page_id: i64,
        units: Vec<HashedUnit>,
    ) -> Result<Vec<SourceTextRecord>>;

    /// Translation candidates for the given source texts, best first
    async fn find_translations(
        &self,
        source_text_ids: Vec<i64>,
        target_language: &str,
    ) -> Result<Vec<TranslateTextRecord>>;

    /// Store a new translation candidate
    async fn save_translation(
        &self,
        source_text_id: i64,
        target_language: &str,
        text: &str,
        user_id: &str,
    ) -> Result<i64>;

    /// Insert a job record
    async fn create_job(&self, job: &TranslationJobRecord) -> Result<()>;

    /// Get a job by id
    async fn get_job(&self, job_id: &str) -> Result<Option<TranslationJobRecord>>;

    /// Update the status and progress of a non-terminal job
    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: f64,
        error: Option<String>,
    ) -> Result<()>;
}

#[async_trait]
impl TranslationStore for Repository {
    async fn get_or_create_page(&self, slug: &str) -> Result<i64> {
        Repository::get_or_create_page(self, slug).await
    }

    async fn get_or_create_source_text(
        &self,
        text: &str,
        number: u32,
        page_id: i64,
    ) -> Result<i64> {
        Repository::get_or_create_source_text(self, text, number, page_id).await
    }

    async fn sync_source_texts(
        &self,
        page_id: i64,
        units: Vec<HashedUnit>,
    ) -> Result<Vec<SourceTextRecord>> {
        Repository::sync_source_texts(self, page_id, units).await
    }

    async fn find_translations(
        &self,
        source_text_ids: Vec<i64>,
        target_language: &str,
    ) -> Result<Vec<TranslateTextRecord>> {
        Repository::find_translations(self, source_text_ids, target_language).await
    }

    async fn save_translation(
        &self,
        source_text_id: i64,
        target_language: &str,
        text: &str,
        user_id: &str,
    ) -> Result<i64> {
        Repository::save_translation(self, source_text_id, target_language, text, user_id).await
    }

    async fn create_job(&self, job: &TranslationJobRecord) -> Result<()> {
        Repository::create_job(self, job).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<TranslationJobRecord>> {
        Repository::get_job(self, job_id).await
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: f64,
        error: Option<String>,
    ) -> Result<()> {
        Repository::update_job_status(self, job_id, status, progress, error).await
    }
}
